//! Where the room engine learns about hosting devices.

use std::sync::RwLock;

use voxhost_protocol::{DeviceCandidate, DeviceId};

/// Read-only view of the paired devices.
///
/// Owned by the pairing subsystem. The room engine asks for a fresh
/// list on every placement and notification, and never mutates it.
pub trait DeviceDirectory: Send + Sync + 'static {
    /// Every known device, online or not, in a stable order.
    fn devices(&self) -> Vec<DeviceCandidate>;

    /// The device with `id`, if known.
    fn device(&self, id: &DeviceId) -> Option<DeviceCandidate> {
        self.devices().into_iter().find(|d| &d.id == id)
    }

    /// Only the devices currently online.
    fn online_devices(&self) -> Vec<DeviceCandidate> {
        self.devices().into_iter().filter(|d| d.is_online).collect()
    }
}

/// A directory backed by an in-memory list.
///
/// Good enough for the demo and for tests; real deployments plug in
/// their pairing subsystem instead.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    devices: RwLock<Vec<DeviceCandidate>>,
}

impl StaticDirectory {
    pub fn new(devices: Vec<DeviceCandidate>) -> Self {
        Self {
            devices: RwLock::new(devices),
        }
    }

    /// Replaces the whole list.
    pub fn replace(&self, devices: Vec<DeviceCandidate>) {
        *self.devices.write().unwrap_or_else(|e| e.into_inner()) = devices;
    }

    /// Flips a device's online flag. Returns `false` if it isn't listed.
    pub fn set_online(&self, id: &DeviceId, online: bool) -> bool {
        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        match devices.iter_mut().find(|d| &d.id == id) {
            Some(device) => {
                device.is_online = online;
                true
            }
            None => false,
        }
    }
}

impl DeviceDirectory for StaticDirectory {
    fn devices(&self) -> Vec<DeviceCandidate> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, online: bool) -> DeviceCandidate {
        DeviceCandidate {
            id: DeviceId::new(id),
            base_url: format!("http://{id}.local"),
            access_token: String::new(),
            is_online: online,
        }
    }

    #[test]
    fn test_online_devices_keeps_order() {
        let dir = StaticDirectory::new(vec![
            device("a", true),
            device("b", false),
            device("c", true),
        ]);
        let ids: Vec<_> = dir.online_devices().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![DeviceId::new("a"), DeviceId::new("c")]);
    }

    #[test]
    fn test_set_online_toggles_known_devices_only() {
        let dir = StaticDirectory::new(vec![device("a", true)]);
        assert!(dir.set_online(&DeviceId::new("a"), false));
        assert!(!dir.set_online(&DeviceId::new("zz"), false));
        assert!(dir.online_devices().is_empty());
        assert!(dir.device(&DeviceId::new("a")).is_some());
    }
}
