//! Host device selection.
//!
//! Given the candidates reported by the pairing subsystem, pick the one
//! that should host a new room. Offline candidates are ignored by every
//! policy; an empty online set is [`SelectionError::NoDeviceAvailable`].

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use voxhost_protocol::{DeviceCandidate, DeviceId};

use crate::SelectionError;

/// How a hosting device is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationPolicy {
    /// Uniform choice among online candidates.
    Random,
    /// The device after the last one used, wrapping around.
    #[default]
    RoundRobin,
    /// The designated device when online, otherwise the first online one.
    Preferred,
    /// The device currently hosting the fewest rooms.
    LoadBalanced,
}

impl std::fmt::Display for RotationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::RoundRobin => write!(f, "round-robin"),
            Self::Preferred => write!(f, "preferred"),
            Self::LoadBalanced => write!(f, "load-balanced"),
        }
    }
}

/// Persisted rotation settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RotationState {
    pub policy: RotationPolicy,
    /// Device used by [`RotationPolicy::Preferred`].
    pub preferred_device: Option<DeviceId>,
    /// Last device picked by [`RotationPolicy::RoundRobin`].
    pub last_host: Option<DeviceId>,
}

/// The outcome of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The chosen device.
    pub device: DeviceCandidate,
    /// New round-robin pointer to persist, when the policy moved it.
    pub last_host: Option<DeviceId>,
}

/// Chooses hosting devices. Holds no state of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceSelector;

impl DeviceSelector {
    /// Picks a device from `candidates` under `state.policy`.
    ///
    /// `load` maps device → rooms it currently hosts; devices missing from
    /// the map count as hosting none. Only the round-robin policy
    /// returns a pointer update.
    pub fn select<R: Rng + ?Sized>(
        &self,
        candidates: &[DeviceCandidate],
        state: &RotationState,
        load: &HashMap<DeviceId, usize>,
        rng: &mut R,
    ) -> Result<Selection, SelectionError> {
        let online: Vec<&DeviceCandidate> =
            candidates.iter().filter(|d| d.is_online).collect();
        if online.is_empty() {
            return Err(SelectionError::NoDeviceAvailable);
        }

        let (device, last_host) = match state.policy {
            RotationPolicy::Random => {
                (online[rng.random_range(0..online.len())], None)
            }
            RotationPolicy::RoundRobin => {
                let next = state
                    .last_host
                    .as_ref()
                    .and_then(|last| online.iter().position(|d| &d.id == last))
                    .map(|i| (i + 1) % online.len())
                    .unwrap_or(0);
                let device = online[next];
                (device, Some(device.id.clone()))
            }
            RotationPolicy::Preferred => {
                let preferred = state.preferred_device.as_ref().and_then(|id| {
                    online.iter().copied().find(|d| &d.id == id)
                });
                (preferred.unwrap_or(online[0]), None)
            }
            RotationPolicy::LoadBalanced => {
                // (count, position) so the earliest candidate wins ties.
                let (_, device) = online
                    .iter()
                    .enumerate()
                    .min_by_key(|(i, d)| {
                        (load.get(&d.id).copied().unwrap_or(0), *i)
                    })
                    .map(|(i, d)| (i, *d))
                    .ok_or(SelectionError::NoDeviceAvailable)?;
                (device, None)
            }
        };

        tracing::debug!(
            device_id = %device.id,
            policy = %state.policy,
            online = online.len(),
            "selected hosting device"
        );

        Ok(Selection {
            device: device.clone(),
            last_host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn device(id: &str, online: bool) -> DeviceCandidate {
        DeviceCandidate {
            id: DeviceId::new(id),
            base_url: format!("http://{id}.local"),
            access_token: String::new(),
            is_online: online,
        }
    }

    fn state(policy: RotationPolicy) -> RotationState {
        RotationState {
            policy,
            ..RotationState::default()
        }
    }

    fn pick(
        candidates: &[DeviceCandidate],
        state: &RotationState,
        load: &HashMap<DeviceId, usize>,
    ) -> Result<Selection, SelectionError> {
        DeviceSelector.select(candidates, state, load, &mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_empty_online_set_fails() {
        let candidates = vec![device("a", false)];
        for policy in [
            RotationPolicy::Random,
            RotationPolicy::RoundRobin,
            RotationPolicy::Preferred,
            RotationPolicy::LoadBalanced,
        ] {
            let err = pick(&candidates, &state(policy), &HashMap::new());
            assert_eq!(err, Err(SelectionError::NoDeviceAvailable));
        }
    }

    #[test]
    fn test_round_robin_starts_at_first_without_pointer() {
        let candidates = vec![device("a", true), device("b", true)];
        let sel = pick(&candidates, &state(RotationPolicy::RoundRobin), &HashMap::new())
            .unwrap();
        assert_eq!(sel.device.id, DeviceId::new("a"));
        assert_eq!(sel.last_host, Some(DeviceId::new("a")));
    }

    #[test]
    fn test_round_robin_restarts_when_last_host_went_offline() {
        let candidates = vec![device("a", true), device("b", false), device("c", true)];
        let mut s = state(RotationPolicy::RoundRobin);
        s.last_host = Some(DeviceId::new("b"));
        let sel = pick(&candidates, &s, &HashMap::new()).unwrap();
        assert_eq!(sel.device.id, DeviceId::new("a"));
    }

    #[test]
    fn test_round_robin_skips_offline_devices() {
        let candidates = vec![device("a", true), device("b", false), device("c", true)];
        let mut s = state(RotationPolicy::RoundRobin);
        s.last_host = Some(DeviceId::new("a"));
        let sel = pick(&candidates, &s, &HashMap::new()).unwrap();
        assert_eq!(sel.device.id, DeviceId::new("c"));
    }

    #[test]
    fn test_preferred_uses_designated_device_when_online() {
        let candidates = vec![device("a", true), device("b", true)];
        let mut s = state(RotationPolicy::Preferred);
        s.preferred_device = Some(DeviceId::new("b"));
        let sel = pick(&candidates, &s, &HashMap::new()).unwrap();
        assert_eq!(sel.device.id, DeviceId::new("b"));
        assert_eq!(sel.last_host, None);
    }

    #[test]
    fn test_preferred_falls_back_to_first_online() {
        let candidates = vec![device("a", false), device("b", true), device("c", true)];
        let mut s = state(RotationPolicy::Preferred);
        s.preferred_device = Some(DeviceId::new("a"));
        let sel = pick(&candidates, &s, &HashMap::new()).unwrap();
        assert_eq!(sel.device.id, DeviceId::new("b"));
    }

    #[test]
    fn test_load_balanced_breaks_ties_by_position() {
        let candidates = vec![device("a", true), device("b", true), device("c", true)];
        let load = HashMap::from([
            (DeviceId::new("a"), 3),
            (DeviceId::new("b"), 1),
            (DeviceId::new("c"), 1),
        ]);
        let sel = pick(&candidates, &state(RotationPolicy::LoadBalanced), &load).unwrap();
        assert_eq!(sel.device.id, DeviceId::new("b"));
    }

    #[test]
    fn test_load_balanced_treats_unknown_devices_as_idle() {
        let candidates = vec![device("a", true), device("b", true)];
        let load = HashMap::from([(DeviceId::new("a"), 2)]);
        let sel = pick(&candidates, &state(RotationPolicy::LoadBalanced), &load).unwrap();
        assert_eq!(sel.device.id, DeviceId::new("b"));
    }

    #[test]
    fn test_random_only_returns_online_devices() {
        let candidates = vec![device("a", false), device("b", true), device("c", false)];
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let sel = DeviceSelector
                .select(&candidates, &state(RotationPolicy::Random), &HashMap::new(), &mut rng)
                .unwrap();
            assert_eq!(sel.device.id, DeviceId::new("b"));
        }
    }

    #[test]
    fn test_policy_serializes_kebab_case() {
        let json = serde_json::to_string(&RotationPolicy::LoadBalanced).unwrap();
        assert_eq!(json, "\"load-balanced\"");
        assert_eq!(RotationPolicy::RoundRobin.to_string(), "round-robin");
    }
}
