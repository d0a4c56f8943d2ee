//! The room store: every room collection plus rotation settings.
//!
//! `RoomStore` keeps everything in memory and writes a collection back
//! to its [`KeyValueStore`] only when asked (`persist_*`). Each key holds
//! an envelope:
//!
//! ```json
//! { "version": 1, "data": [ ...rooms... ] }
//! ```
//!
//! On open, an entry with a version newer than this build understands is
//! rejected with [`StoreError::UnsupportedVersion`] instead of being
//! misread. A missing key loads as the empty default, so a fresh state
//! directory needs no setup.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use voxhost_protocol::{
    Codec, DeviceId, GuestRoom, JsonCodec, OpenLinkRoom, PermanentRoom, RoomId,
    UserId,
};
use voxhost_quota::{RotationPolicy, RotationState};

use crate::{KeyValueStore, StoreError};

/// Schema version written with every entry.
pub const SCHEMA_VERSION: u32 = 1;

/// Keys of the persisted entries.
pub mod keys {
    pub const PERMANENT_ROOMS: &str = "rooms.permanent";
    pub const GUEST_ROOMS: &str = "rooms.guest";
    pub const OPENLINK_ROOMS: &str = "rooms.openlink";
    pub const ROTATION_POLICY: &str = "rotation.policy";
    pub const PREFERRED_DEVICE: &str = "rotation.preferred_device";
    pub const LAST_HOST: &str = "rotation.last_host";
    pub const SERVER_CAPACITY: &str = "capacity.server";
}

#[derive(Serialize)]
struct VersionedRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

#[derive(Deserialize)]
struct Versioned<T> {
    data: T,
}

/// In-memory room collections backed by a [`KeyValueStore`].
///
/// Mutators only touch memory; the matching `persist_*` call writes the
/// collection out.
pub struct RoomStore {
    backend: Box<dyn KeyValueStore>,
    codec: JsonCodec,
    permanent: Vec<PermanentRoom>,
    guest: Vec<GuestRoom>,
    openlink: Vec<OpenLinkRoom>,
    rotation: RotationState,
    server_capacity: Option<u32>,
}

impl std::fmt::Debug for RoomStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomStore")
            .field("permanent", &self.permanent.len())
            .field("guest", &self.guest.len())
            .field("openlink", &self.openlink.len())
            .field("rotation", &self.rotation)
            .field("server_capacity", &self.server_capacity)
            .finish()
    }
}

impl RoomStore {
    /// Loads every entry from `backend`. Missing entries start empty.
    ///
    /// # Errors
    /// Fails on I/O errors, malformed entries, and entries written by a
    /// newer schema.
    pub fn open(backend: impl KeyValueStore) -> Result<Self, StoreError> {
        let mut store = Self {
            backend: Box::new(backend),
            codec: JsonCodec,
            permanent: Vec::new(),
            guest: Vec::new(),
            openlink: Vec::new(),
            rotation: RotationState::default(),
            server_capacity: None,
        };

        store.permanent = store.load(keys::PERMANENT_ROOMS)?.unwrap_or_default();
        store.guest = store.load(keys::GUEST_ROOMS)?.unwrap_or_default();
        store.openlink = store.load(keys::OPENLINK_ROOMS)?.unwrap_or_default();
        store.rotation = RotationState {
            policy: store
                .load::<RotationPolicy>(keys::ROTATION_POLICY)?
                .unwrap_or_default(),
            preferred_device: store.load(keys::PREFERRED_DEVICE)?.flatten(),
            last_host: store.load(keys::LAST_HOST)?.flatten(),
        };
        store.server_capacity = store.load(keys::SERVER_CAPACITY)?.flatten();

        tracing::info!(
            permanent = store.permanent.len(),
            guest = store.guest.len(),
            openlink = store.openlink.len(),
            policy = %store.rotation.policy,
            "room store loaded"
        );
        Ok(store)
    }

    fn load<T: DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.backend.get(key)? else {
            return Ok(None);
        };

        let header: VersionHeader = self
            .codec
            .decode(&bytes)
            .map_err(|source| StoreError::Codec { key, source })?;
        if header.version > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                key,
                found: header.version,
                supported: SCHEMA_VERSION,
            });
        }

        let entry: Versioned<T> = self
            .codec
            .decode(&bytes)
            .map_err(|source| StoreError::Codec { key, source })?;
        Ok(Some(entry.data))
    }

    fn save<T: Serialize>(&self, key: &'static str, data: &T) -> Result<(), StoreError> {
        let bytes = self
            .codec
            .encode(&VersionedRef {
                version: SCHEMA_VERSION,
                data,
            })
            .map_err(|source| StoreError::Codec { key, source })?;
        self.backend.put(key, &bytes)?;
        tracing::trace!(key, bytes = bytes.len(), "entry persisted");
        Ok(())
    }

    // -- Permanent rooms --

    pub fn permanent_rooms(&self) -> &[PermanentRoom] {
        &self.permanent
    }

    pub fn permanent(&self, id: &RoomId) -> Option<&PermanentRoom> {
        self.permanent.iter().find(|r| &r.id == id)
    }

    pub fn permanent_mut(&mut self, id: &RoomId) -> Option<&mut PermanentRoom> {
        self.permanent.iter_mut().find(|r| &r.id == id)
    }

    /// Number of permanent rooms owned by `owner`.
    pub fn owned_count(&self, owner: &UserId) -> usize {
        self.permanent.iter().filter(|r| &r.owner_id == owner).count()
    }

    pub fn push_permanent(&mut self, room: PermanentRoom) {
        self.permanent.push(room);
    }

    pub fn remove_permanent(&mut self, id: &RoomId) -> Option<PermanentRoom> {
        let pos = self.permanent.iter().position(|r| &r.id == id)?;
        Some(self.permanent.remove(pos))
    }

    pub fn persist_permanent(&self) -> Result<(), StoreError> {
        self.save(keys::PERMANENT_ROOMS, &self.permanent)
    }

    // -- Guest rooms --

    pub fn guest_rooms(&self) -> &[GuestRoom] {
        &self.guest
    }

    pub fn guest(&self, id: &RoomId) -> Option<&GuestRoom> {
        self.guest.iter().find(|r| &r.id == id)
    }

    pub fn push_guest(&mut self, room: GuestRoom) {
        self.guest.push(room);
    }

    pub fn remove_guest(&mut self, id: &RoomId) -> Option<GuestRoom> {
        let pos = self.guest.iter().position(|r| &r.id == id)?;
        Some(self.guest.remove(pos))
    }

    pub fn persist_guest(&self) -> Result<(), StoreError> {
        self.save(keys::GUEST_ROOMS, &self.guest)
    }

    // -- OpenLink rooms --

    pub fn openlink_rooms(&self) -> &[OpenLinkRoom] {
        &self.openlink
    }

    pub fn openlink(&self, id: &RoomId) -> Option<&OpenLinkRoom> {
        self.openlink.iter().find(|r| &r.id == id)
    }

    pub fn openlink_mut(&mut self, id: &RoomId) -> Option<&mut OpenLinkRoom> {
        self.openlink.iter_mut().find(|r| &r.id == id)
    }

    pub fn push_openlink(&mut self, room: OpenLinkRoom) {
        self.openlink.push(room);
    }

    pub fn remove_openlink(&mut self, id: &RoomId) -> Option<OpenLinkRoom> {
        let pos = self.openlink.iter().position(|r| &r.id == id)?;
        Some(self.openlink.remove(pos))
    }

    pub fn persist_openlink(&self) -> Result<(), StoreError> {
        self.save(keys::OPENLINK_ROOMS, &self.openlink)
    }

    // -- Placement --

    /// Rooms of every kind currently recorded on each device.
    pub fn hosted_counts(&self) -> HashMap<DeviceId, usize> {
        let mut counts = HashMap::new();
        let hosts = self
            .permanent
            .iter()
            .filter_map(|r| r.host_device_id.as_ref())
            .chain(self.guest.iter().map(|r| &r.host_device_id))
            .chain(self.openlink.iter().map(|r| &r.host_device_id));
        for host in hosts {
            *counts.entry(host.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn rotation(&self) -> &RotationState {
        &self.rotation
    }

    pub fn set_rotation_policy(&mut self, policy: RotationPolicy) {
        self.rotation.policy = policy;
    }

    pub fn set_preferred_device(&mut self, device: Option<DeviceId>) {
        self.rotation.preferred_device = device;
    }

    pub fn set_last_host(&mut self, device: Option<DeviceId>) {
        self.rotation.last_host = device;
    }

    /// Writes the policy, preferred device, and round-robin pointer.
    pub fn persist_rotation(&self) -> Result<(), StoreError> {
        self.save(keys::ROTATION_POLICY, &self.rotation.policy)?;
        self.save(keys::PREFERRED_DEVICE, &self.rotation.preferred_device)?;
        self.save(keys::LAST_HOST, &self.rotation.last_host)
    }

    /// Writes only the round-robin pointer.
    pub fn persist_last_host(&self) -> Result<(), StoreError> {
        self.save(keys::LAST_HOST, &self.rotation.last_host)
    }

    // -- Capacity --

    /// The last computed host capacity, if any.
    pub fn server_capacity(&self) -> Option<u32> {
        self.server_capacity
    }

    pub fn set_server_capacity(&mut self, capacity: u32) {
        self.server_capacity = Some(capacity);
    }

    pub fn persist_server_capacity(&self) -> Result<(), StoreError> {
        self.save(keys::SERVER_CAPACITY, &self.server_capacity)
    }
}
