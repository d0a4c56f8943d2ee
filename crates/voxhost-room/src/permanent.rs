//! Permanent rooms: quota-checked creation, deletion, host repointing,
//! and the summary broadcast.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use voxhost_protocol::{
    ApiResponse, CreatePermanentRoomRequest, DeviceCandidate, DeviceId, HostRequest,
    PermanentRoom, RoomId, RoomSummary, SyncRoomsRequest, UserId,
};
use voxhost_quota::{QuotaProfile, QuotaSummary};
use voxhost_transport::{HostTransport, TransportError};

use crate::actor::{Completion, RoomActor, created_room_id};
use crate::service::Reply;
use crate::{RoomError, RoomEvent};

/// What the caller supplies to create a permanent room.
///
/// The owner's identity comes from the identity subsystem; the quota
/// inputs travel separately as a [`QuotaProfile`].
#[derive(Clone, PartialEq, Eq)]
pub struct NewPermanentRoom {
    pub name: String,
    pub description: String,
    pub is_private: bool,
    /// Optional room password, forwarded to the host and never stored.
    pub password: Option<String>,
    pub owner_id: UserId,
    pub owner_handle: String,
}

impl fmt::Debug for NewPermanentRoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewPermanentRoom")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("is_private", &self.is_private)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("owner_id", &self.owner_id)
            .field("owner_handle", &self.owner_handle)
            .finish()
    }
}

/// A permanent create waiting on its host.
pub(crate) struct PendingPermanent {
    room: NewPermanentRoom,
    max_members: u32,
    host: DeviceId,
    created_at: DateTime<Utc>,
    reply: Reply<PermanentRoom>,
}

impl<T: HostTransport> RoomActor<T> {
    pub(crate) fn create_permanent(
        &mut self,
        room: NewPermanentRoom,
        profile: QuotaProfile,
        reply: Reply<PermanentRoom>,
    ) {
        let device = match self.admit_permanent(&room, &profile) {
            Ok(device) => device,
            Err(e) => {
                debug!(owner_id = %room.owner_id, error = %e, "permanent room refused");
                let _ = reply.send(Err(e));
                return;
            }
        };

        let max_members = self.calculator.max_members_per_room(&profile);
        let request = HostRequest::CreatePermanent(CreatePermanentRoomRequest {
            name: room.name.clone(),
            description: room.description.clone(),
            is_private: room.is_private,
            max_members,
            owner_id: room.owner_id.clone(),
            owner_username: room.owner_handle.clone(),
            permanent: true,
            password: room.password.clone(),
        });

        *self
            .pending_permanent
            .entry(room.owner_id.clone())
            .or_insert(0) += 1;
        debug!(
            owner_id = %room.owner_id,
            device_id = %device.id,
            max_members,
            "creating permanent room"
        );

        let pending = PendingPermanent {
            room,
            max_members,
            host: device.id.clone(),
            created_at: self.clock.now(),
            reply,
        };
        self.spawn_call(device, request, move |outcome| {
            Completion::Permanent(pending, outcome)
        });
    }

    /// Policy checks, then placement. Nothing is mutated on failure.
    fn admit_permanent(
        &mut self,
        room: &NewPermanentRoom,
        profile: &QuotaProfile,
    ) -> Result<DeviceCandidate, RoomError> {
        if profile.is_banned() {
            return Err(RoomError::Banned);
        }

        let in_flight = self
            .pending_permanent
            .get(&room.owner_id)
            .copied()
            .unwrap_or(0);
        let owned = u32::try_from(self.store.owned_count(&room.owner_id) + in_flight)
            .unwrap_or(u32::MAX);
        let limit = self.calculator.max_permanent_rooms(profile);
        if owned >= limit {
            return Err(RoomError::QuotaExceeded { owned, limit });
        }

        self.select_device()
    }

    pub(crate) fn complete_permanent(
        &mut self,
        pending: PendingPermanent,
        outcome: Result<ApiResponse, TransportError>,
    ) {
        let PendingPermanent {
            room,
            max_members,
            host,
            created_at,
            reply,
        } = pending;

        if let Some(count) = self.pending_permanent.get_mut(&room.owner_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.pending_permanent.remove(&room.owner_id);
            }
        }

        let result = match created_room_id(outcome) {
            Ok(room_id) => {
                let record = PermanentRoom {
                    id: room_id.clone(),
                    name: room.name,
                    description: room.description,
                    owner_id: room.owner_id,
                    owner_handle: room.owner_handle,
                    is_private: room.is_private,
                    max_members,
                    created_at,
                    host_device_id: Some(host.clone()),
                    has_password: room.password.is_some_and(|p| !p.is_empty()),
                    current_members: 0,
                    is_online: true,
                };
                self.store.push_permanent(record.clone());
                self.persist("permanent rooms", self.store.persist_permanent());

                info!(%room_id, device_id = %host, owner_id = %record.owner_id, "permanent room created");
                self.emit(RoomEvent::PermanentCreated { room_id, host });
                Ok(record)
            }
            Err(e) => {
                warn!(owner_id = %room.owner_id, device_id = %host, error = %e, "permanent room creation failed");
                Err(e)
            }
        };

        if reply.send(result).is_err() {
            debug!("caller left before permanent room creation finished");
        }
    }

    pub(crate) fn delete_permanent(&mut self, room_id: RoomId) -> Result<PermanentRoom, RoomError> {
        let room = self
            .store
            .remove_permanent(&room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        self.persist("permanent rooms", self.store.persist_permanent());
        info!(%room_id, "permanent room deleted");

        match &room.host_device_id {
            Some(host) => self.notify(
                host,
                HostRequest::DeletePermanent {
                    room_id: room_id.clone(),
                },
            ),
            None => debug!(%room_id, "no recorded host, skipping remote delete"),
        }

        self.emit(RoomEvent::PermanentDeleted { room_id });
        Ok(room)
    }

    pub(crate) fn migrate_permanent(
        &mut self,
        room_id: RoomId,
        to: DeviceId,
    ) -> Result<PermanentRoom, RoomError> {
        let room = self
            .store
            .permanent_mut(&room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        let from = room.host_device_id.replace(to.clone());
        let updated = room.clone();
        self.persist("permanent rooms", self.store.persist_permanent());

        warn!(
            %room_id,
            from = ?from,
            to = %to,
            "host pointer moved; live session handoff is not implemented"
        );
        self.emit(RoomEvent::PermanentMigrated { room_id, from, to });
        Ok(updated)
    }

    /// Sends every permanent-room summary to each online device.
    pub(crate) fn sync_across_devices(&self) -> usize {
        let rooms: Vec<RoomSummary> = self
            .store
            .permanent_rooms()
            .iter()
            .map(RoomSummary::from)
            .collect();
        let targets = self.directory.online_devices();

        info!(devices = targets.len(), rooms = rooms.len(), "broadcasting room summaries");
        let count = targets.len();
        for device in targets {
            let request = HostRequest::SyncRooms(SyncRoomsRequest {
                rooms: rooms.clone(),
                client_id: self.config.client_id.clone(),
            });
            self.fire(device, request);
        }
        count
    }

    pub(crate) fn quota_summary(&self, owner_id: &UserId, profile: &QuotaProfile) -> QuotaSummary {
        let owned = u32::try_from(self.store.owned_count(owner_id)).unwrap_or(u32::MAX);
        self.calculator.summary(profile, owned)
    }

    pub(crate) fn refresh_server_capacity(&mut self, profile: &QuotaProfile) -> u32 {
        let capacity = self.calculator.server_capacity(profile);
        self.store.set_server_capacity(capacity);
        self.persist("server capacity", self.store.persist_server_capacity());
        debug!(capacity, "server capacity refreshed");
        capacity
    }
}
