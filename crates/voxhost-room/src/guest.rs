//! Guest rooms: one short-lived anonymous room at a time, removed at an
//! absolute deadline.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};
use voxhost_protocol::{
    ApiResponse, CreateGuestRoomRequest, DeviceId, GuestRoom, HostRequest, RoomId,
};
use voxhost_transport::{HostTransport, TransportError};

use crate::actor::{Completion, RoomActor, TimerKey, created_room_id};
use crate::service::{CleanupReport, Reply};
use crate::{CloseReason, RoomError, RoomEvent};

/// A guest create waiting on its host.
pub(crate) struct PendingGuest {
    name: String,
    description: String,
    duration_minutes: u32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    host: DeviceId,
    reply: Reply<GuestRoom>,
}

impl<T: HostTransport> RoomActor<T> {
    pub(crate) fn create_guest(
        &mut self,
        name: String,
        description: String,
        reply: Reply<GuestRoom>,
    ) {
        if !self.store.guest_rooms().is_empty() || self.pending_guest > 0 {
            debug!("guest room refused, one already exists");
            let _ = reply.send(Err(RoomError::AlreadyHasRoom));
            return;
        }
        let device = match self.select_device() {
            Ok(device) => device,
            Err(e) => {
                debug!(error = %e, "guest room refused");
                let _ = reply.send(Err(e));
                return;
            }
        };

        let duration_minutes = self
            .rng
            .random_range(self.config.guest_min_minutes..=self.config.guest_max_minutes);
        let created_at = self.clock.now();
        let expires_at = GuestRoom::expiry_for(created_at, duration_minutes);

        let request = HostRequest::CreateGuest(CreateGuestRoomRequest {
            name: name.clone(),
            description: description.clone(),
            max_members: GuestRoom::MAX_MEMBERS,
            duration_minutes,
            is_guest: true,
            device_id: device.id.clone(),
        });

        self.pending_guest += 1;
        debug!(device_id = %device.id, duration_minutes, "creating guest room");

        let pending = PendingGuest {
            name,
            description,
            duration_minutes,
            created_at,
            expires_at,
            host: device.id.clone(),
            reply,
        };
        self.spawn_call(device, request, move |outcome| {
            Completion::Guest(pending, outcome)
        });
    }

    pub(crate) fn complete_guest(
        &mut self,
        pending: PendingGuest,
        outcome: Result<ApiResponse, TransportError>,
    ) {
        self.pending_guest = self.pending_guest.saturating_sub(1);

        let result = match created_room_id(outcome) {
            Ok(room_id) => {
                let room = GuestRoom {
                    id: room_id.clone(),
                    name: pending.name,
                    description: pending.description,
                    created_at: pending.created_at,
                    expires_at: pending.expires_at,
                    duration_minutes: pending.duration_minutes,
                    max_members: GuestRoom::MAX_MEMBERS,
                    host_device_id: pending.host,
                    current_members: 0,
                };
                self.store.push_guest(room.clone());
                self.persist("guest rooms", self.store.persist_guest());
                self.timers
                    .schedule(TimerKey::Guest(room_id.clone()), room.expires_at);

                info!(
                    %room_id,
                    device_id = %room.host_device_id,
                    expires_at = %room.expires_at,
                    "guest room created"
                );
                self.emit(RoomEvent::GuestCreated {
                    room_id,
                    expires_at: room.expires_at,
                });
                Ok(room)
            }
            Err(e) => {
                warn!(device_id = %pending.host, error = %e, "guest room creation failed");
                Err(e)
            }
        };

        if pending.reply.send(result).is_err() {
            debug!("caller left before guest room creation finished");
        }
    }

    /// Removes a guest room, tells its host, and reports why.
    ///
    /// Returns `None` if the room is already gone, so a late timer and an
    /// explicit cancel never both act on the same room.
    pub(crate) fn close_guest(&mut self, room_id: &RoomId, reason: CloseReason) -> Option<GuestRoom> {
        let room = self.store.remove_guest(room_id)?;
        self.timers.cancel(&TimerKey::Guest(room_id.clone()));
        self.persist("guest rooms", self.store.persist_guest());

        info!(%room_id, ?reason, "guest room closed");
        self.notify(
            &room.host_device_id,
            HostRequest::ExpireGuest {
                room_id: room_id.clone(),
            },
        );
        self.emit(RoomEvent::GuestClosed {
            room_id: room_id.clone(),
            reason,
        });
        Some(room)
    }

    pub(crate) fn overdue_guests(&self, now: DateTime<Utc>) -> Vec<RoomId> {
        self.store
            .guest_rooms()
            .iter()
            .filter(|room| room.is_expired_at(now))
            .map(|room| room.id.clone())
            .collect()
    }

    /// Drops overdue guest rooms and rearms the rest from their stored
    /// `expires_at`.
    pub(crate) fn cleanup_guests(&mut self, now: DateTime<Utc>, report: &mut CleanupReport) {
        for room_id in self.overdue_guests(now) {
            if self.close_guest(&room_id, CloseReason::Expired).is_some() {
                report.guest_removed += 1;
            }
        }

        let remaining: Vec<(RoomId, DateTime<Utc>)> = self
            .store
            .guest_rooms()
            .iter()
            .map(|room| (room.id.clone(), room.expires_at))
            .collect();
        for (room_id, expires_at) in remaining {
            self.timers.schedule(TimerKey::Guest(room_id), expires_at);
            report.guest_rescheduled += 1;
        }
    }
}
