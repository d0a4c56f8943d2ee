//! OpenLink rooms: hidden rooms tied to one visitor connection.
//!
//! ```text
//! Active ──end_connection──→ GracePeriod ──deadline / cancel──→ removed
//!                              ↺ extend (never past ended + cap)
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};
use voxhost_protocol::{
    ApiResponse, CreateOpenLinkRequest, DeviceId, GraceKind, HostRequest, OpenLinkRoom,
    RoomId, UserId,
};
use voxhost_transport::{HostTransport, TransportError};

use crate::actor::{Completion, RoomActor, TimerKey, created_room_id, is_due, span};
use crate::service::{CleanupReport, Reply};
use crate::{CloseReason, RoomError, RoomEvent};

/// An OpenLink create waiting on its host.
pub(crate) struct PendingOpenLink {
    initiator_id: UserId,
    visitor_id: UserId,
    host: DeviceId,
    created_at: DateTime<Utc>,
    reply: Reply<OpenLinkRoom>,
}

impl<T: HostTransport> RoomActor<T> {
    pub(crate) fn create_openlink(
        &mut self,
        initiator_id: UserId,
        visitor_id: UserId,
        reply: Reply<OpenLinkRoom>,
    ) {
        let device = match self.select_device() {
            Ok(device) => device,
            Err(e) => {
                debug!(error = %e, "openlink room refused");
                let _ = reply.send(Err(e));
                return;
            }
        };

        let request = HostRequest::CreateOpenLink(CreateOpenLinkRequest {
            initiator_id: initiator_id.clone(),
            visitor_id: visitor_id.clone(),
            is_hidden: true,
            kind: CreateOpenLinkRequest::KIND.to_string(),
            device_id: device.id.clone(),
        });
        debug!(device_id = %device.id, %initiator_id, %visitor_id, "creating openlink room");

        let pending = PendingOpenLink {
            initiator_id,
            visitor_id,
            host: device.id.clone(),
            created_at: self.clock.now(),
            reply,
        };
        self.spawn_call(device, request, move |outcome| {
            Completion::OpenLink(pending, outcome)
        });
    }

    pub(crate) fn complete_openlink(
        &mut self,
        pending: PendingOpenLink,
        outcome: Result<ApiResponse, TransportError>,
    ) {
        let result = match created_room_id(outcome) {
            Ok(room_id) => {
                let room = OpenLinkRoom::active(
                    room_id.clone(),
                    pending.initiator_id,
                    pending.visitor_id,
                    pending.host,
                    pending.created_at,
                );
                self.store.push_openlink(room.clone());
                self.persist("openlink rooms", self.store.persist_openlink());

                info!(%room_id, device_id = %room.host_device_id, "openlink room created");
                self.emit(RoomEvent::OpenLinkCreated { room_id });
                Ok(room)
            }
            Err(e) => {
                warn!(device_id = %pending.host, error = %e, "openlink room creation failed");
                Err(e)
            }
        };

        if pending.reply.send(result).is_err() {
            debug!("caller left before openlink room creation finished");
        }
    }

    /// Ends the connection and starts the grace window.
    ///
    /// The window is the standard grace, plus a random extension when
    /// `needs_extension` is set. It never exceeds the absolute cap.
    pub(crate) fn end_connection(
        &mut self,
        room_id: RoomId,
        needs_extension: bool,
    ) -> Result<OpenLinkRoom, RoomError> {
        match self.store.openlink(&room_id) {
            None => return Err(RoomError::NotFound(room_id)),
            Some(room) if !room.is_connection_active => {
                return Err(RoomError::ConnectionAlreadyEnded(room_id));
            }
            Some(_) => {}
        }

        let (kind, grace) = if needs_extension {
            let extra = self.rng.random_range(
                self.config.openlink_extension_min.as_secs()
                    ..=self.config.openlink_extension_max.as_secs(),
            );
            let extra = span(std::time::Duration::from_secs(extra));
            (GraceKind::Extended, span(self.config.openlink_standard_grace) + extra)
        } else {
            (GraceKind::Standard, span(self.config.openlink_standard_grace))
        };
        let grace = grace.min(span(self.config.openlink_grace_cap));

        let now = self.clock.now();
        let removal_at = now + grace;
        let Some(room) = self.store.openlink_mut(&room_id) else {
            return Err(RoomError::NotFound(room_id));
        };
        room.is_connection_active = false;
        room.connection_ended_at = Some(now);
        room.scheduled_removal_at = Some(removal_at);
        room.grace = Some(kind);
        let updated = room.clone();

        self.persist("openlink rooms", self.store.persist_openlink());
        self.timers
            .schedule(TimerKey::OpenLink(room_id.clone()), removal_at);

        info!(%room_id, ?kind, removal_at = %removal_at, "openlink connection ended");
        self.emit(RoomEvent::OpenLinkGraceStarted {
            room_id,
            kind,
            removal_at,
        });
        Ok(updated)
    }

    /// Sets removal to `now + additional_minutes`, clamped to the cap
    /// measured from when the connection ended.
    pub(crate) fn extend(
        &mut self,
        room_id: RoomId,
        additional_minutes: u32,
    ) -> Result<OpenLinkRoom, RoomError> {
        let now = self.clock.now();
        let cap = span(self.config.openlink_grace_cap);

        let Some(room) = self.store.openlink_mut(&room_id) else {
            return Err(RoomError::NotFound(room_id));
        };
        let Some(ended_at) = room.connection_ended_at else {
            return Err(RoomError::ConnectionStillActive(room_id));
        };

        let requested = now + chrono::Duration::minutes(i64::from(additional_minutes));
        let removal_at = requested.min(ended_at + cap);
        room.scheduled_removal_at = Some(removal_at);
        room.grace = Some(GraceKind::Extended);
        let updated = room.clone();

        self.persist("openlink rooms", self.store.persist_openlink());
        self.timers
            .schedule(TimerKey::OpenLink(room_id.clone()), removal_at);

        info!(
            %room_id,
            additional_minutes,
            removal_at = %removal_at,
            capped = requested > removal_at,
            "openlink grace extended"
        );
        self.emit(RoomEvent::OpenLinkExtended {
            room_id,
            removal_at,
        });
        Ok(updated)
    }

    /// Removes an OpenLink room and tells its host.
    pub(crate) fn close_openlink(
        &mut self,
        room_id: &RoomId,
        reason: CloseReason,
    ) -> Option<OpenLinkRoom> {
        let room = self.store.remove_openlink(room_id)?;
        self.timers.cancel(&TimerKey::OpenLink(room_id.clone()));
        self.persist("openlink rooms", self.store.persist_openlink());

        info!(%room_id, ?reason, "openlink room closed");
        self.notify(
            &room.host_device_id,
            HostRequest::RemoveOpenLink {
                room_id: room_id.clone(),
            },
        );
        self.emit(RoomEvent::OpenLinkClosed {
            room_id: room_id.clone(),
            reason,
        });
        Some(room)
    }

    /// The deadline of an ended connection. Records written without a
    /// removal time fall back to the standard grace.
    fn removal_deadline(&self, room: &OpenLinkRoom) -> Option<DateTime<Utc>> {
        if room.is_connection_active {
            return None;
        }
        room.scheduled_removal_at.or_else(|| {
            room.connection_ended_at
                .map(|ended| ended + span(self.config.openlink_standard_grace))
        })
    }

    pub(crate) fn overdue_openlinks(&self, now: DateTime<Utc>) -> Vec<RoomId> {
        self.store
            .openlink_rooms()
            .iter()
            .filter(|room| self.removal_deadline(room).is_some_and(|at| is_due(at, now)))
            .map(|room| room.id.clone())
            .collect()
    }

    /// Drops overdue OpenLink rooms and rearms the rest from their stored
    /// removal deadline. Rooms with a live connection are left alone.
    pub(crate) fn cleanup_openlinks(&mut self, now: DateTime<Utc>, report: &mut CleanupReport) {
        for room_id in self.overdue_openlinks(now) {
            if self.close_openlink(&room_id, CloseReason::Expired).is_some() {
                report.openlink_removed += 1;
            }
        }

        let remaining: Vec<(RoomId, DateTime<Utc>)> = self
            .store
            .openlink_rooms()
            .iter()
            .filter_map(|room| Some((room.id.clone(), self.removal_deadline(room)?)))
            .collect();
        for (room_id, removal_at) in remaining {
            self.timers.schedule(TimerKey::OpenLink(room_id), removal_at);
            report.openlink_rescheduled += 1;
        }
    }
}
