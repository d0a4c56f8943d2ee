//! Notifications broadcast to subscribers (typically the UI).

use chrono::{DateTime, Utc};
use voxhost_protocol::{DeviceId, GraceKind, RoomId};

/// Why an ephemeral room went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Its deadline passed.
    Expired,
    /// Someone closed it explicitly.
    Cancelled,
}

/// A change to the local room collections.
///
/// Sent on a `tokio::sync::broadcast` channel; a slow subscriber that
/// falls behind sees `RecvError::Lagged` and misses events, it never
/// blocks the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    PermanentCreated {
        room_id: RoomId,
        host: DeviceId,
    },
    PermanentDeleted {
        room_id: RoomId,
    },
    PermanentMigrated {
        room_id: RoomId,
        from: Option<DeviceId>,
        to: DeviceId,
    },
    GuestCreated {
        room_id: RoomId,
        expires_at: DateTime<Utc>,
    },
    GuestClosed {
        room_id: RoomId,
        reason: CloseReason,
    },
    OpenLinkCreated {
        room_id: RoomId,
    },
    OpenLinkGraceStarted {
        room_id: RoomId,
        kind: GraceKind,
        removal_at: DateTime<Utc>,
    },
    OpenLinkExtended {
        room_id: RoomId,
        removal_at: DateTime<Utc>,
    },
    OpenLinkClosed {
        room_id: RoomId,
        reason: CloseReason,
    },
}

impl RoomEvent {
    /// The room this event is about.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::PermanentCreated { room_id, .. }
            | Self::PermanentDeleted { room_id }
            | Self::PermanentMigrated { room_id, .. }
            | Self::GuestCreated { room_id, .. }
            | Self::GuestClosed { room_id, .. }
            | Self::OpenLinkCreated { room_id }
            | Self::OpenLinkGraceStarted { room_id, .. }
            | Self::OpenLinkExtended { room_id, .. }
            | Self::OpenLinkClosed { room_id, .. } => room_id,
        }
    }
}
