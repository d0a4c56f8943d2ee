//! Core records for Voxhost rooms and hosting devices.
//!
//! These are the structures the room engine keeps in memory, persists
//! across restarts, and summarizes when talking to hosting devices.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a room, as assigned by the hosting device.
///
/// Hosts answer a create call with `{"success": true, "roomId": "..."}`;
/// the string is kept verbatim. `#[serde(transparent)]` keeps it a plain
/// JSON string rather than `{"0": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Wraps anything string-like as a room ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a peer device that can host rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Wraps anything string-like as a device ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a user, supplied by the identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Wraps anything string-like as a user ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// DeviceCandidate
// ---------------------------------------------------------------------------

/// A peer device that may host rooms.
///
/// Owned by the pairing subsystem; Voxhost only reads it. The access
/// token is redacted from `Debug` output so it never lands in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCandidate {
    /// Stable device identifier.
    pub id: DeviceId,
    /// Base URL of the device's room API, e.g. `http://10.0.0.4:8080`.
    #[serde(rename = "baseURL", alias = "baseUrl")]
    pub base_url: String,
    /// Bearer token presented on every host call.
    pub access_token: String,
    /// Whether the pairing subsystem currently sees the device online.
    pub is_online: bool,
}

impl fmt::Debug for DeviceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCandidate")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .field("is_online", &self.is_online)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PermanentRoom
// ---------------------------------------------------------------------------

/// A long-lived room owned by an authenticated identity.
///
/// Counts against the owner's permanent-room quota for as long as it
/// exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermanentRoom {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub owner_id: UserId,
    pub owner_handle: String,
    pub is_private: bool,
    /// Member cap computed from the owner's quota at creation time.
    pub max_members: u32,
    pub created_at: DateTime<Utc>,
    /// Device currently serving the room, if one is recorded.
    pub host_device_id: Option<DeviceId>,
    pub has_password: bool,
    pub current_members: u32,
    pub is_online: bool,
}

// ---------------------------------------------------------------------------
// GuestRoom
// ---------------------------------------------------------------------------

/// A short-lived anonymous room.
///
/// Guest rooms have no password or lock fields at all: they cannot be
/// locked, unlocked, or protected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRoom {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Absolute removal deadline, always `created_at + duration_minutes`.
    pub expires_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub max_members: u32,
    pub host_device_id: DeviceId,
    pub current_members: u32,
}

impl GuestRoom {
    /// Fixed member cap of every guest room.
    pub const MAX_MEMBERS: u32 = 15;

    /// Computes the expiry deadline for a guest room created at
    /// `created_at` with a lifetime of `duration_minutes`.
    pub fn expiry_for(
        created_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> DateTime<Utc> {
        created_at + Duration::seconds(i64::from(duration_minutes) * 60)
    }

    /// Returns `true` once the deadline has been reached.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// ---------------------------------------------------------------------------
// OpenLinkRoom
// ---------------------------------------------------------------------------

/// Which grace window an ended OpenLink connection received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraceKind {
    /// The fixed short window.
    Standard,
    /// The short window plus a randomized extension.
    Extended,
}

/// Where an OpenLink room sits in its lifecycle.
///
/// ```text
/// Active ──(end connection)──→ GracePeriod ──(deadline / cancel)──→ removed
///                                  ↺ (extend, capped)
/// ```
///
/// Removal is terminal: the record leaves the store, so there is no
/// `Removed` variant to observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenLinkPhase {
    Active,
    GracePeriod(GraceKind),
}

/// A hidden, connection-scoped room created for an ad-hoc visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLinkRoom {
    pub id: RoomId,
    pub initiator_id: UserId,
    pub visitor_id: UserId,
    pub created_at: DateTime<Utc>,
    pub host_device_id: DeviceId,
    pub is_connection_active: bool,
    /// Set exactly once, when the connection ends.
    pub connection_ended_at: Option<DateTime<Utc>>,
    /// Never later than `connection_ended_at` plus the absolute cap.
    pub scheduled_removal_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub grace: Option<GraceKind>,
    /// Always `true`; OpenLink rooms never appear in room listings.
    pub is_hidden: bool,
}

impl OpenLinkRoom {
    /// Builds a freshly created, active room.
    pub fn active(
        id: RoomId,
        initiator_id: UserId,
        visitor_id: UserId,
        host_device_id: DeviceId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            initiator_id,
            visitor_id,
            created_at,
            host_device_id,
            is_connection_active: true,
            connection_ended_at: None,
            scheduled_removal_at: None,
            grace: None,
            is_hidden: true,
        }
    }

    /// The room's current lifecycle phase.
    pub fn phase(&self) -> OpenLinkPhase {
        match (self.is_connection_active, self.grace) {
            (false, Some(kind)) => OpenLinkPhase::GracePeriod(kind),
            (false, None) => OpenLinkPhase::GracePeriod(GraceKind::Standard),
            (true, _) => OpenLinkPhase::Active,
        }
    }
}
