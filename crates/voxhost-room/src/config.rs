//! Room service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use voxhost_quota::QuotaTables;

/// Shortest guest-room lifetime, in minutes.
pub const GUEST_MIN_MINUTES: u32 = 10;

/// Longest guest-room lifetime, in minutes.
pub const GUEST_MAX_MINUTES: u32 = 30;

/// Latest an OpenLink room may be removed, measured from the end of its
/// connection. Extensions never push removal past this.
pub const OPENLINK_GRACE_LIMIT: Duration = Duration::from_secs(15 * 60);

// ---------------------------------------------------------------------------
// RoomServiceConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`RoomService`](crate::RoomService).
///
/// Every field has a default, so deployments only override what they
/// need:
///
/// ```rust
/// use std::time::Duration;
/// use voxhost_room::RoomServiceConfig;
///
/// let config = RoomServiceConfig {
///     sweep_interval: Duration::ZERO,
///     ..RoomServiceConfig::default()
/// };
/// assert_eq!(config.guest_max_minutes, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomServiceConfig {
    /// Identity sent with every sync broadcast.
    pub client_id: String,

    /// Lower bound of the randomized guest lifetime, in minutes.
    pub guest_min_minutes: u32,

    /// Upper bound of the randomized guest lifetime, in minutes.
    pub guest_max_minutes: u32,

    /// Grace window after an OpenLink connection ends.
    pub openlink_standard_grace: Duration,

    /// Shortest extra grace granted when an extension is requested.
    pub openlink_extension_min: Duration,

    /// Longest extra grace granted when an extension is requested.
    pub openlink_extension_max: Duration,

    /// Hard limit on removal, measured from the connection's end. Never
    /// above [`OPENLINK_GRACE_LIMIT`].
    pub openlink_grace_cap: Duration,

    /// Period of the overdue-room sweep. Zero disables it.
    pub sweep_interval: Duration,

    /// Capacity of the command channel feeding the service actor.
    pub command_channel_size: usize,

    /// Capacity of the [`RoomEvent`](crate::RoomEvent) broadcast.
    pub event_channel_size: usize,

    /// Permanent-room lookup tables.
    pub quota_tables: QuotaTables,
}

impl Default for RoomServiceConfig {
    fn default() -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().to_string(),
            guest_min_minutes: GUEST_MIN_MINUTES,
            guest_max_minutes: GUEST_MAX_MINUTES,
            openlink_standard_grace: Duration::from_secs(5 * 60),
            openlink_extension_min: Duration::from_secs(5 * 60),
            openlink_extension_max: Duration::from_secs(10 * 60),
            openlink_grace_cap: OPENLINK_GRACE_LIMIT,
            sweep_interval: Duration::from_secs(30),
            command_channel_size: 64,
            event_channel_size: 64,
            quota_tables: QuotaTables::default(),
        }
    }
}

impl RoomServiceConfig {
    /// Clamps every field into its legal range.
    ///
    /// - guest lifetimes stay within 10..=30 minutes, min ≤ max
    /// - extension min ≤ max
    /// - the grace cap stays at or below 15 minutes
    /// - the standard grace never exceeds the cap
    /// - channel sizes are at least 1
    pub fn validated(mut self) -> Self {
        self.guest_min_minutes = self
            .guest_min_minutes
            .clamp(GUEST_MIN_MINUTES, GUEST_MAX_MINUTES);
        self.guest_max_minutes = self
            .guest_max_minutes
            .clamp(self.guest_min_minutes, GUEST_MAX_MINUTES);

        if self.openlink_extension_max < self.openlink_extension_min {
            self.openlink_extension_max = self.openlink_extension_min;
        }
        self.openlink_grace_cap = self.openlink_grace_cap.min(OPENLINK_GRACE_LIMIT);
        self.openlink_standard_grace = self.openlink_standard_grace.min(self.openlink_grace_cap);

        self.command_channel_size = self.command_channel_size.max(1);
        self.event_channel_size = self.event_channel_size.max(1);
        self
    }
}
