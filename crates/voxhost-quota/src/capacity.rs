//! Per-identity quota formulas.
//!
//! Three quotas are derived from a [`QuotaProfile`]:
//!
//! ```text
//! max permanent rooms  = base_rooms(level) + paid_room_bonus(tier) + reputation rooms
//! max members per room = base_members(level) + paid_member_bonus(tier) + reputation capacity
//! server capacity      = clamp(50 + level + tier + trust + reputation + activity, 50, 5000)
//! ```
//!
//! None of these can fail. Out-of-range inputs saturate or clamp.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{MembershipLevel, PaidTier, QuotaProfile, ReputationTier};

/// Member count at which a room is displayed as "unlimited".
///
/// Display-only: the room still carries its real numeric cap.
pub const UNLIMITED_MEMBERS_THRESHOLD: u32 = 1000;

/// Lowest host capacity any identity can have.
pub const SERVER_CAPACITY_FLOOR: u32 = 50;

/// Highest host capacity any identity can have.
pub const SERVER_CAPACITY_CEILING: u32 = 5000;

/// Upper bound on the activity contribution to host capacity.
const ACTIVITY_BONUS_CAP: i64 = 500;

// ---------------------------------------------------------------------------
// QuotaTables
// ---------------------------------------------------------------------------

/// Permanent-room lookup tables owned by the membership subsystem.
///
/// Injected rather than hardcoded: the defaults below are only a
/// starting point for deployments that don't supply their own. A level
/// or tier missing from a table contributes zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaTables {
    /// Membership level → permanent rooms.
    pub base_rooms: HashMap<MembershipLevel, u32>,
    /// Paid tier → extra permanent rooms.
    pub paid_tier_room_bonus: HashMap<PaidTier, u32>,
}

impl Default for QuotaTables {
    fn default() -> Self {
        Self {
            base_rooms: HashMap::from([
                (MembershipLevel::Newbie, 1),
                (MembershipLevel::Regular, 3),
                (MembershipLevel::Outstanding, 10),
            ]),
            paid_tier_room_bonus: HashMap::from([
                (PaidTier::None, 0),
                (PaidTier::Supporter, 5),
                (PaidTier::Unlimited, 50),
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// Member lookups
// ---------------------------------------------------------------------------

/// Members per room granted by membership level alone.
pub fn base_members_per_room(level: MembershipLevel) -> u32 {
    match level {
        MembershipLevel::Newbie => 2,
        MembershipLevel::Regular => 10,
        MembershipLevel::Outstanding => 50,
    }
}

/// Extra members per room granted by the paid tier.
pub fn paid_tier_member_bonus(tier: PaidTier) -> u32 {
    match tier {
        PaidTier::None => 0,
        PaidTier::Supporter => 25,
        PaidTier::Unlimited => 950,
    }
}

fn level_server_bonus(level: MembershipLevel) -> i64 {
    match level {
        MembershipLevel::Newbie => 0,
        MembershipLevel::Regular => 50,
        MembershipLevel::Outstanding => 150,
    }
}

fn paid_tier_server_bonus(tier: PaidTier) -> i64 {
    match tier {
        PaidTier::None => 0,
        PaidTier::Supporter => 200,
        PaidTier::Unlimited => 1000,
    }
}

/// NaN and anything below 70 contribute nothing.
fn trust_server_bonus(trust_score: f64) -> i64 {
    if trust_score >= 90.0 {
        100
    } else if trust_score >= 80.0 {
        50
    } else if trust_score >= 70.0 {
        25
    } else {
        0
    }
}

fn reputation_server_bonus(tier: ReputationTier) -> i64 {
    match tier {
        ReputationTier::Veteran => 500,
        ReputationTier::Established => 200,
        ReputationTier::Active => 100,
        ReputationTier::Standard => 50,
        ReputationTier::Newcomer => 0,
    }
}

// ---------------------------------------------------------------------------
// CapacityCalculator
// ---------------------------------------------------------------------------

/// All quotas for one identity, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSummary {
    pub max_permanent_rooms: u32,
    pub owned_rooms: u32,
    pub max_members_per_room: u32,
    pub has_unlimited_capacity: bool,
    pub server_capacity: u32,
}

impl QuotaSummary {
    /// Permanent rooms the identity may still create.
    pub fn remaining_rooms(&self) -> u32 {
        self.max_permanent_rooms.saturating_sub(self.owned_rooms)
    }
}

/// Stateless quota formulas over a [`QuotaProfile`].
#[derive(Debug, Clone, Default)]
pub struct CapacityCalculator {
    tables: QuotaTables,
}

impl CapacityCalculator {
    /// Creates a calculator using the given permanent-room tables.
    pub fn new(tables: QuotaTables) -> Self {
        Self { tables }
    }

    /// The injected tables.
    pub fn tables(&self) -> &QuotaTables {
        &self.tables
    }

    /// Permanent rooms the identity may own at once.
    pub fn max_permanent_rooms(&self, profile: &QuotaProfile) -> u32 {
        let base = self
            .tables
            .base_rooms
            .get(&profile.membership_level)
            .copied()
            .unwrap_or(0);
        let paid = self
            .tables
            .paid_tier_room_bonus
            .get(&profile.paid_tier)
            .copied()
            .unwrap_or(0);
        base.saturating_add(paid)
            .saturating_add(profile.reputation_bonus_rooms)
    }

    /// Member cap for each room the identity creates.
    pub fn max_members_per_room(&self, profile: &QuotaProfile) -> u32 {
        base_members_per_room(profile.membership_level)
            .saturating_add(paid_tier_member_bonus(profile.paid_tier))
            .saturating_add(profile.reputation_bonus_capacity)
    }

    /// Whether the member cap should be shown as "unlimited".
    pub fn has_unlimited_capacity(&self, profile: &QuotaProfile) -> bool {
        self.max_members_per_room(profile) >= UNLIMITED_MEMBERS_THRESHOLD
    }

    /// Maximum number of rooms a host device of this identity may serve.
    ///
    /// Always within [`SERVER_CAPACITY_FLOOR`]..=[`SERVER_CAPACITY_CEILING`].
    pub fn server_capacity(&self, profile: &QuotaProfile) -> u32 {
        let activity = profile
            .days_active
            .saturating_mul(2)
            .min(ACTIVITY_BONUS_CAP);

        let total = i64::from(SERVER_CAPACITY_FLOOR)
            .saturating_add(level_server_bonus(profile.membership_level))
            .saturating_add(paid_tier_server_bonus(profile.paid_tier))
            .saturating_add(trust_server_bonus(profile.trust_score))
            .saturating_add(reputation_server_bonus(profile.reputation_tier))
            .saturating_add(activity);

        let clamped = total.clamp(
            i64::from(SERVER_CAPACITY_FLOOR),
            i64::from(SERVER_CAPACITY_CEILING),
        );
        // In range by the clamp above.
        clamped as u32
    }

    /// Computes every quota at once.
    pub fn summary(&self, profile: &QuotaProfile, owned_rooms: u32) -> QuotaSummary {
        QuotaSummary {
            max_permanent_rooms: self.max_permanent_rooms(profile),
            owned_rooms,
            max_members_per_room: self.max_members_per_room(profile),
            has_unlimited_capacity: self.has_unlimited_capacity(profile),
            server_capacity: self.server_capacity(profile),
        }
    }
}
