//! Quota inputs supplied by the membership, trust and identity subsystems.

use serde::{Deserialize, Serialize};

/// Membership tier earned through participation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipLevel {
    #[default]
    Newbie,
    Regular,
    Outstanding,
}

/// Paid subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaidTier {
    #[default]
    None,
    Supporter,
    Unlimited,
}

/// Reputation band derived from community standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationTier {
    #[default]
    Newcomer,
    Standard,
    Active,
    Established,
    Veteran,
}

/// Moderation standing from the trust subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustStatus {
    #[default]
    Good,
    Restricted,
    Banned,
}

/// Everything the quota formulas read about one identity.
///
/// Supplied fresh on every call and never stored. `trust_score` is a
/// 0–100 scale; `days_active` is signed so callers can pass whatever the
/// membership subsystem reports without pre-validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuotaProfile {
    pub membership_level: MembershipLevel,
    pub paid_tier: PaidTier,
    pub trust_status: TrustStatus,
    pub trust_score: f64,
    pub reputation_tier: ReputationTier,
    /// Extra permanent rooms granted by reputation.
    pub reputation_bonus_rooms: u32,
    /// Extra members per room granted by reputation.
    pub reputation_bonus_capacity: u32,
    pub days_active: i64,
}

impl QuotaProfile {
    /// Returns `true` if the trust subsystem has banned this identity.
    pub fn is_banned(&self) -> bool {
        self.trust_status == TrustStatus::Banned
    }
}
