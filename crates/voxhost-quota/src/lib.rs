//! Quota formulas and host placement for Voxhost.
//!
//! Everything in this crate is a pure function of its inputs:
//!
//! - [`CapacityCalculator`] turns a [`QuotaProfile`] (membership tier,
//!   paid tier, trust, reputation, activity) into permanent-room,
//!   member-per-room, and host-capacity quotas.
//! - [`DeviceSelector`] picks a hosting device from the online
//!   candidates according to a [`RotationPolicy`].
//!
//! Neither caches state. Callers pass the profile on every call and
//! persist the rotation pointer themselves.

mod capacity;
mod error;
mod profile;
mod rotation;

pub use capacity::{
    CapacityCalculator, QuotaSummary, QuotaTables, SERVER_CAPACITY_FLOOR,
    SERVER_CAPACITY_CEILING, UNLIMITED_MEMBERS_THRESHOLD,
    base_members_per_room, paid_tier_member_bonus,
};
pub use error::SelectionError;
pub use profile::{
    MembershipLevel, PaidTier, QuotaProfile, ReputationTier, TrustStatus,
};
pub use rotation::{DeviceSelector, RotationPolicy, RotationState, Selection};
