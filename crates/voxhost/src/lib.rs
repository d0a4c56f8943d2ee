//! # Voxhost
//!
//! Room lifecycle and capacity engine for self-hosted voice chat.
//!
//! Rooms run on the user's own paired devices. Voxhost decides whether a
//! room may be created (membership and paid-tier quotas), which device
//! hosts it (rotation policy), and when short-lived rooms go away (guest
//! expiry, OpenLink grace windows), persisting deadlines so they survive
//! a restart.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voxhost::prelude::*;
//!
//! # async fn run() -> Result<(), VoxhostError> {
//! let client = VoxhostClient::builder()
//!     .state_dir("./voxhost-state")
//!     .build()
//!     .await?;
//!
//! let guest = client
//!     .rooms()
//!     .create_guest_room("Drop-in", "say hi")
//!     .await?;
//! println!("guest room {} closes at {}", guest.id, guest.expires_at);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{VoxhostClient, VoxhostClientBuilder};
pub use error::VoxhostError;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Everything an application needs in one import.
pub mod prelude {
    pub use crate::{VoxhostClient, VoxhostClientBuilder, VoxhostError, init_tracing};

    pub use voxhost_protocol::{
        DeviceCandidate, DeviceId, GraceKind, GuestRoom, OpenLinkRoom, PermanentRoom, RoomId,
        UserId,
    };
    pub use voxhost_quota::{
        MembershipLevel, PaidTier, QuotaProfile, QuotaSummary, QuotaTables, ReputationTier,
        RotationPolicy, RotationState, TrustStatus,
    };
    pub use voxhost_room::{
        CleanupReport, CloseReason, DeviceDirectory, NewPermanentRoom, RoomError, RoomEvent,
        RoomService, RoomServiceConfig, StaticDirectory,
    };
    pub use voxhost_store::{FileStore, MemoryStore};
    pub use voxhost_timer::{Clock, SystemClock, TokioClock};
    pub use voxhost_transport::{HostTransport, HttpTransportConfig, TransportError};
}
