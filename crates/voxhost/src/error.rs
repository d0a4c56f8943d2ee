//! Unified error type for the Voxhost engine.

use voxhost_protocol::ProtocolError;
use voxhost_room::RoomError;
use voxhost_store::StoreError;
use voxhost_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Applications using the `voxhost` facade handle this one type; `?`
/// converts the layer errors through the generated `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum VoxhostError {
    /// A room operation was refused or failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Persisted state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The host transport could not be set up.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A document could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
