//! Error types for the room layer.

use voxhost_protocol::RoomId;
use voxhost_quota::SelectionError;
use voxhost_transport::TransportError;

/// Message used when a host rejects a call without saying why.
pub(crate) const REJECTED_WITHOUT_REASON: &str = "request rejected by host";

/// Message used when a host accepts a create call but omits the room ID.
pub(crate) const MISSING_ROOM_ID: &str = "host response missing roomId";

/// Errors that can occur during room operations.
///
/// `Banned`, `QuotaExceeded` and `AlreadyHasRoom` are policy checks and
/// `NoDeviceAvailable` is a placement check. All four are decided
/// locally before any host is contacted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The identity's trust status is banned.
    #[error("account is banned from creating rooms")]
    Banned,

    /// The owner already holds as many permanent rooms as allowed.
    #[error("permanent room quota exceeded ({owned}/{limit})")]
    QuotaExceeded { owned: u32, limit: u32 },

    /// A guest room already exists (or is being created).
    #[error("a guest room already exists")]
    AlreadyHasRoom,

    /// No hosting device is online.
    #[error("no hosting device is available")]
    NoDeviceAvailable,

    /// The selected device's base URL is unusable.
    #[error("invalid host endpoint: {0}")]
    InvalidEndpoint(String),

    /// The host could not be reached or answered garbage.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The host answered and refused. Carries its message verbatim.
    #[error("{0}")]
    ServerRejected(String),

    /// No room with this ID is recorded locally.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The OpenLink connection hasn't ended, so there's no grace to extend.
    #[error("connection for room {0} is still active")]
    ConnectionStillActive(RoomId),

    /// The OpenLink connection already ended.
    #[error("connection for room {0} already ended")]
    ConnectionAlreadyEnded(RoomId),

    /// The room service has stopped.
    #[error("room service is unavailable")]
    Unavailable,
}

impl From<SelectionError> for RoomError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::NoDeviceAvailable => Self::NoDeviceAvailable,
        }
    }
}

impl From<TransportError> for RoomError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidEndpoint(reason) => Self::InvalidEndpoint(reason),
            TransportError::Network(reason) => Self::NetworkFailure(reason),
            other => Self::NetworkFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_rejection_displays_verbatim() {
        let err = RoomError::ServerRejected("room name taken".into());
        assert_eq!(err.to_string(), "room name taken");
    }

    #[test]
    fn test_transport_errors_map_onto_taxonomy() {
        assert_eq!(
            RoomError::from(TransportError::InvalidEndpoint("ftp://x".into())),
            RoomError::InvalidEndpoint("ftp://x".into())
        );
        assert_eq!(
            RoomError::from(TransportError::Network("refused".into())),
            RoomError::NetworkFailure("refused".into())
        );
        assert!(matches!(
            RoomError::from(TransportError::Status(502)),
            RoomError::NetworkFailure(msg) if msg.contains("502")
        ));
    }

    #[test]
    fn test_selection_error_maps_to_no_device() {
        assert_eq!(
            RoomError::from(SelectionError::NoDeviceAvailable),
            RoomError::NoDeviceAvailable
        );
    }
}
