use voxhost_protocol::ProtocolError;

/// Errors that can occur while calling a hosting device.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The device's base URL can't be turned into a request URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The request never produced a response (refused, reset, timed out).
    #[error("network failure: {0}")]
    Network(String),

    /// The host answered with a non-success status and no JSON envelope.
    #[error("host returned HTTP {0}")]
    Status(u16),

    /// The request body couldn't be encoded, or a success response
    /// couldn't be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
