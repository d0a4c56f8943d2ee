//! Error types for the persistence layer.

use std::path::PathBuf;

use voxhost_protocol::ProtocolError;

/// Errors that can occur while loading or saving room state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing medium failed.
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored entry couldn't be encoded or decoded.
    #[error("entry {key} is malformed: {source}")]
    Codec {
        key: &'static str,
        #[source]
        source: ProtocolError,
    },

    /// A stored entry was written by a newer schema than this build reads.
    #[error("entry {key} has schema version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        key: &'static str,
        found: u32,
        supported: u32,
    },
}
