//! Error types for host placement.

/// Errors that can occur while choosing a hosting device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// No candidate device is online.
    #[error("no hosting device is available")]
    NoDeviceAvailable,
}
