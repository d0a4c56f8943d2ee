//! Transport abstraction for reaching Voxhost hosting devices.
//!
//! Provides the [`HostTransport`] trait: a generic request-response
//! channel that delivers a [`HostRequest`] to one [`DeviceCandidate`] and
//! returns the host's [`ApiResponse`] envelope.
//!
//! A `{"success": false}` answer is still `Ok` at this layer. Deciding
//! what a rejection means is the room engine's job; the transport only
//! fails when no envelope came back at all.
//!
//! # Feature Flags
//!
//! - `http` (default): HTTP/JSON transport via `reqwest`

mod error;
#[cfg(feature = "http")]
mod http;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::{HttpHostTransport, HttpTransportConfig, endpoint_url};

use std::future::Future;
use std::sync::Arc;

use voxhost_protocol::{ApiResponse, DeviceCandidate, HostRequest};

/// Delivers host API calls to a device.
///
/// The returned future must be `Send`: the room engine spawns every
/// host call on its own Tokio task so the coordination loop never
/// waits on the network. Implementors can still write `async fn`.
pub trait HostTransport: Send + Sync + 'static {
    /// Sends `request` to `device` and returns the host's envelope.
    fn call(
        &self,
        device: &DeviceCandidate,
        request: &HostRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

impl<T: HostTransport> HostTransport for Arc<T> {
    fn call(
        &self,
        device: &DeviceCandidate,
        request: &HostRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send {
        (**self).call(device, request)
    }
}
