//! HTTP/JSON transport implementation using `reqwest`.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Url};
use voxhost_protocol::{
    ApiResponse, Codec, DeviceCandidate, HostMethod, HostRequest, JsonCodec,
};

use crate::{HostTransport, TransportError};

/// Settings for [`HttpHostTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Upper bound for a whole request, connect to last body byte.
    pub request_timeout: Duration,
    /// `User-Agent` header sent with every call.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: format!("voxhost/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A [`HostTransport`] that speaks HTTP/JSON to the device's base URL.
///
/// One `reqwest::Client` is shared by every call, so connections to the
/// same device are pooled.
#[derive(Debug, Clone)]
pub struct HttpHostTransport {
    client: Client,
    codec: JsonCodec,
}

impl HttpHostTransport {
    /// Builds a transport with the given settings.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            client,
            codec: JsonCodec,
        })
    }
}

impl HostTransport for HttpHostTransport {
    async fn call(
        &self,
        device: &DeviceCandidate,
        request: &HostRequest,
    ) -> Result<ApiResponse, TransportError> {
        let url = endpoint_url(&device.base_url, request)?;
        let method = match request.method() {
            HostMethod::Post => Method::POST,
            HostMethod::Delete => Method::DELETE,
        };

        let mut builder = self.client.request(method, url);
        if !device.access_token.is_empty() {
            builder = builder.bearer_auth(&device.access_token);
        }
        if let Some(body) = request.encode_body(&self.codec)? {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body);
        }

        tracing::trace!(
            device_id = %device.id,
            path = %request.path(),
            "sending host request"
        );

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        // Notification endpoints may answer with an empty body.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return if status.is_success() {
                Ok(ApiResponse::ok())
            } else {
                Err(TransportError::Status(status.as_u16()))
            };
        }

        match self.codec.decode::<ApiResponse>(&bytes) {
            Ok(envelope) => Ok(envelope),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(TransportError::Status(status.as_u16())),
        }
    }
}

/// Joins a device base URL with a request's path segments.
///
/// Segments are percent-encoded, and a trailing slash on the base URL
/// doesn't produce an empty segment. Only `http` and `https` base URLs
/// are accepted.
pub fn endpoint_url(
    base_url: &str,
    request: &HostRequest,
) -> Result<Url, TransportError> {
    let mut url = Url::parse(base_url.trim())
        .map_err(|e| TransportError::InvalidEndpoint(format!("{base_url}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(TransportError::InvalidEndpoint(format!(
            "{base_url}: unsupported scheme {}",
            url.scheme()
        )));
    }

    url.path_segments_mut()
        .map_err(|_| {
            TransportError::InvalidEndpoint(format!(
                "{base_url}: cannot be a base URL"
            ))
        })?
        .pop_if_empty()
        .extend(request.path_segments());
    Ok(url)
}
