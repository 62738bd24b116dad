//! HTTP transport with the controller's base64 envelope.

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::debug;

/// Failures surfaced by one transport round trip. Never fatal: the
/// beacon treats any of these as a failed cycle and keeps polling.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network, TLS, or HTTP-level failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid base64.
    #[error("response envelope was not base64: {0}")]
    Envelope(#[from] base64::DecodeError),

    /// Decoded response bytes were not UTF-8 text.
    #[error("response was not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// One controller round trip — enables test doubles for the beacon loop.
///
/// `send` performs a single POST and returns the decoded response text.
/// No retry happens at this layer; retry policy belongs to the caller.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// POST `body` to `path` (relative to the controller base URL) and
    /// return the response decoded to text.
    ///
    /// # Errors
    ///
    /// Returns an error on any network, TLS, or envelope-decode failure.
    async fn send(&self, path: &str, body: &[u8]) -> Result<String>;
}

/// Production transport: reqwest over HTTPS.
///
/// Certificate validation is disabled on purpose — controllers in the
/// field run with self-signed certificates — and TLS 1.2 is the floor.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a client for the given controller base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying TLS backend cannot be
    /// initialised.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// The wire protocol wraps every request and response body in a
    /// base64 text envelope; raw JSON never travels on the wire.
    async fn round_trip(&self, path: &str, body: &[u8]) -> Result<String, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, bytes = body.len(), "posting envelope");
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(BASE64.encode(body))
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        let decoded = BASE64.decode(text.trim())?;
        Ok(String::from_utf8(decoded)?)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, path: &str, body: &[u8]) -> Result<String> {
        Ok(self.round_trip(path, body).await?)
    }
}
