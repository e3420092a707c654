//! Sending encoded documents to the endpoint.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config_validator::ConfigValidator;
use crate::error::{ThrottlerError, ThrottlerResult, TransportError};

/// One outbound `POST`.
#[derive(Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub content_type: String,
    /// Opaque credential, sent as `Authorization: Bearer <token>`.
    pub bearer_token: String,
    pub body: Vec<u8>,
}

impl OutboundRequest {
    pub fn method(&self) -> &'static str {
        "POST"
    }

    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.bearer_token)
    }
}

impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("url", &self.url)
            .field("content_type", &self.content_type)
            .field("bearer_token", &"<redacted>")
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Delivers a request and reports the HTTP status code.
///
/// Any response, including non-2xx, is `Ok(status)`. Only failures to get a
/// response at all are errors; the client decides what a status means.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<u16, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> ThrottlerResult<Self> {
        ConfigValidator::validate_timeout(timeout)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ThrottlerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<u16, TransportError> {
        let authorization = request.authorization();
        let response = self
            .client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, request.content_type)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        debug!(url = %request.url, status, "endpoint responded");
        Ok(status)
    }
}
