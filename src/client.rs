//! Throttled submission client.
//!
//! Every call to [`SubmissionClient::submit`] takes one permit from the pool,
//! encodes the document, posts it and gives the permit back, whatever the
//! outcome. Failures come back to the caller as errors; nothing is retried.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config_validator::ConfigValidator;
use crate::error::{ThrottlerResult, TransportError};
use crate::metrics::{MetricsCollector, SubmissionMetrics};
use crate::permit_pool::PermitPool;
use crate::serializer::DocumentSerializer;
use crate::transport::{OutboundRequest, Transport};

/// Document creation endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";

/// Opaque credential attached to a submission as a bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Signature(<redacted>)")
    }
}

impl From<String> for Signature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Signature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A document together with the signature that authorizes it.
#[derive(Debug, Clone)]
pub struct SubmissionRequest<D> {
    document: D,
    signature: Signature,
}

impl<D> SubmissionRequest<D> {
    pub fn new(document: D, signature: impl Into<Signature>) -> Self {
        Self {
            document,
            signature: signature.into(),
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// A submission the endpoint accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitted {
    pub submission_id: Uuid,
    pub status: u16,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

pub type SubmissionResult = ThrottlerResult<Submitted>;

pub struct SubmissionClient<S, T> {
    pool: PermitPool,
    serializer: S,
    transport: T,
    endpoint: String,
    metrics: MetricsCollector,
}

impl<S, T> SubmissionClient<S, T>
where
    T: Transport,
{
    pub fn new(pool: PermitPool, serializer: S, transport: T) -> Self {
        Self {
            pool,
            serializer,
            transport,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            metrics: MetricsCollector::new(),
        }
    }

    /// Post to `endpoint` instead of [`DEFAULT_ENDPOINT`].
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> ThrottlerResult<Self> {
        let endpoint = endpoint.into();
        ConfigValidator::validate_endpoint(&endpoint)?;
        self.endpoint = endpoint;
        Ok(self)
    }

    /// Submit one document, waiting for a permit if the pool is exhausted.
    pub async fn submit<D>(&self, request: SubmissionRequest<D>) -> SubmissionResult
    where
        S: DocumentSerializer<D>,
    {
        let submission_id = Uuid::new_v4();
        let span = info_span!("submit", %submission_id);

        async move {
            let result = self.submit_inner(submission_id, request).await;
            match &result {
                Ok(submitted) => {
                    self.metrics.record_success().await;
                    info!(
                        status = submitted.status,
                        elapsed = ?submitted.elapsed,
                        "document submitted"
                    );
                }
                Err(e) => {
                    self.metrics.record_failure(e).await;
                    warn!(kind = e.kind(), error = %e, "document submission failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn submit_inner<D>(
        &self,
        submission_id: Uuid,
        request: SubmissionRequest<D>,
    ) -> SubmissionResult
    where
        S: DocumentSerializer<D>,
    {
        let started = Instant::now();
        let permit = self.pool.acquire().await?;
        let outcome = self.transmit(&request).await;
        self.pool.release(permit);

        let status = outcome?;
        Ok(Submitted {
            submission_id,
            status,
            elapsed: started.elapsed(),
        })
    }

    async fn transmit<D>(&self, request: &SubmissionRequest<D>) -> ThrottlerResult<u16>
    where
        S: DocumentSerializer<D>,
    {
        let body = self.serializer.serialize(&request.document)?;
        let outbound = OutboundRequest {
            url: self.endpoint.clone(),
            content_type: self.serializer.content_type().to_string(),
            bearer_token: request.signature.expose().to_string(),
            body,
        };

        let status = self.transport.send(outbound).await?;
        if !(200..300).contains(&status) {
            return Err(TransportError::Status(status).into());
        }
        Ok(status)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn pool(&self) -> &PermitPool {
        &self.pool
    }

    pub async fn metrics(&self) -> SubmissionMetrics {
        self.metrics.snapshot().await
    }

    /// Shut down the underlying pool. Later submissions fail with `PoolClosed`.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
