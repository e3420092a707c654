use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ThrottlerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionMetrics {
    pub total_submissions: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Failure counts keyed by `ThrottlerError::kind`.
    pub failures_by_kind: HashMap<String, u64>,
    pub last_reset: u64,
}

impl Default for SubmissionMetrics {
    fn default() -> Self {
        Self {
            total_submissions: 0,
            succeeded: 0,
            failed: 0,
            failures_by_kind: HashMap::new(),
            last_reset: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

impl SubmissionMetrics {
    pub fn failures_of(&self, kind: &str) -> u64 {
        self.failures_by_kind.get(kind).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<SubmissionMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.total_submissions += 1;
        metrics.succeeded += 1;
    }

    pub async fn record_failure(&self, error: &ThrottlerError) {
        let mut metrics = self.metrics.write().await;
        metrics.total_submissions += 1;
        metrics.failed += 1;
        *metrics
            .failures_by_kind
            .entry(error.kind().to_string())
            .or_default() += 1;
    }

    pub async fn snapshot(&self) -> SubmissionMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn reset(&self) {
        let mut metrics = self.metrics.write().await;
        *metrics = SubmissionMetrics::default();
    }
}
