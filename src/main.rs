use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use submission_throttler::client::{SubmissionClient, SubmissionRequest};
use submission_throttler::config::Config;
use submission_throttler::dispatcher::SubmissionQueue;
use submission_throttler::document::{Document, Product};
use submission_throttler::error::ErrorReport;
use submission_throttler::permit_pool::PermitPool;
use submission_throttler::serializer::ValidatingJsonSerializer;
use submission_throttler::transport::HttpTransport;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Submit a sample document through the throttled client.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Number of submissions to make
    #[arg(long, default_value_t = 5)]
    count: usize,

    /// Signature sent as the bearer token
    #[arg(long, env = "SUBMIT_SIGNATURE", default_value = "signature")]
    signature: String,

    /// Maximum submissions per window (overrides THROTTLE_CAPACITY)
    #[arg(long)]
    capacity: Option<usize>,

    /// Window length, e.g. "1s" or "500ms" (overrides THROTTLE_WINDOW)
    #[arg(long, value_parser = humantime::parse_duration)]
    window: Option<Duration>,

    /// Worker count (overrides SUBMIT_WORKERS)
    #[arg(long)]
    workers: Option<usize>,

    /// Endpoint URL (overrides SUBMIT_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,
}

impl Cli {
    /// Command-line values win over the environment; validation happens after.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::parse_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("submission_throttler={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        capacity = config.capacity,
        window = ?config.window,
        workers = config.workers,
        endpoint = %config.endpoint,
        "Starting submission throttler"
    );

    let pool = PermitPool::new(config.capacity, config.window)?;
    let transport = HttpTransport::new(config.request_timeout)?;
    let client = Arc::new(
        SubmissionClient::new(pool, ValidatingJsonSerializer, transport)
            .with_endpoint(config.endpoint.clone())?,
    );
    let queue = SubmissionQueue::spawn(Arc::clone(&client), config.workers, config.queue_depth)?;

    let document = sample_document();
    let mut pending = Vec::with_capacity(cli.count);
    for _ in 0..cli.count {
        let request = SubmissionRequest::new(document.clone(), cli.signature.as_str());
        pending.push(queue.enqueue(request).await?);
    }

    for submission in pending {
        match submission.wait().await {
            Ok(submitted) => tracing::info!(
                submission_id = %submitted.submission_id,
                status = submitted.status,
                "Submission accepted"
            ),
            Err(e) => tracing::warn!(report = %serde_json::to_string(&ErrorReport::from_error(&e))?, "Submission failed"),
        }
    }

    queue.close().await;
    let stats = client.pool().stats();
    let metrics = client.metrics().await;
    client.shutdown().await;

    tracing::info!(
        pool = %serde_json::to_string(&stats)?,
        succeeded = metrics.succeeded,
        failed = metrics.failed,
        "Submission throttler finished"
    );

    Ok(())
}

fn sample_document() -> Document {
    Document {
        participant_inn: "123123123554".to_string(),
        doc_id: "docID".to_string(),
        doc_status: "status".to_string(),
        doc_type: "doc_type".to_string(),
        import_request: true,
        owner_inn: "981737129398".to_string(),
        production_date: "2024-02-23".to_string(),
        production_type: "ProductionType".to_string(),
        products: vec![Product {
            certificate_document: "Certificate".to_string(),
            certificate_document_date: "2024-02-23".to_string(),
            certificate_document_number: "CertificateDocumentNumber".to_string(),
            owner_inn: "981737129398".to_string(),
            producer_inn: "8971892739217".to_string(),
            production_date: "2024-02-23".to_string(),
            tnved_code: "TnvedCode".to_string(),
            uit_code: "31231".to_string(),
            uitu_code: "1231".to_string(),
        }],
        reg_date: "2024-02-23".to_string(),
        reg_number: "81763263".to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_cli_overrides_invalid_env_value() {
        let mut config = Config {
            capacity: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let cli = Cli::parse_from(["submission-throttler", "--capacity", "3", "--window", "250ms"]);
        cli.apply_overrides(&mut config);

        assert_eq!(config.capacity, 3);
        assert_eq!(config.window, Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_without_overrides_keeps_env_values() {
        let mut config = Config {
            workers: 7,
            ..Config::default()
        };
        let cli = Cli::parse_from(["submission-throttler"]);
        cli.apply_overrides(&mut config);
        assert_eq!(config.workers, 7);
        assert_eq!(config.capacity, Config::default().capacity);
    }

    #[test]
    fn test_sample_document_is_valid() {
        assert!(sample_document().validate().is_ok());
    }
}
