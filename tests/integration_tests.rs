use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use submission_throttler::{
    client::{SubmissionClient, SubmissionRequest},
    dispatcher::SubmissionQueue,
    document::{Document, Product},
    error::{SerializationError, ThrottlerError, TransportError},
    permit_pool::PermitPool,
    serializer::{DocumentSerializer, JsonSerializer, ValidatingJsonSerializer},
    transport::{OutboundRequest, Transport},
};
use tokio::time::Instant;

/// Transport stub that records when each call started and replies after `delay`.
#[derive(Clone)]
struct StubTransport {
    delay: Duration,
    reply: fn(usize) -> Result<u16, TransportError>,
    calls: Arc<Mutex<Vec<(Instant, OutboundRequest)>>>,
}

impl StubTransport {
    fn ok(delay: Duration) -> Self {
        Self::replying(delay, |_| Ok(200))
    }

    fn replying(delay: Duration, reply: fn(usize) -> Result<u16, TransportError>) -> Self {
        Self {
            delay,
            reply,
            calls: Arc::default(),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn start_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: OutboundRequest) -> Result<u16, TransportError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((Instant::now(), request));
            calls.len() - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.reply)(index)
    }
}

/// Serializer that refuses any document equal to "bad".
struct PickySerializer;

impl DocumentSerializer<String> for PickySerializer {
    fn serialize(&self, document: &String) -> Result<Vec<u8>, SerializationError> {
        if document == "bad" {
            return Err(SerializationError::Invalid("bad document".to_string()));
        }
        Ok(document.as_bytes().to_vec())
    }

    fn content_type(&self) -> &str {
        "text/plain"
    }
}

fn document(doc_id: &str) -> Document {
    Document {
        participant_inn: "1231231235".to_string(),
        doc_id: doc_id.to_string(),
        doc_status: "status".to_string(),
        doc_type: "doc_type".to_string(),
        owner_inn: "9817371293".to_string(),
        production_date: "2024-02-23".to_string(),
        production_type: "ProductionType".to_string(),
        products: vec![Product {
            owner_inn: "9817371293".to_string(),
            producer_inn: "897189273921".to_string(),
            production_date: "2024-02-23".to_string(),
            ..Default::default()
        }],
        reg_date: "2024-02-23".to_string(),
        reg_number: "81763263".to_string(),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_burst_within_capacity_completes_in_first_window() {
    let start = Instant::now();
    let transport = StubTransport::ok(Duration::ZERO);
    let pool = PermitPool::new(5, Duration::from_secs(1)).unwrap();
    let client = Arc::new(SubmissionClient::new(pool, JsonSerializer, transport.clone()));

    let handles: Vec<_> = (0..5)
        .map(|n| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.submit(SubmissionRequest::new(n, "sig")).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status, 200);
    }

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(transport.call_count(), 5);
    assert_eq!(client.pool().stats().ticks, 0);
    client.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 5)]
async fn test_parallel_burst_within_capacity_on_worker_threads() {
    let transport = StubTransport::ok(Duration::from_millis(20));
    let pool = PermitPool::new(5, Duration::from_secs(1)).unwrap();
    let client = Arc::new(SubmissionClient::new(pool, JsonSerializer, transport.clone()));
    let barrier = Arc::new(tokio::sync::Barrier::new(5));

    let start = Instant::now();
    let handles: Vec<_> = (0..5)
        .map(|n| {
            let client = Arc::clone(&client);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                client.submit(SubmissionRequest::new(n, "sig")).await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status, 200);
    }

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(transport.call_count(), 5);
    let stats = client.pool().stats();
    assert_eq!(stats.ticks, 0);
    assert_eq!(stats.available, 5);
    assert_eq!(stats.outstanding, 0);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_sequential_submissions_reuse_released_permit() {
    let transport = StubTransport::ok(Duration::from_millis(50));
    let pool = PermitPool::new(1, Duration::from_secs(1)).unwrap();
    let client = SubmissionClient::new(pool, JsonSerializer, transport.clone());

    let start = Instant::now();
    for n in 0..3 {
        client.submit(SubmissionRequest::new(n, "sig")).await.unwrap();
    }
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(150));
    assert!(elapsed < Duration::from_millis(200));
    assert_eq!(transport.call_count(), 3);
    client.shutdown().await;
}

#[tokio::test]
async fn test_serializer_failure_does_not_leak_permit() {
    let transport = StubTransport::ok(Duration::ZERO);
    let pool = PermitPool::new(1, Duration::from_secs(60)).unwrap();
    let client = SubmissionClient::new(pool, PickySerializer, transport.clone());

    let err = client
        .submit(SubmissionRequest::new("bad".to_string(), "sig"))
        .await
        .unwrap_err();
    assert!(matches!(err, ThrottlerError::Serialization(_)));
    assert_eq!(transport.call_count(), 0);

    // With capacity 1 and a 60s window this only succeeds if the permit came back.
    let submitted = tokio::time::timeout(
        Duration::from_secs(5),
        client.submit(SubmissionRequest::new("good".to_string(), "sig")),
    )
    .await
    .expect("permit was leaked")
    .unwrap();
    assert_eq!(submitted.status, 200);

    let calls = transport.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.body, b"good".to_vec());
    assert_eq!(calls[0].1.content_type, "text/plain");
}

#[tokio::test(start_paused = true)]
async fn test_window_bounds_calls_started_per_window() {
    let start = Instant::now();
    // Calls outlive several windows, so only replenishment lets new ones start.
    let transport = StubTransport::ok(Duration::from_secs(10));
    let pool = PermitPool::new(2, Duration::from_secs(1)).unwrap();
    let client = Arc::new(SubmissionClient::new(pool, JsonSerializer, transport.clone()));

    let handles: Vec<_> = (0..6)
        .map(|n| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.submit(SubmissionRequest::new(n, "sig")).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut per_window = [0usize; 3];
    for started in transport.start_times() {
        let window = (started - start).as_secs() as usize;
        per_window[window] += 1;
    }
    assert_eq!(per_window, [2, 2, 2]);

    let stats = client.pool().stats();
    assert!(stats.available <= stats.capacity);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_mixed_outcomes_keep_pool_balanced() {
    let transport = StubTransport::replying(Duration::from_millis(5), |index| match index % 3 {
        0 => Ok(200),
        1 => Ok(500),
        _ => Err(TransportError::Network("connection reset".to_string())),
    });
    let pool = PermitPool::new(3, Duration::from_secs(3600)).unwrap();
    let client = Arc::new(SubmissionClient::new(pool, PickySerializer, transport.clone()));

    let handles: Vec<_> = (0..30)
        .map(|n| {
            let client = Arc::clone(&client);
            let document = if n % 5 == 0 { "bad".to_string() } else { format!("doc-{}", n) };
            tokio::spawn(async move { client.submit(SubmissionRequest::new(document, "sig")).await })
        })
        .collect();

    let mut failures = 0;
    for handle in handles {
        if handle.await.unwrap().is_err() {
            failures += 1;
        }
    }

    assert_eq!(client.pool().available(), 3);
    assert_eq!(client.pool().stats().outstanding, 0);
    assert_eq!(transport.call_count(), 24);

    let metrics = client.metrics().await;
    assert_eq!(metrics.total_submissions, 30);
    assert_eq!(metrics.failed, failures);
    assert_eq!(metrics.failures_of("serialization"), 6);
    assert_eq!(metrics.succeeded, 8);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_in_flight_finish_and_rejects_waiters() {
    let transport = StubTransport::ok(Duration::from_millis(100));
    let pool = PermitPool::new(1, Duration::from_secs(60)).unwrap();
    let client = Arc::new(SubmissionClient::new(pool, JsonSerializer, transport.clone()));

    let in_flight = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.submit(SubmissionRequest::new(1, "sig")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let waiting = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.submit(SubmissionRequest::new(2, "sig")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    client.shutdown().await;

    assert!(in_flight.await.unwrap().is_ok());
    assert!(matches!(
        waiting.await.unwrap(),
        Err(ThrottlerError::PoolClosed)
    ));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_queue_submits_validated_documents() {
    let transport = StubTransport::ok(Duration::from_millis(20));
    let pool = PermitPool::new(2, Duration::from_secs(1)).unwrap();
    let client = Arc::new(
        SubmissionClient::new(pool, ValidatingJsonSerializer, transport.clone())
            .with_endpoint("http://127.0.0.1:8080/api/v3/lk/documents/create")
            .unwrap(),
    );
    let queue = SubmissionQueue::spawn(Arc::clone(&client), 4, 16).unwrap();

    let valid = queue
        .enqueue(SubmissionRequest::new(document("doc-1"), "sig"))
        .await
        .unwrap();
    let invalid = queue
        .enqueue(SubmissionRequest::new(
            Document {
                owner_inn: "42".to_string(),
                ..document("doc-2")
            },
            "sig",
        ))
        .await
        .unwrap();

    assert_eq!(valid.wait().await.unwrap().status, 200);
    assert!(matches!(
        invalid.wait().await,
        Err(ThrottlerError::Serialization(SerializationError::Invalid(_)))
    ));

    queue.close().await;
    client.shutdown().await;

    let calls = transport.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.url, "http://127.0.0.1:8080/api/v3/lk/documents/create");
    assert_eq!(calls[0].1.authorization(), "Bearer sig");
    let body: serde_json::Value = serde_json::from_slice(&calls[0].1.body).unwrap();
    assert_eq!(body["docId"], "doc-1");
}
