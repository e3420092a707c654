//! Bounded work queue feeding a shared [`SubmissionClient`].
//!
//! A fixed set of worker tasks pull requests off one channel, so the number of
//! callers never dictates how many tasks are talking to the endpoint.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{SubmissionClient, SubmissionRequest, SubmissionResult};
use crate::config_validator::ConfigValidator;
use crate::error::{ThrottlerError, ThrottlerResult};
use crate::serializer::DocumentSerializer;
use crate::transport::Transport;

struct Job<D> {
    request: SubmissionRequest<D>,
    reply: oneshot::Sender<SubmissionResult>,
}

/// Result of a queued submission, available once a worker has processed it.
#[must_use = "the submission result is only observable through wait()"]
pub struct PendingSubmission {
    rx: oneshot::Receiver<SubmissionResult>,
}

impl PendingSubmission {
    pub async fn wait(self) -> SubmissionResult {
        self.rx.await.map_err(|_| ThrottlerError::QueueClosed)?
    }
}

pub struct SubmissionQueue<D> {
    tx: mpsc::Sender<Job<D>>,
    workers: Vec<JoinHandle<()>>,
}

impl<D> SubmissionQueue<D>
where
    D: Send + Sync + 'static,
{
    /// Start `workers` tasks serving a queue that holds up to `depth` jobs.
    pub fn spawn<S, T>(
        client: Arc<SubmissionClient<S, T>>,
        workers: usize,
        depth: usize,
    ) -> ThrottlerResult<Self>
    where
        S: DocumentSerializer<D> + 'static,
        T: Transport + 'static,
    {
        ConfigValidator::validate_queue(workers, depth)?;

        let (tx, rx) = mpsc::channel(depth);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(worker_id, Arc::clone(&client), Arc::clone(&rx)))
            })
            .collect::<Vec<_>>();

        info!(workers = workers.len(), depth, "submission queue started");
        Ok(Self { tx, workers })
    }

    /// Queue a request, waiting for space if the queue is full.
    pub async fn enqueue(&self, request: SubmissionRequest<D>) -> ThrottlerResult<PendingSubmission> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job { request, reply })
            .await
            .map_err(|_| ThrottlerError::QueueClosed)?;
        Ok(PendingSubmission { rx })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting work, finish everything already queued and join the workers.
    pub async fn close(self) {
        drop(self.tx);
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "submission worker ended abnormally");
            }
        }
        info!("submission queue closed");
    }
}

async fn run_worker<D, S, T>(
    worker_id: usize,
    client: Arc<SubmissionClient<S, T>>,
    rx: Arc<Mutex<mpsc::Receiver<Job<D>>>>,
) where
    S: DocumentSerializer<D>,
    T: Transport,
{
    loop {
        // Hold the receiver lock only while waiting for the next job.
        let job = rx.lock().await.recv().await;
        let Some(Job { request, reply }) = job else {
            break;
        };

        let result = client.submit(request).await;
        if reply.send(result).is_err() {
            debug!(worker_id, "caller stopped waiting for submission result");
        }
    }
    debug!(worker_id, "submission worker stopped");
}
