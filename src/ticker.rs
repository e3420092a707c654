//! Timers that drive permit replenishment.
//!
//! The pool never sleeps on its own; it asks a [`Ticker`] for the next window
//! boundary. [`IntervalTicker`] is backed by `tokio::time` for production use.
//! [`ManualTicker`] fires only when a test asks it to, so window behaviour can
//! be checked without waiting on the wall clock.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// A single window boundary.
///
/// The pool calls [`Tick::complete`] once it has replenished, which lets a
/// [`TickHandle`] wait for the effect of the tick it triggered.
#[derive(Debug, Default)]
pub struct Tick {
    done: Option<oneshot::Sender<()>>,
}

impl Tick {
    pub fn new() -> Self {
        Self { done: None }
    }

    fn with_ack(done: oneshot::Sender<()>) -> Self {
        Self { done: Some(done) }
    }

    pub fn complete(self) {
        if let Some(done) = self.done {
            let _ = done.send(());
        }
    }
}

/// Source of window boundaries for a permit pool.
#[async_trait]
pub trait Ticker: Send + 'static {
    /// Wait for the next window boundary. `None` means no more ticks will
    /// ever arrive and the replenisher should stop.
    async fn tick(&mut self) -> Option<Tick>;
}

/// Fires once per window, starting one full window after creation.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        // A stalled runtime should not cause a burst of catch-up refills.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> Option<Tick> {
        self.interval.tick().await;
        Some(Tick::new())
    }
}

/// Ticker driven explicitly through a [`TickHandle`].
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<Tick>,
}

/// Triggers ticks on a [`ManualTicker`]. Dropping every handle ends the ticker.
#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<Tick>,
}

impl ManualTicker {
    pub fn new() -> (Self, TickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, TickHandle { tx })
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> Option<Tick> {
        self.rx.recv().await
    }
}

impl TickHandle {
    /// Fire one tick and wait until the pool has processed it.
    ///
    /// Returns `false` if the pool's replenisher is no longer running.
    pub async fn tick(&self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Tick::with_ack(done_tx)).is_err() {
            return false;
        }
        done_rx.await.is_ok()
    }
}
