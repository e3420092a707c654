//! Time-windowed permit pool.
//!
//! A fair counting semaphore whose availability is reset to full capacity at
//! every window boundary. Permits may also be released early, which hands them
//! straight to the next waiter. Availability never exceeds capacity: a permit
//! released after a tick has already refilled its slot is discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config_validator::ConfigValidator;
use crate::error::{ThrottlerError, ThrottlerResult};
use crate::ticker::{IntervalTicker, Ticker};

#[derive(Debug)]
struct PoolShared {
    semaphore: Semaphore,
    capacity: usize,
    window: Duration,
    /// Serializes every path that can raise availability.
    refill_lock: Mutex<()>,
    ticks: AtomicU64,
    closed: AtomicBool,
    /// Cleared once the replenisher task exits for any reason.
    replenishing: AtomicBool,
}

impl PoolShared {
    /// Top availability back up to capacity. Returns how many permits were restored.
    fn replenish(&self) -> usize {
        let _guard = self.refill_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let restored = self
            .capacity
            .saturating_sub(self.semaphore.available_permits());
        if restored > 0 {
            self.semaphore.add_permits(restored);
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);
        restored
    }

    /// Return one permit unless a tick already refilled its slot.
    fn give_back(&self) -> bool {
        let _guard = self.refill_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.semaphore.available_permits() < self.capacity {
            self.semaphore.add_permits(1);
            true
        } else {
            false
        }
    }
}

/// Authorization to make one outbound call. Released when dropped.
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct Permit {
    pool: Arc<PoolShared>,
    acquired_at: Instant,
}

impl Permit {
    /// How long this permit has been held.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let returned = self.pool.give_back();
        trace!(returned, held_for = ?self.held_for(), "permit released");
    }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    pub outstanding: usize,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub ticks: u64,
    pub closed: bool,
    /// `false` once window boundaries no longer refill the pool.
    pub replenishing: bool,
}

/// Bounded permit pool with periodic full replenishment.
///
/// Waiters are served in arrival order. The replenisher runs as a task owned
/// by the pool: it stops on [`PermitPool::shutdown`] or when the pool is dropped.
#[derive(Debug)]
pub struct PermitPool {
    shared: Arc<PoolShared>,
    cancel: CancellationToken,
    replenisher: Mutex<Option<JoinHandle<()>>>,
}

impl PermitPool {
    /// Create a pool that refills to `capacity` once every `window`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(capacity: usize, window: Duration) -> ThrottlerResult<Self> {
        ConfigValidator::validate_pool(capacity, window)?;
        current_runtime()?;
        Self::with_ticker(capacity, window, IntervalTicker::new(window))
    }

    /// Create a pool whose window boundaries come from `ticker`.
    pub fn with_ticker<T: Ticker>(
        capacity: usize,
        window: Duration,
        ticker: T,
    ) -> ThrottlerResult<Self> {
        ConfigValidator::validate_pool(capacity, window)?;
        let runtime = current_runtime()?;

        let shared = Arc::new(PoolShared {
            semaphore: Semaphore::new(capacity),
            capacity,
            window,
            refill_lock: Mutex::new(()),
            ticks: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            replenishing: AtomicBool::new(true),
        });
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_replenisher(
            Arc::clone(&shared),
            ticker,
            cancel.clone(),
        ));

        debug!(capacity, ?window, "permit pool created");

        Ok(Self {
            shared,
            cancel,
            replenisher: Mutex::new(Some(handle)),
        })
    }

    /// Wait for a permit. Waiters are granted in the order they arrived.
    ///
    /// Dropping the returned future before it resolves gives up the place in
    /// line without consuming a permit.
    pub async fn acquire(&self) -> ThrottlerResult<Permit> {
        let permit = self
            .shared
            .semaphore
            .acquire()
            .await
            .map_err(|_| ThrottlerError::PoolClosed)?;
        permit.forget();
        Ok(self.wrap())
    }

    /// Wait at most `timeout` for a permit.
    pub async fn acquire_timeout(&self, timeout: Duration) -> ThrottlerResult<Permit> {
        tokio::time::timeout(timeout, self.acquire())
            .await
            .map_err(|_| ThrottlerError::AcquireTimeout(timeout))?
    }

    /// Take a permit only if one is free right now.
    ///
    /// `Ok(None)` means the pool is exhausted; a closed pool is an error.
    pub fn try_acquire(&self) -> ThrottlerResult<Option<Permit>> {
        match self.shared.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                Ok(Some(self.wrap()))
            }
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(ThrottlerError::PoolClosed),
        }
    }

    /// Return a permit ahead of the next window boundary.
    pub fn release(&self, permit: Permit) {
        drop(permit);
    }

    /// Stop the replenisher and reject all current and future waiters.
    ///
    /// Calling this more than once is harmless. Permits already handed out
    /// stay valid and may still be released.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shared.semaphore.close();
        self.cancel.cancel();

        let handle = self
            .replenisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "replenisher task ended abnormally");
            }
        }

        info!(
            capacity = self.shared.capacity,
            ticks = self.shared.ticks.load(Ordering::Relaxed),
            "permit pool shut down"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn window(&self) -> Duration {
        self.shared.window
    }

    pub fn available(&self) -> usize {
        self.shared.semaphore.available_permits()
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.available();
        PoolStats {
            capacity: self.shared.capacity,
            available,
            outstanding: self.shared.capacity.saturating_sub(available),
            window: self.shared.window,
            ticks: self.shared.ticks.load(Ordering::Relaxed),
            closed: self.is_closed(),
            replenishing: self.shared.replenishing.load(Ordering::Acquire),
        }
    }

    fn wrap(&self) -> Permit {
        Permit {
            pool: Arc::clone(&self.shared),
            acquired_at: Instant::now(),
        }
    }
}

impl Drop for PermitPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn current_runtime() -> ThrottlerResult<Handle> {
    Handle::try_current().map_err(|_| {
        ThrottlerError::Config("Permit pool must be created inside a tokio runtime".to_string())
    })
}

async fn run_replenisher<T: Ticker>(
    shared: Arc<PoolShared>,
    mut ticker: T,
    cancel: CancellationToken,
) {
    loop {
        let tick = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            tick = ticker.tick() => tick,
        };

        let Some(tick) = tick else {
            warn!(
                capacity = shared.capacity,
                "ticker exhausted; pool will no longer refill at window boundaries"
            );
            break;
        };

        let restored = shared.replenish();
        trace!(restored, "window replenished");
        tick.complete();
    }

    shared.replenishing.store(false, Ordering::Release);
    debug!("replenisher stopped");
}
