//! Start-spacing throttle for remote fetches.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::runtime::config::DEFAULT_SIGNAL_FETCH_INTERVAL_MS;

static PROCESS_WIDE: OnceCell<Arc<Throttle>> = OnceCell::new();

/// Guarantees that operations started through it begin at least `interval`
/// apart. Early callers are deferred, never dropped.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create an independent throttle.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_start: Mutex::new(None),
        }
    }

    /// The throttle shared by every session in this process.
    ///
    /// The first caller fixes the interval; later callers get the same
    /// instance whatever they pass.
    pub fn process_wide(interval: Duration) -> Arc<Throttle> {
        let throttle = PROCESS_WIDE.get_or_init(|| Arc::new(Throttle::new(interval)));
        if throttle.interval != interval {
            tracing::warn!(
                requested_ms = interval.as_millis() as u64,
                active_ms = throttle.interval.as_millis() as u64,
                "process-wide throttle already initialised with a different interval"
            );
        }
        Arc::clone(throttle)
    }

    /// The process-wide throttle with the default signal fetch interval.
    pub fn signal_fetch() -> Arc<Throttle> {
        Self::process_wide(Duration::from_millis(DEFAULT_SIGNAL_FETCH_INTERVAL_MS))
    }

    /// Minimum spacing between starts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start `operation` once the interval since the previous start has
    /// elapsed, then await it.
    pub async fn run<F, Fut>(&self, operation: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        self.acquire().await;
        operation().await
    }

    /// Wait for a start slot and claim it.
    ///
    /// The deadline is re-checked after every sleep because another caller
    /// may have claimed the slot in the meantime.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut last_start = self.last_start.lock();
                let now = Instant::now();
                match *last_start {
                    Some(previous) if now < previous + self.interval => {
                        previous + self.interval - now
                    }
                    _ => {
                        *last_start = Some(now);
                        return;
                    }
                }
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "throttling remote fetch");
            tokio::time::sleep(wait).await;
        }
    }
}
