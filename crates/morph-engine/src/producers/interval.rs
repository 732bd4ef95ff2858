//! Timer-driven republishing.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::errors::{EngineError, Result};
use crate::producer::Refresh;

/// Calls [`Refresh::update_snapshot`] on a producer every `period`.
///
/// The first tick fires one full period after spawning. The driver holds
/// only a weak reference: it stops by itself once the producer is dropped,
/// and is aborted when the driver itself is dropped.
#[derive(Debug)]
pub struct IntervalDriver {
    handle: JoinHandle<()>,
    period: Duration,
}

impl IntervalDriver {
    /// Spawn the timer task on the current tokio runtime.
    pub fn spawn<P>(name: &str, target: Weak<P>, period: Duration) -> Result<Self>
    where
        P: Refresh + 'static,
    {
        if period.is_zero() {
            return Err(EngineError::ZeroInterval(name.to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| EngineError::NoRuntime(name.to_string()))?;

        let producer = name.to_string();
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                let _ = interval.tick().await;
                let Some(target) = target.upgrade() else {
                    debug!(producer = %producer, "producer dropped, interval stopped");
                    break;
                };
                let observers = target.update_snapshot();
                trace!(producer = %producer, observers, "interval tick");
            }
        });

        let period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        debug!(producer = name, period_ms, "interval driver started");
        Ok(Self { handle, period })
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the timer task is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop ticking.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for IntervalDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use assert_matches::assert_matches;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Refresh for Counter {
        fn update_snapshot(&self) -> usize {
            let _ = self.0.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_every_period_after_the_first() {
        let counter = Arc::new(Counter::default());
        let driver =
            IntervalDriver::spawn("counter", Arc::downgrade(&counter), Duration::from_millis(100))
                .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
        assert!(driver.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticks() {
        let counter = Arc::new(Counter::default());
        let driver =
            IntervalDriver::spawn("counter", Arc::downgrade(&counter), Duration::from_millis(10))
                .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        driver.stop();
        let seen = counter.0.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_producer_ends_task() {
        let counter = Arc::new(Counter::default());
        let driver =
            IntervalDriver::spawn("counter", Arc::downgrade(&counter), Duration::from_millis(10))
                .unwrap();
        drop(counter);
        tokio::time::sleep(Duration::from_millis(15)).await;
        tokio::task::yield_now().await;
        assert!(!driver.is_running());
    }

    #[test]
    fn spawn_outside_runtime_fails() {
        let counter = Arc::new(Counter::default());
        let err = IntervalDriver::spawn("gps", Arc::downgrade(&counter), Duration::from_millis(10))
            .unwrap_err();
        assert_matches!(err, EngineError::NoRuntime(name) if name == "gps");
    }

    #[tokio::test]
    async fn zero_period_rejected() {
        let counter = Arc::new(Counter::default());
        let err = IntervalDriver::spawn("gps", Arc::downgrade(&counter), Duration::ZERO).unwrap_err();
        assert_matches!(err, EngineError::ZeroInterval(_));
    }
}
