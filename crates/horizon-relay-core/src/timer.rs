//! Repeating timers backed by tokio.
//!
//! An [`IntervalTimer`] runs an async callback every `period` on its own tokio
//! task. A firing is never started while the previous firing of the same
//! timer is still running: ticks that fall due during a slow firing are
//! dropped, not queued. Separate timers run independently of each other.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use horizon_relay_core::IntervalTimer;
//!
//! # async fn run() {
//! let timer = IntervalTimer::new("poll", Duration::from_secs(1)).unwrap();
//! timer.start(|| async {
//!     println!("tick");
//! });
//!
//! tokio::time::sleep(Duration::from_secs(5)).await;
//! timer.stop();
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::TimerError;
use crate::log::targets;

/// A named repeating timer.
///
/// The timer is idle after construction. [`start`](Self::start) and
/// [`start_immediate`](Self::start_immediate) arm it; [`stop`](Self::stop)
/// disarms it. Dropping the timer stops it.
pub struct IntervalTimer {
    name: &'static str,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
    fired: Arc<AtomicU64>,
    starts: AtomicU64,
}

impl IntervalTimer {
    /// Create an idle timer. A zero period is rejected.
    pub fn new(name: &'static str, period: Duration) -> Result<Self, TimerError> {
        if period.is_zero() {
            return Err(TimerError::ZeroPeriod(name));
        }
        Ok(Self {
            name,
            period,
            task: Mutex::new(None),
            fired: Arc::new(AtomicU64::new(0)),
            starts: AtomicU64::new(0),
        })
    }

    /// The timer's name, used in trace output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arm the timer. The first firing happens one period from now.
    ///
    /// Returns `false` if the timer was already running; the running callback
    /// is kept in that case.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<F, Fut>(&self, callback: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(Instant::now() + self.period, callback)
    }

    /// Arm the timer with the first firing happening right away.
    ///
    /// See [`start`](Self::start).
    pub fn start_immediate<F, Fut>(&self, callback: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(Instant::now(), callback)
    }

    fn spawn<F, Fut>(&self, first: Instant, callback: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let name = self.name;
        let period = self.period;
        let fired = self.fired.clone();

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first, period);
            // Ticks missed while a firing is in progress are dropped.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tracing::trace!(target: targets::TIMER, timer = name, "timer fired");
                callback().await;
                fired.fetch_add(1, Ordering::SeqCst);
            }
        }));
        self.starts.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(target: targets::TIMER, timer = name, ?period, "timer started");
        true
    }

    /// Disarm the timer.
    ///
    /// Returns `true` if the timer was running. Stopping an idle timer is a
    /// no-op. When called from inside the timer's own callback, the callback
    /// runs to its next await point and no further firings happen.
    pub fn stop(&self) -> bool {
        match self.task.lock().take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                tracing::trace!(target: targets::TIMER, timer = self.name, "timer stopped");
                was_running
            }
            None => false,
        }
    }

    /// Whether the timer is armed.
    pub fn is_active(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of firings whose callback has completed.
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }

    /// Number of times the timer has been armed.
    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for IntervalTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalTimer")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("active", &self.is_active())
            .field("fired", &self.fired_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_zero_period_rejected() {
        let err = IntervalTimer::new("zero", Duration::ZERO).unwrap_err();
        assert_eq!(err, TimerError::ZeroPeriod("zero"));
    }

    #[test]
    fn test_new_timer_is_idle() {
        let timer = IntervalTimer::new("idle", Duration::from_millis(10)).unwrap();
        assert!(!timer.is_active());
        assert!(!timer.stop());
        assert_eq!(timer.fired_count(), 0);
        assert_eq!(timer.start_count(), 0);
    }

    #[tokio::test]
    async fn test_start_immediate_fires_repeatedly() {
        let timer = IntervalTimer::new("repeat", Duration::from_millis(20)).unwrap();
        let count = Arc::new(AtomicU64::new(0));

        let count_clone = count.clone();
        assert!(timer.start_immediate(move || {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));
        assert!(timer.is_active());

        tokio::time::sleep(Duration::from_millis(110)).await;
        assert!(timer.stop());
        assert!(!timer.is_active());

        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 3, "expected at least 3 firings, got {fired}");

        // No firings after stop.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), fired);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let timer = IntervalTimer::new("dup", Duration::from_millis(50)).unwrap();
        assert!(timer.start(|| async {}));
        assert!(!timer.start(|| async {}));
        assert_eq!(timer.start_count(), 1);

        timer.stop();
        assert!(timer.start(|| async {}));
        assert_eq!(timer.start_count(), 2);
        timer.stop();
    }

    #[tokio::test]
    async fn test_slow_firing_never_overlaps() {
        let timer = IntervalTimer::new("slow", Duration::from_millis(10)).unwrap();
        let busy = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));
        let runs = Arc::new(AtomicU64::new(0));

        let (busy_c, overlapped_c, runs_c) = (busy.clone(), overlapped.clone(), runs.clone());
        timer.start_immediate(move || {
            let busy = busy_c.clone();
            let overlapped = overlapped_c.clone();
            let runs = runs_c.clone();
            async move {
                if busy.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(45)).await;
                runs.fetch_add(1, Ordering::SeqCst);
                busy.store(false, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        timer.stop();

        assert!(!overlapped.load(Ordering::SeqCst));
        // Dropped ticks: far fewer runs than the 20 ticks that fell due.
        let runs = runs.load(Ordering::SeqCst);
        assert!((1..=6).contains(&runs), "unexpected run count {runs}");
    }
}
