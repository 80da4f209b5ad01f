//! Owned fixed-interval timers.
//!
//! Each poller keeps one `PollSlot` per dependency (active address, log
//! source). Changing the dependency tears the task down and starts a fresh
//! one; nothing mutates a shared interval in place. Results carry a
//! `PollGuard` so a response that lands after its task was superseded can be
//! recognised and dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Identifies one incarnation of a poll task.
#[derive(Clone, Debug)]
pub struct PollGuard {
    generation: Arc<AtomicU64>,
    token: u64,
}

impl PollGuard {
    /// False once the owning slot was stopped, restarted or invalidated.
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.token
    }
}

/// A single restartable fixed-interval task keyed by what it polls.
pub struct PollSlot<K> {
    generation: Arc<AtomicU64>,
    running: Option<(K, JoinHandle<()>)>,
}

impl<K> PollSlot<K> {
    pub fn new() -> Self {
        Self::with_generation(Arc::new(AtomicU64::new(0)))
    }

    /// Share the generation counter with code that must be able to
    /// invalidate in-flight results synchronously.
    pub fn with_generation(generation: Arc<AtomicU64>) -> Self {
        Self {
            generation,
            running: None,
        }
    }

    pub fn key(&self) -> Option<&K> {
        self.running.as_ref().map(|(key, _)| key)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Make every outstanding guard stale without stopping the task.
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Stop scheduling. A request already in flight may still finish, but
    /// its guard is stale.
    pub fn stop(&mut self) {
        self.invalidate();
        if let Some((_, handle)) = self.running.take() {
            handle.abort();
        }
    }

    /// Replace whatever is running with a task that calls `tick` every
    /// `period`, starting immediately.
    pub fn start<F, Fut>(&mut self, runtime: &Handle, key: K, period: Duration, mut tick: F)
    where
        F: FnMut(PollGuard) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();
        let guard = PollGuard {
            generation: self.generation.clone(),
            token: self.generation.load(Ordering::SeqCst),
        };
        let period = period.max(Duration::from_millis(1));
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !guard.is_current() {
                    break;
                }
                tick(guard.clone()).await;
            }
        });
        self.running = Some((key, handle));
    }
}

impl<K: PartialEq> PollSlot<K> {
    pub fn is_running_for(&self, key: &K) -> bool {
        self.key() == Some(key)
    }
}

impl<K> Default for PollSlot<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for PollSlot<K> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_tick(counter: Arc<AtomicUsize>) -> impl FnMut(PollGuard) -> std::future::Ready<()> + Send + 'static {
        move |_guard| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_immediately_then_on_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut slot = PollSlot::new();
        slot.start(&Handle::current(), "a", Duration::from_millis(20), counting_tick(counter.clone()));
        assert!(slot.is_running_for(&"a"));

        tokio::time::sleep(Duration::from_millis(110)).await;
        assert!(counter.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_task() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut slot = PollSlot::new();
        slot.start(&Handle::current(), "a", Duration::from_millis(10), counting_tick(first.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;

        slot.start(&Handle::current(), "b", Duration::from_millis(10), counting_tick(second.clone()));
        let frozen = first.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(first.load(Ordering::SeqCst), frozen);
        assert!(second.load(Ordering::SeqCst) > 0);
        assert_eq!(slot.key(), Some(&"b"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_guard_after_stop() {
        let captured: Arc<parking_lot::Mutex<Option<PollGuard>>> = Arc::default();
        let mut slot = PollSlot::new();
        let sink = captured.clone();
        slot.start(&Handle::current(), (), Duration::from_secs(60), move |guard| {
            *sink.lock() = Some(guard);
            std::future::ready(())
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let guard = captured.lock().clone().unwrap();
        assert!(guard.is_current());
        slot.stop();
        assert!(!guard.is_current());
        assert!(!slot.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_slot_stops_scheduling() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut slot = PollSlot::new();
        slot.start(&Handle::current(), 1u8, Duration::from_millis(10), counting_tick(counter.clone()));
        tokio::time::sleep(Duration::from_millis(25)).await;
        drop(slot);
        let frozen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), frozen);
    }
}
