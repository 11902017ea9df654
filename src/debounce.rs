//! Timer-coalescing primitive used to shed per-keystroke work.
//!
//! A scheduler owns at most one in-flight timer. Each schedule, cancel or
//! immediate commit bumps a ticket so consumers that receive commits through a
//! channel can tell a superseded commit apart from the live one.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use log::trace;
use tokio::task::JoinHandle;

/// Debounces values; must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct DebounceScheduler {
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl DebounceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any pending timer with one that calls `on_commit(value)` once
    /// `delay` passes without another call. Returns the ticket of this commit.
    pub fn schedule<T, F>(&mut self, value: T, delay: Duration, on_commit: F) -> u64
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.abort_pending();
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) == ticket {
                on_commit(value);
            } else {
                trace!("DebounceScheduler: dropping superseded ticket {}", ticket);
            }
        }));
        ticket
    }

    /// Discards the pending timer, if any, without firing it.
    pub fn cancel(&mut self) -> bool {
        let had_pending = self.has_pending();
        self.abort_pending();
        self.generation.fetch_add(1, Ordering::SeqCst);
        had_pending
    }

    /// Commits `value` synchronously, cancelling the pending timer first so its
    /// stale value can never fire afterwards.
    pub fn commit_now<T, F>(&mut self, value: T, on_commit: F) -> u64
    where
        F: FnOnce(T),
    {
        self.abort_pending();
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        on_commit(value);
        ticket
    }

    /// True while `ticket` belongs to the latest schedule or commit.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }

    /// Ticket the next `schedule` or `commit_now` call will hand out.
    pub fn next_ticket(&self) -> u64 {
        self.generation.load(Ordering::SeqCst) + 1
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::DebounceScheduler;
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    const DELAY: Duration = Duration::from_millis(300);

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn() -> Box<dyn FnOnce(String) + Send>) {
        let commits = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&commits);
        let make = move || {
            let sink = Arc::clone(&sink);
            Box::new(move |value: String| sink.lock().unwrap().push(value))
                as Box<dyn FnOnce(String) + Send>
        };
        (commits, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_schedules_commit_once_with_last_value() {
        let (commits, on_commit) = recorder();
        let mut scheduler = DebounceScheduler::new();

        for term in ["s", "se", "sea", "sear"] {
            scheduler.schedule(term.to_string(), DELAY, on_commit());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(commits.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*commits.lock().unwrap(), vec!["sear".to_string()]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(commits.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending_commit() {
        let (commits, on_commit) = recorder();
        let mut scheduler = DebounceScheduler::new();

        scheduler.schedule("abc".to_string(), DELAY, on_commit());
        assert!(scheduler.has_pending());
        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(commits.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_now_bypasses_timer_and_cancels_stale_value() {
        let (commits, on_commit) = recorder();
        let mut scheduler = DebounceScheduler::new();

        let predicted = scheduler.next_ticket();
        let stale = scheduler.schedule("ab".to_string(), DELAY, on_commit());
        assert_eq!(predicted, stale);
        let immediate = scheduler.commit_now("abc".to_string(), on_commit());
        assert_eq!(*commits.lock().unwrap(), vec!["abc".to_string()]);
        assert!(!scheduler.is_current(stale));
        assert!(scheduler.is_current(immediate));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*commits.lock().unwrap(), vec!["abc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_quiet_periods_commit_in_order() {
        let (commits, on_commit) = recorder();
        let mut scheduler = DebounceScheduler::new();

        scheduler.schedule("first".to_string(), DELAY, on_commit());
        tokio::time::sleep(Duration::from_millis(400)).await;
        scheduler.schedule("second".to_string(), DELAY, on_commit());
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(
            *commits.lock().unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_scheduler_cancels_timer() {
        let (commits, on_commit) = recorder();
        let mut scheduler = DebounceScheduler::new();
        scheduler.schedule("gone".to_string(), DELAY, on_commit());
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(commits.lock().unwrap().is_empty());
    }
}
