//! Notifier interface (produced, per external-interfaces).
//!
//! The orchestrator depends only on the [`Notifier`] trait; the concrete
//! Telegram delivery mechanism is an external collaborator outside this
//! crate's scope. [`ThrottledNotifier`] implements the per-priority rate
//! limits and the 24h critical dedupe latch on top of any inner notifier.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Priority {
    Critical,
    Error,
    Warning,
    Info,
    Heartbeat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(priority: Priority, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { priority, title: title.into(), message: message.into(), metadata: BTreeMap::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Emits every notification as a structured log line. Stands in for the
/// Telegram delivery the orchestrator is not responsible for.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.priority {
            Priority::Critical | Priority::Error => {
                error!(title = %notification.title, message = %notification.message, "notification")
            }
            Priority::Warning => warn!(title = %notification.title, message = %notification.message, "notification"),
            Priority::Info | Priority::Heartbeat => {
                info!(title = %notification.title, message = %notification.message, "notification")
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PriorityLimit {
    max_per_window: u32,
    window: Duration,
}

fn limit_for(priority: Priority) -> PriorityLimit {
    match priority {
        Priority::Critical => PriorityLimit { max_per_window: 1, window: Duration::minutes(10) },
        Priority::Error => PriorityLimit { max_per_window: 6, window: Duration::minutes(1) },
        Priority::Warning => PriorityLimit { max_per_window: 20, window: Duration::minutes(1) },
        Priority::Info => PriorityLimit { max_per_window: 60, window: Duration::minutes(1) },
        Priority::Heartbeat => PriorityLimit { max_per_window: 1, window: Duration::minutes(1) },
    }
}

const CRITICAL_DEDUPE_LATCH: Duration = Duration::hours(24);

#[derive(Debug, Default)]
struct ThrottleState {
    sent_at: BTreeMap<Priority, Vec<DateTime<Utc>>>,
    critical_latch: BTreeMap<String, DateTime<Utc>>,
}

/// Wraps an inner [`Notifier`], applying per-priority rate limits and a 24h
/// dedupe latch on repeated `CRITICAL` titles so a flapping fault does not
/// page forever.
pub struct ThrottledNotifier<N> {
    inner: N,
    state: Mutex<ThrottleState>,
}

impl<N: Notifier> ThrottledNotifier<N> {
    pub fn new(inner: N) -> Self {
        Self { inner, state: Mutex::new(ThrottleState::default()) }
    }

    fn allow(&self, notification: &Notification, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock();

        if notification.priority == Priority::Critical {
            if let Some(last) = state.critical_latch.get(&notification.title) {
                if now - *last < CRITICAL_DEDUPE_LATCH {
                    return false;
                }
            }
        }

        let limit = limit_for(notification.priority);
        let sent = state.sent_at.entry(notification.priority).or_default();
        sent.retain(|ts| now - *ts < limit.window);
        if sent.len() as u32 >= limit.max_per_window {
            return false;
        }
        sent.push(now);

        if notification.priority == Priority::Critical {
            state.critical_latch.insert(notification.title.clone(), now);
        }
        true
    }
}

impl<N: Notifier> Notifier for ThrottledNotifier<N> {
    fn notify(&self, notification: Notification) {
        if self.allow(&notification, Utc::now()) {
            self.inner.notify(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingNotifier(Arc<AtomicUsize>);

    impl Notifier for CountingNotifier {
        fn notify(&self, _notification: Notification) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn critical_dedupe_latch_suppresses_repeats_of_the_same_title() {
        let counter = Arc::new(AtomicUsize::new(0));
        let notifier = ThrottledNotifier::new(CountingNotifier(counter.clone()));
        for _ in 0..5 {
            notifier.notify(Notification::new(Priority::Critical, "exchange down", "retrying"));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn info_notifications_are_capped_per_window() {
        let counter = Arc::new(AtomicUsize::new(0));
        let notifier = ThrottledNotifier::new(CountingNotifier(counter.clone()));
        for i in 0..90 {
            notifier.notify(Notification::new(Priority::Info, format!("tick-{i}"), "ok"));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 60);
    }

    #[test]
    fn distinct_critical_titles_are_not_mutually_suppressed() {
        let counter = Arc::new(AtomicUsize::new(0));
        let notifier = ThrottledNotifier::new(CountingNotifier(counter.clone()));
        notifier.notify(Notification::new(Priority::Critical, "exchange down", "a"));
        notifier.notify(Notification::new(Priority::Critical, "redis down", "b"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
