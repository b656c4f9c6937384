//! One notification per newly stored access entry.
//!
//! [`NotificationDispatcher`] remembers the keys it has delivered in this
//! process so a repeated call for the same entry does not notify twice.
//! Deduplicating *entries* is the store's job; the dispatcher trusts that
//! every entry it is handed is new.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use datawatch_core::log_entry::LogEntry;

use crate::notifier::{Notification, Notifier};

/// Number of delivered keys remembered before the oldest are forgotten.
const DEFAULT_KEY_CAPACITY: usize = 4096;

/// Bounded insertion-ordered key set.
#[derive(Debug)]
struct DeliveredKeys {
    order: VecDeque<String>,
    keys: HashSet<String>,
    capacity: usize,
}

impl DeliveredKeys {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            keys: HashSet::new(),
            capacity,
        }
    }

    /// Reserve `key`; returns false if it was already present.
    fn reserve(&mut self, key: &str) -> bool {
        if !self.keys.insert(key.to_string()) {
            return false;
        }
        self.order.push_back(key.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        true
    }

    fn release(&mut self, key: &str) {
        if self.keys.remove(key) {
            self.order.retain(|k| k != key);
        }
    }
}

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    delivered: Mutex<DeliveredKeys>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_capacity(notifier, DEFAULT_KEY_CAPACITY)
    }

    pub fn with_capacity(notifier: Arc<dyn Notifier>, capacity: usize) -> Self {
        Self {
            notifier,
            delivered: Mutex::new(DeliveredKeys::new(capacity.max(1))),
        }
    }

    /// Emit one access notification per entry.
    ///
    /// Delivery failures are logged and do not stop the remaining entries;
    /// a failed key may be delivered by a later call. Returns how many
    /// notifications were shown.
    pub async fn notify(&self, inserted: &[LogEntry]) -> usize {
        let mut shown = 0;

        for entry in inserted {
            let notification = Notification::access(entry);
            if !self.reserve(&notification.key) {
                tracing::debug!(key = %notification.key, "Notification already delivered");
                continue;
            }

            match self.notifier.show(&notification).await {
                Ok(()) => shown += 1,
                Err(e) => {
                    tracing::warn!(
                        key = %notification.key,
                        error = %e,
                        "Failed to show access notification"
                    );
                    self.release(&notification.key);
                }
            }
        }

        if shown > 0 {
            tracing::info!(shown, "Access notifications delivered");
        }
        shown
    }

    /// Tell the user their session ended. Returns whether it was shown.
    pub async fn notify_logged_out(&self) -> bool {
        match self.notifier.show(&Notification::logged_out()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to show logout notification");
                false
            }
        }
    }

    fn reserve(&self, key: &str) -> bool {
        match self.delivered.lock() {
            Ok(mut keys) => keys.reserve(key),
            // A poisoned set only loses dedup memory; still deliver.
            Err(poisoned) => poisoned.into_inner().reserve(key),
        }
    }

    fn release(&self, key: &str) {
        match self.delivered.lock() {
            Ok(mut keys) => keys.release(key),
            Err(poisoned) => poisoned.into_inner().release(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::notifier::NotifyError;

    #[derive(Default)]
    struct Recording {
        shown: Mutex<Vec<Notification>>,
        fail: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Notifier for Recording {
        async fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError::Unavailable("offline".into()));
            }
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn entry(ts: &str) -> LogEntry {
        LogEntry::new(ts, "org-5678", "rahvastikuregister", "view")
    }

    #[tokio::test]
    async fn one_notification_per_entry() {
        let notifier = Arc::new(Recording::default());
        let dispatcher = NotificationDispatcher::new(notifier.clone());

        let shown = dispatcher
            .notify(&[entry("2024-05-01T10:00:00"), entry("2024-05-01T11:00:00")])
            .await;

        assert_eq!(shown, 2);
        assert_eq!(notifier.shown.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn repeated_call_does_not_redeliver() {
        let notifier = Arc::new(Recording::default());
        let dispatcher = NotificationDispatcher::new(notifier.clone());
        let e = entry("2024-05-01T10:00:00");

        assert_eq!(dispatcher.notify(&[e.clone()]).await, 1);
        assert_eq!(dispatcher.notify(&[e]).await, 0);
        assert_eq!(notifier.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_can_be_retried() {
        let notifier = Arc::new(Recording::default());
        let dispatcher = NotificationDispatcher::new(notifier.clone());
        let e = entry("2024-05-01T10:00:00");

        notifier.fail.store(true, Ordering::SeqCst);
        assert_eq!(dispatcher.notify(&[e.clone()]).await, 0);

        notifier.fail.store(false, Ordering::SeqCst);
        assert_eq!(dispatcher.notify(&[e]).await, 1);
    }

    #[tokio::test]
    async fn logout_notification_is_never_deduplicated() {
        let notifier = Arc::new(Recording::default());
        let dispatcher = NotificationDispatcher::new(notifier.clone());

        assert!(dispatcher.notify_logged_out().await);
        assert!(dispatcher.notify_logged_out().await);
        assert_eq!(notifier.shown.lock().unwrap().len(), 2);
    }

    #[test]
    fn key_set_forgets_oldest_beyond_capacity() {
        let mut keys = DeliveredKeys::new(2);
        assert!(keys.reserve("a"));
        assert!(keys.reserve("b"));
        assert!(keys.reserve("c"));
        assert!(keys.reserve("a"));
        assert!(!keys.reserve("c"));
    }
}
