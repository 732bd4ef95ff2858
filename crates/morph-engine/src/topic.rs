//! Synchronous multi-subscriber topic.
//!
//! A [`Topic`] delivers every published value to all current subscribers on
//! the publisher's call stack. There is no buffering and no replay: a
//! subscriber only sees values published after it subscribed.
//!
//! The subscriber list is copied out before delivery, so a subscriber may
//! subscribe, unsubscribe or publish re-entrantly without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(u64, Callback<T>)>>,
}

impl<T> Subscribers<T> {
    fn remove(&self, id: u64) {
        self.entries.write().retain(|(entry_id, _)| *entry_id != id);
    }
}

/// A broadcast topic with synchronous delivery.
pub struct Topic<T> {
    inner: Arc<Subscribers<T>>,
}

impl<T: 'static> Topic<T> {
    /// Create a topic with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Subscribers {
                next_id: AtomicU64::new(0),
                entries: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Subscribe to future publications.
    ///
    /// Dropping the returned [`Subscription`] unsubscribes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.entries.write().push((id, Arc::new(callback)));

        let weak: Weak<Subscribers<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        })
    }

    /// Deliver `value` to every current subscriber, in subscription order.
    ///
    /// Returns the number of subscribers invoked.
    pub fn publish(&self, value: &T) -> usize {
        let callbacks: Vec<Callback<T>> = self
            .inner
            .entries
            .read()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in &callbacks {
            callback(value);
        }
        callbacks.len()
    }
}

impl<T> Topic<T> {
    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.entries.read().len()
    }
}

impl<T: 'static> Default for Topic<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle to a live subscription.
///
/// The subscription ends when the handle is dropped or
/// [`unsubscribe`](Subscription::unsubscribe) is called. A handle never keeps
/// the publisher alive.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Build a subscription from its cancel action.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// End the subscription now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    /// Keep the subscription alive for as long as the publisher lives.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    /// Whether the subscription is still attached.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(&u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &u32| sink.lock().push(*v))
    }

    #[test]
    fn publish_reaches_all_subscribers() {
        let topic = Topic::new();
        let (a, cb_a) = recorder();
        let (b, cb_b) = recorder();
        let _sa = topic.subscribe(cb_a);
        let _sb = topic.subscribe(cb_b);

        assert_eq!(topic.publish(&7), 2);
        assert_eq!(*a.lock(), vec![7]);
        assert_eq!(*b.lock(), vec![7]);
    }

    #[test]
    fn no_replay_for_late_subscribers() {
        let topic = Topic::new();
        let _ = topic.publish(&1);
        let (seen, cb) = recorder();
        let _sub = topic.subscribe(cb);
        let _ = topic.publish(&2);
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn drop_unsubscribes() {
        let topic = Topic::new();
        let (seen, cb) = recorder();
        let sub = topic.subscribe(cb);
        drop(sub);
        assert_eq!(topic.publish(&1), 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn explicit_unsubscribe() {
        let topic = Topic::new();
        let (seen, cb) = recorder();
        let sub = topic.subscribe(cb);
        let _ = topic.publish(&1);
        sub.unsubscribe();
        let _ = topic.publish(&2);
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn detach_keeps_subscription() {
        let topic = Topic::new();
        let (seen, cb) = recorder();
        topic.subscribe(cb).detach();
        let _ = topic.publish(&3);
        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn subscription_outliving_topic_is_harmless() {
        let topic: Topic<u32> = Topic::new();
        let sub = topic.subscribe(|_| {});
        drop(topic);
        drop(sub);
    }

    #[test]
    fn reentrant_unsubscribe_during_publish() {
        let topic: Topic<u32> = Topic::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicU64::new(0));

        let slot_cb = Arc::clone(&slot);
        let count_cb = Arc::clone(&count);
        let sub = topic.subscribe(move |_| {
            let _ = count_cb.fetch_add(1, Ordering::SeqCst);
            let taken = slot_cb.lock().take();
            drop(taken);
        });
        *slot.lock() = Some(sub);

        let _ = topic.publish(&1);
        let _ = topic.publish(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
