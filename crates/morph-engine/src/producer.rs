//! Snapshot producer contracts.
//!
//! A producer publishes its *entire* current set of items (context
//! parameters or rules) every time it updates, never a delta. Consumers
//! subscribe through [`SnapshotProducer::observe`]; observing is restartable
//! (each call yields an independent subscription) and never replays the last
//! snapshot.
//!
//! Concrete producers compose a [`SnapshotCell`], which owns the item list and
//! the outgoing topic, instead of inheriting shared state.

use std::sync::Arc;
use std::time::Duration;

use morph_core::{AdaptationRule, ContextParameter};
use parking_lot::Mutex;

use crate::topic::{Subscription, Topic};

/// A complete, immutable set of items published as one unit.
pub type Snapshot<T> = Arc<[T]>;

/// Callback receiving snapshots from a producer.
pub type SnapshotObserver<T> = Box<dyn Fn(&Snapshot<T>) + Send + Sync>;

/// A source of whole snapshots.
pub trait SnapshotProducer<T>: Send + Sync {
    /// Producer name, unique within an aggregator.
    fn name(&self) -> &str;

    /// Subscribe to future snapshots.
    ///
    /// Implementations must not invoke `observer` from within this call.
    fn observe(&self, observer: SnapshotObserver<T>) -> Subscription;
}

/// A producer of context parameter snapshots.
pub trait ContextProducer: SnapshotProducer<ContextParameter> {}

impl<P> ContextProducer for P where P: SnapshotProducer<ContextParameter> + ?Sized {}

/// A producer of rule set snapshots that can be mutated imperatively.
///
/// Every successful mutation publishes a fresh snapshot immediately.
pub trait RuleProducer: SnapshotProducer<AdaptationRule> {
    /// Append a rule and publish.
    fn add_rule(&self, rule: AdaptationRule);

    /// Remove every rule with the given name.
    ///
    /// Returns `false` and publishes nothing when no rule matched.
    fn remove_rule(&self, name: &str) -> bool;
}

/// Something that can republish its current snapshot on demand.
pub trait Refresh: Send + Sync {
    /// Publish the full current snapshot. Returns the number of observers
    /// reached.
    fn update_snapshot(&self) -> usize;
}

/// How a producer decides when to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Publishes only when `update_snapshot` is called explicitly.
    Event,
    /// Publishes on every timer tick, changed or not.
    Interval(Duration),
}

/// Item list plus outgoing topic, shared by the concrete producers.
pub struct SnapshotCell<T> {
    items: Mutex<Vec<T>>,
    topic: Topic<Snapshot<T>>,
}

impl<T> SnapshotCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cell holding `items`. Nothing is published.
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(items),
            topic: Topic::new(),
        }
    }

    /// Current items as a snapshot.
    pub fn snapshot(&self) -> Snapshot<T> {
        Arc::from(self.items.lock().as_slice())
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the cell holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Mutate the items without publishing.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        f(&mut self.items.lock())
    }

    /// Publish the full current item list.
    pub fn publish(&self) -> usize {
        let snapshot = self.snapshot();
        self.topic.publish(&snapshot)
    }

    /// Subscribe an observer to future publications.
    pub fn observe(&self, observer: SnapshotObserver<T>) -> Subscription {
        self.topic.subscribe(move |snapshot| observer(snapshot))
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.topic.subscriber_count()
    }
}

impl<T> std::fmt::Debug for SnapshotCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCell")
            .field("items", &self.items.lock().len())
            .field("observers", &self.topic.subscriber_count())
            .finish()
    }
}
