//! Snapshot aggregation over a dynamic producer set.
//!
//! A [`SnapshotAggregator`] merges the snapshots of all registered producers
//! with a [`BarrierJoin`]. Every membership change (register or unregister)
//! rebuilds the join from scratch:
//!
//! 1. the generation counter is bumped and every slot is emptied,
//! 2. all existing producer subscriptions are dropped,
//! 3. every producer (old and new) is observed again under the new generation.
//!
//! Snapshots tagged with an older generation are discarded, so anything in
//! flight toward the previous join is abandoned. The merged stream stays
//! silent until every producer has published again after the rebuild, even
//! producers that were registered long before. That silence is the price of
//! barrier semantics over a producer set that can change size.
//!
//! The aggregator lock is never held while calling into producers or merged
//! subscribers. Merged publishes of one aggregator are serialized by a
//! separate re-entrant lock, so subscribers see them in the same order as
//! [`merged`](SnapshotAggregator::merged) changes. A subscriber must not
//! wait on another thread that publishes into the same aggregator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use morph_core::{AdaptationRule, ContextParameter, Diagnostic, DiagnosticSink};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, trace};

use crate::errors::{EngineError, Result};
use crate::join::BarrierJoin;
use crate::producer::{Snapshot, SnapshotProducer};
use crate::topic::{Subscription, Topic};

/// Aggregator over context producers.
pub type ContextAggregator = SnapshotAggregator<ContextParameter>;

/// Aggregator over rule producers.
pub type RuleAggregator = SnapshotAggregator<AdaptationRule>;

struct JoinState<T> {
    producers: Vec<Arc<dyn SnapshotProducer<T>>>,
    join: BarrierJoin<T>,
    generation: u64,
    subscriptions: Vec<Subscription>,
    merged: Snapshot<T>,
}

/// Barrier-join aggregator over a dynamic set of snapshot producers.
pub struct SnapshotAggregator<T> {
    label: &'static str,
    state: Mutex<JoinState<T>>,
    // held from merge to delivery; taken before `state`
    publishing: ReentrantMutex<()>,
    published: Topic<Snapshot<T>>,
    publish_count: AtomicU64,
    diagnostics: Arc<dyn DiagnosticSink>,
    this: Weak<Self>,
}

impl<T> SnapshotAggregator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty aggregator. `label` names it in logs and errors.
    pub fn new(label: &'static str, diagnostics: Arc<dyn DiagnosticSink>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            label,
            state: Mutex::new(JoinState {
                producers: Vec::new(),
                join: BarrierJoin::new(0),
                generation: 0,
                subscriptions: Vec::new(),
                merged: Arc::from(Vec::new()),
            }),
            publishing: ReentrantMutex::new(()),
            published: Topic::new(),
            publish_count: AtomicU64::new(0),
            diagnostics,
            this: this.clone(),
        })
    }

    /// Aggregator label.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Add a producer and rebuild the join.
    ///
    /// Fails if a producer with the same name is already registered.
    pub fn register(&self, producer: Arc<dyn SnapshotProducer<T>>) -> Result<()> {
        let mut state = self.state.lock();
        if state.producers.iter().any(|p| p.name() == producer.name()) {
            return Err(EngineError::DuplicateProducer {
                aggregator: self.label,
                name: producer.name().to_string(),
            });
        }
        debug!(aggregator = self.label, producer = producer.name(), "registering producer");
        state.producers.push(producer);
        self.rebuild(state);
        Ok(())
    }

    /// Remove the producer with the given name and rebuild the join.
    ///
    /// Removing the last producer publishes an empty merged snapshot.
    pub fn unregister(&self, name: &str) -> bool {
        let _order = self.publishing.lock();
        let mut state = self.state.lock();
        let before = state.producers.len();
        state.producers.retain(|p| p.name() != name);
        if state.producers.len() == before {
            return false;
        }
        debug!(aggregator = self.label, producer = name, "unregistering producer");

        if state.producers.is_empty() {
            state.generation += 1;
            state.join.reset(0);
            state.merged = Arc::from(Vec::new());
            let merged = Arc::clone(&state.merged);
            let stale = std::mem::take(&mut state.subscriptions);
            drop(state);
            drop(stale);
            self.report_rebuild(0);
            self.publish(&merged);
        } else {
            self.rebuild(state);
        }
        true
    }

    /// Last published merged snapshot. Empty before the first join completes.
    pub fn merged(&self) -> Snapshot<T> {
        Arc::clone(&self.state.lock().merged)
    }

    /// Subscribe to merged snapshot publications.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Snapshot<T>) + Send + Sync + 'static,
    {
        self.published.subscribe(callback)
    }

    /// Names of the registered producers, in registration order.
    pub fn producer_names(&self) -> Vec<String> {
        self.state
            .lock()
            .producers
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Number of registered producers.
    pub fn producer_count(&self) -> usize {
        self.state.lock().producers.len()
    }

    /// Whether every producer has published since the last rebuild.
    pub fn is_ready(&self) -> bool {
        let state = self.state.lock();
        !state.producers.is_empty() && state.join.is_complete()
    }

    /// Number of merged snapshots published so far.
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }

    fn rebuild(&self, mut state: parking_lot::MutexGuard<'_, JoinState<T>>) {
        state.generation += 1;
        let generation = state.generation;
        let width = state.producers.len();
        state.join.reset(width);
        let stale = std::mem::take(&mut state.subscriptions);
        let producers = state.producers.clone();
        drop(state);
        drop(stale);

        let subscriptions: Vec<Subscription> = producers
            .iter()
            .enumerate()
            .map(|(slot, producer)| {
                let this = self.this.clone();
                producer.observe(Box::new(move |snapshot| {
                    if let Some(aggregator) = this.upgrade() {
                        aggregator.on_snapshot(generation, slot, snapshot);
                    }
                }))
            })
            .collect();

        let mut state = self.state.lock();
        if state.generation == generation {
            state.subscriptions = subscriptions;
            drop(state);
            self.report_rebuild(width);
        } else {
            // superseded by a concurrent rebuild
            drop(state);
            drop(subscriptions);
        }
    }

    fn on_snapshot(&self, generation: u64, slot: usize, snapshot: &Snapshot<T>) {
        let _order = self.publishing.lock();
        let merged = {
            let mut state = self.state.lock();
            if state.generation != generation {
                trace!(aggregator = self.label, slot, "discarding snapshot from stale join");
                return;
            }
            let Some(merged) = state.join.offer(slot, Arc::clone(snapshot)) else {
                trace!(
                    aggregator = self.label,
                    ready = state.join.ready(),
                    width = state.join.width(),
                    "waiting for remaining producers"
                );
                return;
            };
            state.merged = Arc::clone(&merged);
            merged
        };
        self.publish(&merged);
    }

    fn publish(&self, merged: &Snapshot<T>) {
        let count = self.publish_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(aggregator = self.label, items = merged.len(), count, "publishing merged snapshot");
        let _ = self.published.publish(merged);
    }

    fn report_rebuild(&self, producers: usize) {
        self.diagnostics.report(&Diagnostic::JoinRebuilt {
            aggregator: self.label.to_string(),
            producers,
        });
    }
}

impl<T> std::fmt::Debug for SnapshotAggregator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SnapshotAggregator")
            .field("label", &self.label)
            .field("producers", &state.producers.len())
            .field("generation", &state.generation)
            .field("ready", &state.join.ready())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
