//! Filtered fan-out of adaptation actions to UI handlers.
//!
//! Every subscriber declares a target name and a namespace. An action reaches
//! a subscriber iff its `target` equals the subscriber's target name and its
//! scope is absent, empty, or contains the subscriber's namespace.
//!
//! Delivery is synchronous and in subscription order. Each handler runs in
//! isolation: an `Err` or a panic is reported to the diagnostic sink and
//! delivery continues with the next handler.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use morph_core::{AdaptationAction, Diagnostic, DiagnosticSink};
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::errors::HandlerError;
use crate::topic::Subscription;

/// A UI element that adapts in response to actions.
///
/// Handlers are registered through [`ActionDispatcher::register_handler`],
/// which only keeps a weak reference: dropping the handler ends delivery.
pub trait AdaptiveHandler: Send + Sync {
    /// Target name actions must carry to reach this handler.
    fn target_name(&self) -> &str;

    /// Instance namespace matched against an action's scope.
    fn namespace(&self) -> &str;

    /// Apply an action addressed to this handler.
    fn on_adapt(&self, action: &AdaptationAction) -> Result<(), HandlerError>;
}

type HandlerFn = Arc<dyn Fn(&AdaptationAction) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Clone)]
enum HandlerSink {
    Callback(HandlerFn),
    Handler(Weak<dyn AdaptiveHandler>),
}

#[derive(Clone)]
struct HandlerSlot {
    id: u64,
    target: String,
    namespace: String,
    sink: HandlerSink,
}

enum Delivery {
    Delivered,
    Failed(HandlerError),
    Panicked,
    Dead,
}

type SlotTable = Arc<RwLock<Vec<HandlerSlot>>>;

/// Broadcast channel from strategies to handlers.
pub struct ActionDispatcher {
    slots: SlotTable,
    next_id: AtomicU64,
    published: AtomicU64,
    diagnostics: Arc<dyn DiagnosticSink>,
    prune_dead: bool,
}

impl ActionDispatcher {
    /// Create a dispatcher with no subscribers.
    ///
    /// With `prune_dead` set, registrations whose handler has been dropped are
    /// removed the first time a publish reaches them.
    pub fn new(diagnostics: Arc<dyn DiagnosticSink>, prune_dead: bool) -> Arc<Self> {
        Arc::new(Self {
            slots: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(0),
            published: AtomicU64::new(0),
            diagnostics,
            prune_dead,
        })
    }

    /// Subscribe a callback under `target`/`namespace`.
    pub fn subscribe<F>(
        &self,
        target: impl Into<String>,
        namespace: impl Into<String>,
        on_adapt: F,
    ) -> Subscription
    where
        F: Fn(&AdaptationAction) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.insert(target.into(), namespace.into(), HandlerSink::Callback(Arc::new(on_adapt)))
    }

    /// Register a handler without taking ownership of it.
    ///
    /// Target name and namespace are read once, at registration.
    pub fn register_handler<H>(&self, handler: &Arc<H>) -> Subscription
    where
        H: AdaptiveHandler + 'static,
    {
        let weak: Weak<H> = Arc::downgrade(handler);
        let weak: Weak<dyn AdaptiveHandler> = weak;
        self.insert(
            handler.target_name().to_string(),
            handler.namespace().to_string(),
            HandlerSink::Handler(weak),
        )
    }

    fn insert(&self, target: String, namespace: String, sink: HandlerSink) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(%target, %namespace, id, "handler subscribed");
        self.slots.write().push(HandlerSlot {
            id,
            target,
            namespace,
            sink,
        });

        let slots: Weak<RwLock<Vec<HandlerSlot>>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = slots.upgrade() {
                slots.write().retain(|slot| slot.id != id);
            }
        })
    }

    /// Deliver `action` to every matching subscriber.
    ///
    /// Returns the number of handlers that received it, failed or not.
    pub fn publish(&self, action: &AdaptationAction) -> usize {
        let _ = self.published.fetch_add(1, Ordering::Relaxed);
        let matching: Vec<HandlerSlot> = self
            .slots
            .read()
            .iter()
            .filter(|slot| action.addresses(&slot.target, &slot.namespace))
            .cloned()
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for slot in &matching {
            match deliver(&slot.sink, action) {
                Delivery::Delivered => delivered += 1,
                Delivery::Failed(error) => {
                    delivered += 1;
                    self.diagnostics.report(&Diagnostic::HandlerFailed {
                        target: slot.target.clone(),
                        namespace: slot.namespace.clone(),
                        action: action.name.clone(),
                        error: error.to_string(),
                    });
                }
                Delivery::Panicked => {
                    delivered += 1;
                    self.diagnostics.report(&Diagnostic::HandlerPanicked {
                        target: slot.target.clone(),
                        namespace: slot.namespace.clone(),
                        action: action.name.clone(),
                    });
                }
                Delivery::Dead => dead.push(slot.id),
            }
        }

        if self.prune_dead && !dead.is_empty() {
            debug!(count = dead.len(), "pruning dropped handlers");
            self.slots.write().retain(|slot| !dead.contains(&slot.id));
        }
        trace!(action = %action.name, target = %action.target, delivered, "action published");
        delivered
    }

    /// Remove every registration whose handler has been dropped.
    pub fn prune_dead_handlers(&self) -> usize {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|slot| match &slot.sink {
            HandlerSink::Handler(weak) => weak.strong_count() > 0,
            HandlerSink::Callback(_) => true,
        });
        before - slots.len()
    }

    /// Number of live registrations.
    pub fn subscriber_count(&self) -> usize {
        self.slots.read().len()
    }

    /// Number of actions published so far.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

fn deliver(sink: &HandlerSink, action: &AdaptationAction) -> Delivery {
    let outcome = match sink {
        HandlerSink::Callback(f) => catch_unwind(AssertUnwindSafe(|| f(action))),
        HandlerSink::Handler(weak) => {
            let Some(handler) = weak.upgrade() else {
                return Delivery::Dead;
            };
            catch_unwind(AssertUnwindSafe(|| handler.on_adapt(action)))
        }
    };
    match outcome {
        Ok(Ok(())) => Delivery::Delivered,
        Ok(Err(error)) => Delivery::Failed(error),
        Err(_) => Delivery::Panicked,
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("subscribers", &self.subscriber_count())
            .field("published", &self.published_count())
            .field("prune_dead", &self.prune_dead)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use morph_core::{MemorySink, NullSink};
    use parking_lot::Mutex;

    struct Button {
        namespace: String,
        seen: Mutex<Vec<String>>,
    }

    impl Button {
        fn new(namespace: &str) -> Arc<Self> {
            Arc::new(Self {
                namespace: namespace.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().clone()
        }
    }

    impl AdaptiveHandler for Button {
        fn target_name(&self) -> &str {
            "HideableButtonAW"
        }

        fn namespace(&self) -> &str {
            &self.namespace
        }

        fn on_adapt(&self, action: &AdaptationAction) -> Result<(), HandlerError> {
            self.seen.lock().push(action.name.clone());
            Ok(())
        }
    }

    fn dispatcher() -> Arc<ActionDispatcher> {
        ActionDispatcher::new(Arc::new(NullSink), true)
    }

    #[test]
    fn scope_selects_namespace() {
        let dispatcher = dispatcher();
        let right = Button::new("rightBtn");
        let left = Button::new("leftBtn");
        let _r = dispatcher.register_handler(&right);
        let _l = dispatcher.register_handler(&left);

        let hide = AdaptationAction::new("HideableButtonAW", "HIDE").with_scope(["rightBtn"]);
        assert_eq!(dispatcher.publish(&hide), 1);

        assert_eq!(right.seen(), vec!["HIDE"]);
        assert!(left.seen().is_empty());
    }

    #[test]
    fn unscoped_action_broadcasts_to_target() {
        let dispatcher = dispatcher();
        let a = Button::new("a");
        let b = Button::new("b");
        let _a = dispatcher.register_handler(&a);
        let _b = dispatcher.register_handler(&b);

        assert_eq!(dispatcher.publish(&AdaptationAction::new("HideableButtonAW", "SHOW")), 2);
        let empty_scope =
            AdaptationAction::new("HideableButtonAW", "HIDE").with_scope(Vec::<String>::new());
        assert_eq!(dispatcher.publish(&empty_scope), 2);
    }

    #[test]
    fn target_mismatch_never_delivers() {
        let dispatcher = dispatcher();
        let button = Button::new("rightBtn");
        let _sub = dispatcher.register_handler(&button);
        let action = AdaptationAction::new("Slider", "HIDE").with_scope(["rightBtn"]);
        assert_eq!(dispatcher.publish(&action), 0);
        assert!(button.seen().is_empty());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let dispatcher = dispatcher();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let sub = dispatcher.subscribe("Text", "body", move |_| {
            *sink.lock() += 1;
            Ok(())
        });
        let action = AdaptationAction::new("Text", "ENLARGE");
        let _ = dispatcher.publish(&action);
        sub.unsubscribe();
        let _ = dispatcher.publish(&action);
        assert_eq!(*seen.lock(), 1);
        assert_eq!(dispatcher.subscriber_count(), 0);
    }

    #[test]
    fn failing_handler_does_not_block_others() {
        let diagnostics = Arc::new(MemorySink::new());
        let dispatcher = ActionDispatcher::new(diagnostics.clone(), true);
        let _bad = dispatcher.subscribe("Text", "a", |action| {
            Err(HandlerError::Unsupported(action.name.clone()))
        });
        let _panics = dispatcher.subscribe("Text", "b", |_| panic!("handler bug"));
        let reached = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&reached);
        let _good = dispatcher.subscribe("Text", "c", move |_| {
            *flag.lock() = true;
            Ok(())
        });

        assert_eq!(dispatcher.publish(&AdaptationAction::new("Text", "ENLARGE")), 3);
        assert!(*reached.lock());
        assert_eq!(diagnostics.count_kind("handler_failed"), 1);
        assert_eq!(diagnostics.count_kind("handler_panicked"), 1);
    }

    #[test]
    fn dropped_handler_is_pruned() {
        let dispatcher = dispatcher();
        let button = Button::new("rightBtn");
        let sub = dispatcher.register_handler(&button);
        drop(button);

        assert_eq!(dispatcher.publish(&AdaptationAction::new("HideableButtonAW", "HIDE")), 0);
        assert_eq!(dispatcher.subscriber_count(), 0);
        // cancelling after pruning is harmless
        drop(sub);
    }

    #[test]
    fn dead_handlers_kept_without_pruning() {
        let dispatcher = ActionDispatcher::new(Arc::new(NullSink), false);
        let button = Button::new("x");
        let _sub = dispatcher.register_handler(&button);
        drop(button);

        let _ = dispatcher.publish(&AdaptationAction::new("HideableButtonAW", "HIDE"));
        assert_eq!(dispatcher.subscriber_count(), 1);
        assert_eq!(dispatcher.prune_dead_handlers(), 1);
        assert_eq!(dispatcher.subscriber_count(), 0);
    }

    #[test]
    fn handler_may_subscribe_during_delivery() {
        let dispatcher = dispatcher();
        let inner = Arc::downgrade(&dispatcher);
        let late: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::clone(&late);
        let _sub = dispatcher.subscribe("Text", "a", move |_| {
            if let Some(d) = inner.upgrade() {
                keep.lock().push(d.subscribe("Text", "late", |_| Ok(())));
            }
            Ok(())
        });

        assert_eq!(dispatcher.publish(&AdaptationAction::new("Text", "X")), 1);
        assert_eq!(dispatcher.publish(&AdaptationAction::new("Text", "X")), 2);
        assert_eq!(dispatcher.published_count(), 2);
    }
}
