//! # morph-engine
//!
//! Reactive aggregation and dispatch core of the Morph UI adaptation engine.
//!
//! Independent producers publish whole snapshots of context parameters and
//! adaptation rules. Two aggregators merge them with barrier-join semantics,
//! every merged publish runs the installed evaluation strategy, and the
//! actions it emits fan out to the handlers whose target and namespace match.
//!
//! ```text
//! producer ─► aggregator ─► trigger ─► strategy ─► dispatcher ─► handlers
//! ```
//!
//! ## Execution Model
//!
//! Everything runs synchronously on the call stack of the producer's
//! `update_snapshot()` (or a strategy's `emit`). Interval producers tick on a
//! tokio timer task and run the same chain from there. No component holds a
//! lock while calling out, so re-entrant registration is safe.
//!
//! ## Dynamic Membership
//!
//! Registering or unregistering a producer rebuilds that aggregator's join.
//! The merged stream stays silent until every producer publishes again.
//!
//! ## Failure Isolation
//!
//! Handler errors and panics are reported to the injected
//! [`DiagnosticSink`](morph_core::DiagnosticSink) and never stop delivery to
//! other handlers. A missing strategy is a diagnostic, not an error.

#![deny(unsafe_code)]

pub mod aggregator;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod join;
pub mod producer;
pub mod producers;
pub mod strategy;
pub mod topic;
pub mod trigger;

pub use aggregator::{ContextAggregator, RuleAggregator, SnapshotAggregator};
pub use dispatcher::{ActionDispatcher, AdaptiveHandler};
pub use engine::{AdaptationEngine, EngineConfig};
pub use errors::{EngineError, HandlerError, Result, StrategyError};
pub use producer::{
    ContextProducer, Refresh, RuleProducer, Snapshot, SnapshotCell, SnapshotObserver,
    SnapshotProducer, UpdateMode,
};
pub use producers::{ContextProvider, IntervalDriver, RuleProvider};
pub use strategy::{Emitter, EvaluationStrategy, FnStrategy};
pub use topic::{Subscription, Topic};
pub use trigger::{Evaluation, EvaluationTrigger};
