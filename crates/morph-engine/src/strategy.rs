//! Evaluation strategy contract.
//!
//! The engine owns no condition language. A strategy receives the full merged
//! rule set and the full merged context and decides which actions to emit,
//! calling [`Emitter::emit`] once per action in the rule's declared order.

use std::sync::Weak;

use morph_core::{AdaptationAction, AdaptationRule, ContextParameter};

use crate::dispatcher::ActionDispatcher;
use crate::errors::StrategyError;

/// Pluggable rule evaluator.
///
/// `evaluate` should be a pure function of its inputs apart from calls to
/// `emit`. The emitter may also be cloned and used after `evaluate` returns.
pub trait EvaluationStrategy: Send + Sync {
    /// Strategy name used in diagnostics.
    fn name(&self) -> &str {
        "strategy"
    }

    /// Evaluate `rules` against `context`, emitting actions for matching rules.
    fn evaluate(
        &self,
        rules: &[AdaptationRule],
        context: &[ContextParameter],
        emit: &Emitter,
    ) -> Result<(), StrategyError>;
}

/// Action emission handle passed to strategies.
///
/// Holds the dispatcher weakly: emitting after the engine is gone is a no-op.
#[derive(Clone, Debug)]
pub struct Emitter {
    dispatcher: Weak<ActionDispatcher>,
}

impl Emitter {
    pub(crate) fn new(dispatcher: Weak<ActionDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// An emitter that drops every action.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            dispatcher: Weak::new(),
        }
    }

    /// Publish `action` to the dispatcher. Returns the number of handlers it
    /// was delivered to.
    pub fn emit(&self, action: AdaptationAction) -> usize {
        match self.dispatcher.upgrade() {
            Some(dispatcher) => dispatcher.publish(&action),
            None => {
                tracing::trace!(action = %action.name, "emitter detached, dropping action");
                0
            }
        }
    }

    /// Whether the dispatcher is still alive.
    pub fn is_attached(&self) -> bool {
        self.dispatcher.strong_count() > 0
    }
}

/// Closure-backed strategy.
pub struct FnStrategy<F> {
    name: String,
    f: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&[AdaptationRule], &[ContextParameter], &Emitter) -> Result<(), StrategyError>
        + Send
        + Sync,
{
    /// Wrap `f` as a strategy named `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> EvaluationStrategy for FnStrategy<F>
where
    F: Fn(&[AdaptationRule], &[ContextParameter], &Emitter) -> Result<(), StrategyError>
        + Send
        + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(
        &self,
        rules: &[AdaptationRule],
        context: &[ContextParameter],
        emit: &Emitter,
    ) -> Result<(), StrategyError> {
        (self.f)(rules, context, emit)
    }
}

impl<F> std::fmt::Debug for FnStrategy<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStrategy").field("name", &self.name).finish()
    }
}
