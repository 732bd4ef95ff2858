//! Evaluation trigger.
//!
//! Holds the single active [`EvaluationStrategy`] and runs it against the
//! latest merged rules and context whenever either aggregator publishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use morph_core::{Diagnostic, DiagnosticSink};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::aggregator::{ContextAggregator, RuleAggregator};
use crate::errors::StrategyError;
use crate::strategy::{Emitter, EvaluationStrategy};

/// Outcome of one trigger invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// No strategy was installed.
    Skipped,
    /// The strategy ran and returned `Ok`.
    Completed,
    /// The strategy returned an error that was isolated into a diagnostic.
    Failed(StrategyError),
}

/// Runs the active strategy on every merged update.
pub struct EvaluationTrigger {
    strategy: RwLock<Option<Arc<dyn EvaluationStrategy>>>,
    context: Arc<ContextAggregator>,
    rules: Arc<RuleAggregator>,
    emitter: Emitter,
    diagnostics: Arc<dyn DiagnosticSink>,
    isolate_errors: bool,
    evaluations: AtomicU64,
    last_error: Mutex<Option<StrategyError>>,
}

impl EvaluationTrigger {
    /// Create a trigger reading from both aggregators and emitting through
    /// `emitter`.
    ///
    /// With `isolate_errors` set, strategy errors only become diagnostics;
    /// otherwise they are also returned from [`on_merged_update`](Self::on_merged_update).
    pub fn new(
        context: Arc<ContextAggregator>,
        rules: Arc<RuleAggregator>,
        emitter: Emitter,
        diagnostics: Arc<dyn DiagnosticSink>,
        isolate_errors: bool,
    ) -> Self {
        Self {
            strategy: RwLock::new(None),
            context,
            rules,
            emitter,
            diagnostics,
            isolate_errors,
            evaluations: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// Install `strategy`, returning the one it replaces. The replaced
    /// strategy is not notified.
    pub fn set_strategy(
        &self,
        strategy: Arc<dyn EvaluationStrategy>,
    ) -> Option<Arc<dyn EvaluationStrategy>> {
        debug!(strategy = strategy.name(), "installing evaluation strategy");
        self.strategy.write().replace(strategy)
    }

    /// Remove the active strategy.
    pub fn clear_strategy(&self) -> Option<Arc<dyn EvaluationStrategy>> {
        self.strategy.write().take()
    }

    /// Whether a strategy is installed.
    pub fn has_strategy(&self) -> bool {
        self.strategy.read().is_some()
    }

    /// Evaluate the latest merged rules and context.
    ///
    /// A missing strategy is reported and skipped.
    #[instrument(skip_all, level = "trace")]
    pub fn on_merged_update(&self) -> Result<Evaluation, StrategyError> {
        let Some(strategy) = self.strategy.read().clone() else {
            self.diagnostics.report(&Diagnostic::MissingStrategy);
            return Ok(Evaluation::Skipped);
        };

        let rules = self.rules.merged();
        let context = self.context.merged();
        let _ = self.evaluations.fetch_add(1, Ordering::Relaxed);
        debug!(
            strategy = strategy.name(),
            rules = rules.len(),
            context = context.len(),
            "evaluating"
        );

        match strategy.evaluate(&rules, &context, &self.emitter) {
            Ok(()) => Ok(Evaluation::Completed),
            Err(error) => {
                self.diagnostics.report(&Diagnostic::StrategyFailed {
                    strategy: strategy.name().to_string(),
                    error: error.to_string(),
                });
                *self.last_error.lock() = Some(error.clone());
                if self.isolate_errors {
                    Ok(Evaluation::Failed(error))
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Number of times a strategy was invoked.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Most recent strategy error, if any.
    pub fn last_error(&self) -> Option<StrategyError> {
        self.last_error.lock().clone()
    }

    /// Emitter handed to strategies.
    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }
}

impl std::fmt::Debug for EvaluationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationTrigger")
            .field("has_strategy", &self.has_strategy())
            .field("isolate_errors", &self.isolate_errors)
            .field("evaluations", &self.evaluation_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
