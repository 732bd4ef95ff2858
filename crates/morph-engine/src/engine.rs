//! Engine facade.
//!
//! [`AdaptationEngine`] owns the two aggregators, the evaluation trigger and
//! the action dispatcher, and wires them so that every merged publish runs
//! the active strategy synchronously on the publisher's call stack.

use std::sync::{Arc, Weak};
use std::time::Duration;

use morph_core::logging;
use morph_core::{
    AdaptationAction, AdaptationRule, ContextParameter, DiagnosticSink, TracingSink,
};
use morph_settings::MorphSettings;
use tracing::{debug, info};

use crate::aggregator::{ContextAggregator, RuleAggregator};
use crate::dispatcher::{ActionDispatcher, AdaptiveHandler};
use crate::errors::{HandlerError, Result, StrategyError};
use crate::producer::{Refresh, Snapshot, SnapshotProducer};
use crate::producers::{ContextProvider, RuleProvider};
use crate::strategy::{Emitter, EvaluationStrategy};
use crate::topic::Subscription;
use crate::trigger::{Evaluation, EvaluationTrigger};

/// Engine construction options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Turn strategy errors into diagnostics only.
    pub isolate_strategy_errors: bool,
    /// Prune dispatcher registrations whose handler was dropped.
    pub prune_dead_handlers: bool,
    /// Period used by the engine's interval producer helpers.
    pub default_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&MorphSettings::default())
    }
}

impl From<&MorphSettings> for EngineConfig {
    fn from(settings: &MorphSettings) -> Self {
        Self {
            isolate_strategy_errors: settings.engine.isolate_strategy_errors,
            prune_dead_handlers: settings.engine.prune_dead_handlers,
            default_interval: settings.producers.default_interval(),
        }
    }
}

/// The reactive adaptation pipeline.
///
/// producer publishes → aggregator merges → trigger evaluates → strategy
/// emits → dispatcher delivers to matching handlers.
pub struct AdaptationEngine {
    context: Arc<ContextAggregator>,
    rules: Arc<RuleAggregator>,
    trigger: Arc<EvaluationTrigger>,
    dispatcher: Arc<ActionDispatcher>,
    config: EngineConfig,
    rule_files: Vec<Arc<RuleProvider>>,
    _wiring: Vec<Subscription>,
}

impl AdaptationEngine {
    /// Build an engine reporting diagnostics into `diagnostics`.
    pub fn new(config: EngineConfig, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        let context = ContextAggregator::new("context", Arc::clone(&diagnostics));
        let rules = RuleAggregator::new("rules", Arc::clone(&diagnostics));
        let dispatcher = ActionDispatcher::new(Arc::clone(&diagnostics), config.prune_dead_handlers);
        let trigger = Arc::new(EvaluationTrigger::new(
            Arc::clone(&context),
            Arc::clone(&rules),
            Emitter::new(Arc::downgrade(&dispatcher)),
            diagnostics,
            config.isolate_strategy_errors,
        ));

        let wiring = vec![
            context.subscribe(evaluate_on_publish::<ContextParameter>(Arc::downgrade(&trigger))),
            rules.subscribe(evaluate_on_publish::<AdaptationRule>(Arc::downgrade(&trigger))),
        ];

        Self {
            context,
            rules,
            trigger,
            dispatcher,
            config,
            rule_files: Vec::new(),
            _wiring: wiring,
        }
    }

    /// Build an engine from settings, logging diagnostics through `tracing`
    /// and registering one [`RuleProvider`] per configured rule file.
    ///
    /// Installs the global subscriber described by `settings.logging` unless
    /// the host already installed one. File providers are event-driven, so
    /// their rules reach the merged set once
    /// [`publish_rule_files`](Self::publish_rule_files) is called.
    pub fn from_settings(settings: &MorphSettings) -> Result<Self> {
        let _ = logging::install_subscriber(&settings.logging.level, settings.logging.json);
        let mut engine = Self::new(EngineConfig::from(settings), Arc::new(TracingSink));
        for path in settings.rules.paths() {
            let name = path.display().to_string();
            let provider = Arc::new(RuleProvider::from_path(name.as_str(), &path)?);
            info!(file = %name, rules = provider.rules().len(), "loaded rule file");
            engine.register_rule_producer(provider.clone())?;
            engine.rule_files.push(provider);
        }
        Ok(engine)
    }

    /// Build an engine from the process-wide settings
    /// (`~/.morph/settings.json` plus `MORPH_*` overrides).
    pub fn from_global() -> Result<Self> {
        Self::from_settings(morph_settings::get_settings())
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── producers ──────────────────────────────────────────────────────────

    /// Register a context producer. Rebuilds the context join.
    pub fn register_context_producer(
        &self,
        producer: Arc<dyn SnapshotProducer<ContextParameter>>,
    ) -> Result<()> {
        self.context.register(producer)
    }

    /// Register a rule producer. Rebuilds the rule join.
    pub fn register_rule_producer(
        &self,
        producer: Arc<dyn SnapshotProducer<AdaptationRule>>,
    ) -> Result<()> {
        self.rules.register(producer)
    }

    /// Unregister a context producer by name.
    pub fn unregister_context_producer(&self, name: &str) -> bool {
        self.context.unregister(name)
    }

    /// Unregister a rule producer by name.
    pub fn unregister_rule_producer(&self, name: &str) -> bool {
        self.rules.unregister(name)
    }

    /// Create and register a context provider ticking at the configured
    /// default interval. Must be called from within a tokio runtime.
    pub fn spawn_interval_context_provider(
        &self,
        name: &str,
        parameters: Vec<ContextParameter>,
    ) -> Result<Arc<ContextProvider>> {
        let provider = ContextProvider::interval(name, parameters, self.config.default_interval)?;
        self.register_context_producer(provider.clone())?;
        Ok(provider)
    }

    /// Republish every rule file provider registered by
    /// [`from_settings`](Self::from_settings).
    pub fn publish_rule_files(&self) -> usize {
        self.rule_files.iter().map(|p| p.update_snapshot()).sum()
    }

    /// Rule file providers registered by [`from_settings`](Self::from_settings).
    pub fn rule_files(&self) -> &[Arc<RuleProvider>] {
        &self.rule_files
    }

    // ── strategy ───────────────────────────────────────────────────────────

    /// Install the evaluation strategy, returning the one it replaces.
    pub fn set_strategy(
        &self,
        strategy: Arc<dyn EvaluationStrategy>,
    ) -> Option<Arc<dyn EvaluationStrategy>> {
        self.trigger.set_strategy(strategy)
    }

    /// Remove the evaluation strategy.
    pub fn clear_strategy(&self) -> Option<Arc<dyn EvaluationStrategy>> {
        self.trigger.clear_strategy()
    }

    /// Run the strategy now against the current merged sets.
    ///
    /// Unlike publish-driven evaluation, a strategy error is returned here
    /// when error isolation is disabled.
    pub fn evaluate_now(&self) -> std::result::Result<Evaluation, StrategyError> {
        self.trigger.on_merged_update()
    }

    // ── handlers ───────────────────────────────────────────────────────────

    /// Subscribe a callback handler.
    pub fn subscribe_handler<F>(
        &self,
        target: impl Into<String>,
        namespace: impl Into<String>,
        on_adapt: F,
    ) -> Subscription
    where
        F: Fn(&AdaptationAction) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(target, namespace, on_adapt)
    }

    /// Register an adaptive handler without owning it.
    pub fn register_handler<H>(&self, handler: &Arc<H>) -> Subscription
    where
        H: AdaptiveHandler + 'static,
    {
        self.dispatcher.register_handler(handler)
    }

    /// Publish an action directly to the dispatcher.
    pub fn publish(&self, action: &AdaptationAction) -> usize {
        self.dispatcher.publish(action)
    }

    /// An emitter bound to this engine's dispatcher.
    pub fn emitter(&self) -> Emitter {
        self.trigger.emitter().clone()
    }

    // ── inspection ─────────────────────────────────────────────────────────

    /// Latest merged context.
    pub fn merged_context(&self) -> Snapshot<ContextParameter> {
        self.context.merged()
    }

    /// Latest merged rules.
    pub fn merged_rules(&self) -> Snapshot<AdaptationRule> {
        self.rules.merged()
    }

    /// Number of strategy invocations.
    pub fn evaluation_count(&self) -> u64 {
        self.trigger.evaluation_count()
    }

    /// Most recent strategy error.
    pub fn last_strategy_error(&self) -> Option<StrategyError> {
        self.trigger.last_error()
    }

    /// Number of live handler registrations.
    pub fn subscriber_count(&self) -> usize {
        self.dispatcher.subscriber_count()
    }

    /// Context aggregator.
    pub fn context(&self) -> &Arc<ContextAggregator> {
        &self.context
    }

    /// Rule aggregator.
    pub fn rules(&self) -> &Arc<RuleAggregator> {
        &self.rules
    }

    /// Action dispatcher.
    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }
}

fn evaluate_on_publish<T: 'static>(
    trigger: Weak<EvaluationTrigger>,
) -> impl Fn(&Snapshot<T>) + Send + Sync + 'static {
    move |_| {
        let Some(trigger) = trigger.upgrade() else {
            return;
        };
        // already reported to the diagnostic sink
        if let Err(error) = trigger.on_merged_update() {
            debug!(%error, "publish-driven evaluation failed");
        }
    }
}

impl std::fmt::Debug for AdaptationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptationEngine")
            .field("context", &self.context)
            .field("rules", &self.rules)
            .field("trigger", &self.trigger)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
