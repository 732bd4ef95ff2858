//! Structured diagnostics.
//!
//! The engine never writes to a logging facility directly when something
//! noteworthy but non-fatal happens (no strategy installed, a handler failed,
//! a join was rebuilt). It reports a [`Diagnostic`] into an injected
//! [`DiagnosticSink`]. [`TracingSink`] forwards to `tracing` and is the
//! default; [`MemorySink`] keeps everything for inspection.

use std::fmt;

use parking_lot::Mutex;
use tracing::Level;

/// A non-fatal event reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A merged update arrived while no evaluation strategy was installed.
    MissingStrategy,
    /// The evaluation strategy returned an error.
    StrategyFailed {
        /// Strategy name.
        strategy: String,
        /// Rendered error.
        error: String,
    },
    /// A handler returned an error from `on_adapt`.
    HandlerFailed {
        /// Handler target name.
        target: String,
        /// Handler namespace.
        namespace: String,
        /// Action being delivered.
        action: String,
        /// Rendered error.
        error: String,
    },
    /// A handler panicked inside `on_adapt`.
    HandlerPanicked {
        /// Handler target name.
        target: String,
        /// Handler namespace.
        namespace: String,
        /// Action being delivered.
        action: String,
    },
    /// An aggregator discarded its join state after a membership change.
    JoinRebuilt {
        /// Aggregator name (`context` or `rules`).
        aggregator: String,
        /// Producer count after the change.
        producers: usize,
    },
}

impl Diagnostic {
    /// Severity used when forwarding to `tracing`.
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::MissingStrategy | Self::JoinRebuilt { .. } => Level::DEBUG,
            Self::StrategyFailed { .. }
            | Self::HandlerFailed { .. }
            | Self::HandlerPanicked { .. } => Level::WARN,
        }
    }

    /// Stable short identifier for the diagnostic kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingStrategy => "missing_strategy",
            Self::StrategyFailed { .. } => "strategy_failed",
            Self::HandlerFailed { .. } => "handler_failed",
            Self::HandlerPanicked { .. } => "handler_panicked",
            Self::JoinRebuilt { .. } => "join_rebuilt",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStrategy => write!(f, "no evaluation strategy installed, skipping evaluation"),
            Self::StrategyFailed { strategy, error } => {
                write!(f, "evaluation strategy '{strategy}' failed: {error}")
            }
            Self::HandlerFailed {
                target,
                namespace,
                action,
                error,
            } => write!(f, "handler {target}/{namespace} failed on '{action}': {error}"),
            Self::HandlerPanicked {
                target,
                namespace,
                action,
            } => write!(f, "handler {target}/{namespace} panicked on '{action}'"),
            Self::JoinRebuilt {
                aggregator,
                producers,
            } => write!(f, "{aggregator} join rebuilt over {producers} producer(s)"),
        }
    }
}

/// Receiver of engine diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Record a diagnostic. Must not call back into the engine.
    fn report(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        let kind = diagnostic.kind();
        match diagnostic.level() {
            Level::ERROR => tracing::error!(kind, "{diagnostic}"),
            Level::WARN => tracing::warn!(kind, "{diagnostic}"),
            Level::INFO => tracing::info!(kind, "{diagnostic}"),
            Level::DEBUG => tracing::debug!(kind, "{diagnostic}"),
            Level::TRACE => tracing::trace!(kind, "{diagnostic}"),
        }
    }
}

/// Discards diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _diagnostic: &Diagnostic) {}
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All diagnostics reported so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Number of diagnostics of the given kind.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.entries.lock().iter().filter(|d| d.kind() == kind).count()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: &Diagnostic) {
        self.entries.lock().push(diagnostic.clone());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
