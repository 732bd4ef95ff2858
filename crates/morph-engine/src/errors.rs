//! Engine error types.

use morph_core::MorphError;
use thiserror::Error;

/// Errors raised while wiring producers into the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A producer with the same name is already registered.
    #[error("{aggregator} producer '{name}' is already registered")]
    DuplicateProducer {
        /// Aggregator the registration targeted.
        aggregator: &'static str,
        /// Producer name.
        name: String,
    },

    /// An interval-driven producer was built outside a tokio runtime.
    #[error("interval producer '{0}' requires a running tokio runtime")]
    NoRuntime(String),

    /// An interval-driven producer was given a zero period.
    #[error("interval producer '{0}' needs a non-zero period")]
    ZeroInterval(String),

    /// A rule source could not be loaded.
    #[error("rule source error: {0}")]
    RuleSource(#[from] MorphError),
}

/// Result type for engine wiring operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors returned by an evaluation strategy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrategyError {
    /// A rule condition could not be evaluated.
    #[error("condition of rule '{rule}' could not be evaluated: {message}")]
    Condition {
        /// Rule name.
        rule: String,
        /// Error message.
        message: String,
    },

    /// Any other strategy failure.
    #[error("{0}")]
    Internal(String),
}

/// Errors returned by an adaptive handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler does not support the action.
    #[error("unsupported action '{0}'")]
    Unsupported(String),

    /// The handler could not apply the action.
    #[error("failed to apply '{action}': {reason}")]
    Apply {
        /// Action name.
        action: String,
        /// Why it failed.
        reason: String,
    },
}
