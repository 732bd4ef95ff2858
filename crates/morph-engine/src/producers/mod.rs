//! Reference producer implementations.
//!
//! - [`ContextProvider`]: in-memory context parameters
//! - [`RuleProvider`]: in-memory rules, optionally loaded from a rule file
//! - [`IntervalDriver`]: the timer behind [`UpdateMode::Interval`](crate::producer::UpdateMode::Interval)

pub mod context;
pub mod interval;
pub mod rules;

pub use context::ContextProvider;
pub use interval::IntervalDriver;
pub use rules::RuleProvider;
