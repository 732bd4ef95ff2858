//! # morph-core
//!
//! Foundation types for the Morph runtime UI adaptation engine.
//!
//! This crate provides the shared vocabulary the other Morph crates depend on:
//!
//! - **Context**: [`ContextParameter`] facts tagged with a [`ContextOfUse`],
//!   plus first-match [`ContextLookup`] over merged snapshots
//! - **Rules**: [`AdaptationRule`] and [`AdaptationAction`], including the
//!   scope filter that decides which handler instances an action addresses
//! - **Rule files**: JSON rule definition loading via [`parse_rules`] and
//!   [`load_rules_from_path`]
//! - **Diagnostics**: the injected [`DiagnosticSink`] the engine reports into
//! - **Errors**: [`MorphError`] via `thiserror`
//! - **Logging**: `tracing` subscriber setup and capture helpers for tests

#![deny(unsafe_code)]

pub mod context;
pub mod diagnostics;
pub mod errors;
pub mod logging;
pub mod rules;

pub use context::{ContextLookup, ContextOfUse, ContextParameter, ParameterType};
pub use diagnostics::{Diagnostic, DiagnosticSink, MemorySink, NullSink, TracingSink};
pub use errors::{MorphError, Result};
pub use rules::{AdaptationAction, AdaptationRule, load_rules_from_path, parse_rules};
