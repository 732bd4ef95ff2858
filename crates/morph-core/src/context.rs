//! Context parameters.
//!
//! A [`ContextParameter`] is one fact about the current context of use
//! (who the user is, what platform the UI runs on, what the environment looks
//! like). Producers publish whole sets of parameters; parameters are value
//! objects and are replaced, never mutated in place.
//!
//! All types use `camelCase` serde renaming so rule and context documents
//! match the JSON shape the UI side produces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The subject a context parameter describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextOfUse {
    /// Facts about the user (preferences, abilities, handedness).
    User,
    /// Facts about the device or runtime platform.
    Platform,
    /// Facts about the physical or social environment.
    Environment,
}

impl std::fmt::Display for ContextOfUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Platform => write!(f, "platform"),
            Self::Environment => write!(f, "environment"),
        }
    }
}

/// Declared value type of a context parameter.
///
/// Advisory only. The value itself is carried as JSON and is not checked
/// against the declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// A string value.
    String,
    /// A numeric value.
    Number,
    /// A boolean value.
    Boolean,
    /// An array value.
    Array,
    /// An object value.
    Object,
}

impl ParameterType {
    /// Infer the parameter type from a JSON value. `null` has no type.
    #[must_use]
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(_) => Some(Self::Number),
            Value::String(_) => Some(Self::String),
            Value::Array(_) => Some(Self::Array),
            Value::Object(_) => Some(Self::Object),
        }
    }
}

/// A single contextual fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextParameter {
    /// Subject this parameter describes.
    pub context_of_use: ContextOfUse,
    /// Declared value type, if any.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<ParameterType>,
    /// Parameter key. Identity of the parameter.
    pub key: String,
    /// Parameter value.
    pub value: Value,
}

impl ContextParameter {
    /// Create a parameter without a declared type.
    pub fn new(context_of_use: ContextOfUse, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            context_of_use,
            param_type: None,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a parameter whose declared type is inferred from the value.
    pub fn typed(context_of_use: ContextOfUse, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            context_of_use,
            param_type: ParameterType::of(&value),
            key: key.into(),
            value,
        }
    }

    /// Shorthand for a [`ContextOfUse::User`] parameter.
    pub fn user(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(ContextOfUse::User, key, value)
    }

    /// Shorthand for a [`ContextOfUse::Platform`] parameter.
    pub fn platform(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(ContextOfUse::Platform, key, value)
    }

    /// Shorthand for a [`ContextOfUse::Environment`] parameter.
    pub fn environment(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(ContextOfUse::Environment, key, value)
    }
}

/// Key lookup over a merged context snapshot.
///
/// Merged snapshots may hold the same key more than once (one entry per
/// producer). Lookups resolve to the first match in snapshot order, which is
/// producer registration order.
pub trait ContextLookup {
    /// First parameter with the given key.
    fn lookup(&self, key: &str) -> Option<&ContextParameter>;

    /// First parameter with the given key and context of use.
    fn lookup_in(&self, context_of_use: ContextOfUse, key: &str) -> Option<&ContextParameter>;

    /// Value of the first parameter with the given key.
    fn value_of(&self, key: &str) -> Option<&Value> {
        self.lookup(key).map(|p| &p.value)
    }
}

impl ContextLookup for [ContextParameter] {
    fn lookup(&self, key: &str) -> Option<&ContextParameter> {
        self.iter().find(|p| p.key == key)
    }

    fn lookup_in(&self, context_of_use: ContextOfUse, key: &str) -> Option<&ContextParameter> {
        self.iter()
            .find(|p| p.context_of_use == context_of_use && p.key == key)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
