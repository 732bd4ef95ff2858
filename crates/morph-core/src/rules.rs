//! Adaptation rules and actions.
//!
//! An [`AdaptationRule`] pairs an opaque condition with an ordered list of
//! [`AdaptationAction`]s. The condition is never interpreted here; only the
//! evaluation strategy plugged into the engine understands it.
//!
//! Rule definition files are JSON arrays of rules:
//!
//! ```json
//! [
//!   {
//!     "name": "USER_IS_LEFT_HANDED",
//!     "condition": "c.user.handedness == 'left'",
//!     "actions": [
//!       { "target": "HideableButtonAW", "scope": ["rightBtn"], "name": "HIDE" },
//!       { "target": "HideableButtonAW", "scope": ["leftBtn"], "name": "SHOW" }
//!     ]
//!   }
//! ]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{MorphError, Result};

/// A single adaptation addressed to a handler type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationAction {
    /// Handler type identifier.
    pub target: String,
    /// Namespaces addressed. `None` and an empty list both mean every
    /// namespace of the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
    /// Action identifier, interpreted by the handler.
    pub name: String,
    /// Free-form action parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl AdaptationAction {
    /// Create an unscoped action (broadcast to every namespace of `target`).
    pub fn new(target: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            scope: None,
            name: name.into(),
            params: None,
        }
    }

    /// Restrict the action to the given namespaces.
    #[must_use]
    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = Some(scope.into_iter().map(Into::into).collect());
        self
    }

    /// Attach a single parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self
            .params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Whether the action is scoped to specific namespaces.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.scope.as_ref().is_none_or(Vec::is_empty)
    }

    /// Whether a handler registered as `(target_name, namespace)` should
    /// receive this action.
    #[must_use]
    pub fn addresses(&self, target_name: &str, namespace: &str) -> bool {
        if self.target != target_name {
            return false;
        }
        match &self.scope {
            Some(scope) if !scope.is_empty() => scope.iter().any(|s| s == namespace),
            _ => true,
        }
    }

    /// Look up an action parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(key))
    }
}

/// A named condition with the actions to emit when it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationRule {
    /// Rule name. Intended unique; not enforced.
    pub name: String,
    /// Opaque condition expression.
    pub condition: String,
    /// Actions in emission order.
    #[serde(default)]
    pub actions: Vec<AdaptationAction>,
}

impl AdaptationRule {
    /// Create a rule with no actions.
    pub fn new(name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
            actions: Vec::new(),
        }
    }

    /// Append an action.
    #[must_use]
    pub fn with_action(mut self, action: AdaptationAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// Parse a rule definition document.
pub fn parse_rules(json: &str) -> Result<Vec<AdaptationRule>> {
    Ok(serde_json::from_str(json)?)
}

/// Load a rule definition file.
pub fn load_rules_from_path(path: &Path) -> Result<Vec<AdaptationRule>> {
    let content = std::fs::read_to_string(path).map_err(|source| MorphError::RuleFile {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = parse_rules(&content)?;
    debug!(?path, count = rules.len(), "loaded rule definitions");
    Ok(rules)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
