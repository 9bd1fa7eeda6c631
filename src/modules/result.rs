//! Result bundles and the failure taxonomy shared by all modules

use crate::svc::format_svc_error;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Failures a module detects itself, as opposed to transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// Bad or conflicting input, detected before any remote call
    #[error("{0}")]
    Validation(String),
    /// Remote state prevents the requested change; detected after a read,
    /// before any write
    #[error("{0}")]
    Conflict(String),
}

/// Shorthand for a validation failure
pub fn invalid(msg: impl Into<String>) -> anyhow::Error {
    ModuleError::Validation(msg.into()).into()
}

/// Shorthand for a remote-state conflict
pub fn conflict(msg: impl Into<String>) -> anyhow::Error {
    ModuleError::Conflict(msg.into()).into()
}

/// Successful result bundle: `{changed, msg?, ...fields}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleResult {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ModuleResult {
    pub fn changed(msg: impl Into<String>) -> Self {
        Self {
            changed: true,
            msg: Some(msg.into()),
            data: Map::new(),
        }
    }

    pub fn unchanged(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: Some(msg.into()),
            data: Map::new(),
        }
    }

    /// Result without a message (gather-only modules)
    pub fn facts(data: Map<String, Value>) -> Self {
        Self {
            changed: false,
            msg: None,
            data,
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "changed": self.changed }))
    }
}

/// Message shown to the caller for any failure
pub fn failure_message(error: &anyhow::Error) -> String {
    if let Some(module) = error.downcast_ref::<ModuleError>() {
        return module.to_string();
    }
    format_svc_error(error)
}

/// Failure bundle: `{failed: true, changed: false, msg}`
pub fn failure_bundle(error: &anyhow::Error) -> Value {
    json!({
        "failed": true,
        "changed": false,
        "msg": failure_message(error),
    })
}
