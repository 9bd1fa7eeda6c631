//! Invocation harness
//!
//! Reads the JSON argument bundle, separates connection parameters from
//! module parameters, validates both before any network traffic and renders
//! every outcome as a single JSON result bundle.

use super::result::{failure_bundle, invalid};
use super::{ModuleKind, ModuleParams};
use crate::config::{Config, ConnectionParams};
use crate::svc::{SvcApi, SvcClient};
use anyhow::Result;
use serde_json::{Map, Value};

/// Key wrapping the module arguments in an Ansible argument file
const ARGS_KEY: &str = "ANSIBLE_MODULE_ARGS";

/// Prefix of the controller-internal keys Ansible adds to every bundle
const INTERNAL_PREFIX: &str = "_ansible_";

/// A parsed and validated invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub kind: ModuleKind,
    pub connection: ConnectionParams,
    pub params: ModuleParams,
}

/// Decode the raw bundle, unwrapping `ANSIBLE_MODULE_ARGS` when present
pub fn read_bundle(raw: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| invalid(format!("Failed to parse module arguments as JSON: {}", e)))?;

    match value {
        Value::Object(mut map) => match map.remove(ARGS_KEY) {
            Some(Value::Object(args)) => Ok(args),
            Some(_) => Err(invalid(format!("{} must be a JSON object", ARGS_KEY))),
            None => Ok(map),
        },
        _ => Err(invalid("Module arguments must be a JSON object")),
    }
}

/// Split arguments into connection and module parts, dropping controller
/// internals
pub fn split_args(args: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    args.into_iter()
        .filter(|(key, _)| !key.starts_with(INTERNAL_PREFIX))
        .partition(|(key, _)| ConnectionParams::KEYS.contains(&key.as_str()))
}

impl Invocation {
    /// Parse and validate a raw bundle for the given module
    pub fn from_bundle(kind: ModuleKind, raw: &str) -> Result<Self> {
        let (connection, module) = split_args(read_bundle(raw)?);

        let connection: ConnectionParams = serde_json::from_value(Value::Object(connection))
            .map_err(|e| invalid(format!("Invalid connection parameters: {}", e)))?;
        let params = ModuleParams::parse(kind, module)?;

        Ok(Self {
            kind,
            connection,
            params,
        })
    }

    /// Resolve the connection, then run the module against the appliance
    pub async fn run(self, config: &Config) -> Value {
        let client = match self
            .connection
            .clone()
            .resolve(config)
            .and_then(|connection| SvcClient::new(&connection))
        {
            Ok(client) => client,
            Err(err) => return failure_bundle(&err),
        };
        execute(self.kind, &self.params, &client).await
    }
}

/// Run validated parameters against an API and render the result bundle
pub async fn execute<A: SvcApi>(kind: ModuleKind, params: &ModuleParams, api: &A) -> Value {
    match params.apply(api).await {
        Ok(result) => {
            tracing::info!("{} finished, changed={}", kind, result.changed);
            result.to_json()
        }
        Err(err) => {
            tracing::error!("{} failed: {:#}", kind, err);
            failure_bundle(&err)
        }
    }
}

/// Whether a rendered bundle reports failure
pub fn is_failure(bundle: &Value) -> bool {
    bundle.get("failed").and_then(|v| v.as_bool()).unwrap_or(false)
}
