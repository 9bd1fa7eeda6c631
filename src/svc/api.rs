//! The command surface every module talks to.
//!
//! The appliance exposes its CLI over REST: each command is a POST to
//! `<base>/<command>[/<object>]` with the options as a JSON object. Flag
//! options are sent as `true`.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

/// One CLI command addressed to the appliance
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    pub name: String,
    pub opts: Map<String, Value>,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Add an option with a value
    pub fn opt(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.opts.insert(key.to_string(), value.into());
        self
    }

    /// Add an option only when a value is supplied
    pub fn opt_if<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.opt(key, v),
            None => self,
        }
    }

    /// Add a value-less flag
    pub fn flag(self, key: &str) -> Self {
        self.opt(key, true)
    }

    pub fn flag_if(self, key: &str, enabled: bool) -> Self {
        if enabled {
            self.flag(key)
        } else {
            self
        }
    }

    /// Add a positional object argument (object name or id)
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add a `-filtervalue attr=value` option
    pub fn filter(self, attr: &str, value: &str) -> Self {
        self.opt("filtervalue", format!("{}={}", attr, value))
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.opts.get(key) == Some(&Value::Bool(true))
    }

    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.opts.get(key).and_then(|v| v.as_str())
    }
}

/// Renders the command the way it would be typed on the appliance CLI
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in &self.opts {
            match value {
                Value::Bool(true) => write!(f, " -{}", key)?,
                Value::String(s) => write!(f, " -{} {}", key, s)?,
                other => write!(f, " -{} {}", key, other)?,
            }
        }
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Read and write access to the appliance.
///
/// `obj_info` returns `None` when the appliance reports that the addressed
/// object does not exist; every other failure is an error.
#[allow(async_fn_in_trait)]
pub trait SvcApi {
    async fn obj_info(&self, cmd: &Command) -> Result<Option<Value>>;
    async fn run(&self, cmd: &Command) -> Result<Value>;
}

/// Normalise a listing response into records.
/// Detailed views come back as a single object, concise views as an array.
pub fn records(value: Option<Value>) -> Vec<Map<String, Value>> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Some(Value::Object(map)) if !map.is_empty() => vec![map],
        _ => Vec::new(),
    }
}

/// First record of a listing response, if any
pub fn first_record(value: Option<Value>) -> Option<Map<String, Value>> {
    records(value).into_iter().next()
}

/// Read a string attribute from a record, `""` when missing
pub fn attr<'a>(record: &'a Map<String, Value>, key: &str) -> &'a str {
    record.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Decode a record into a typed view; unknown attributes are ignored
pub fn decode<T: DeserializeOwned>(record: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(record)).context("Unexpected record layout")
}

/// Fetch one object and decode it, `None` when it does not exist
pub async fn fetch_record<A: SvcApi, T: DeserializeOwned>(api: &A, cmd: &Command) -> Result<Option<T>> {
    match first_record(api.obj_info(cmd).await?) {
        Some(record) => decode(record).map(Some),
        None => Ok(None),
    }
}

/// Object id reported by a `mk*` command, e.g. `{"id": "3", "message": ...}`
pub fn created_id(response: &Value) -> Option<String> {
    match response.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
