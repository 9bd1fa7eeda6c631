//! In-memory appliance for module scenarios
//!
//! Listing responses are keyed by `<command>/<object>` (or just `<command>`
//! for unaddressed and filtered listings). Each key holds a queue; the last response
//! repeats once the queue is drained, so a state that never changes only
//! needs to be declared once. Unknown keys answer "no such object".

#![allow(dead_code)]

use anyhow::Result;
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use svctl::svc::{Command, SvcApi, SvcError};

#[derive(Default)]
pub struct FakeApi {
    listings: RefCell<HashMap<String, VecDeque<Option<Value>>>>,
    results: RefCell<HashMap<String, Value>>,
    failures: RefCell<HashMap<String, String>>,
    reads: RefCell<Vec<String>>,
    writes: RefCell<Vec<Command>>,
}

fn key_of(cmd: &Command) -> String {
    match cmd.args.first() {
        Some(arg) => format!("{}/{}", cmd.name, arg),
        None => cmd.name.clone(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a listing response; `Value::Null` means "no such object"
    pub fn with_listing(self, key: &str, value: Value) -> Self {
        let response = if value.is_null() { None } else { Some(value) };
        self.listings
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Response returned by a mutating command
    pub fn with_result(self, command: &str, value: Value) -> Self {
        self.results.borrow_mut().insert(command.to_string(), value);
        self
    }

    /// Make a command fail with a vendor error
    pub fn failing(self, command: &str, message: &str) -> Self {
        self.failures
            .borrow_mut()
            .insert(command.to_string(), message.to_string());
        self
    }

    /// Every listing issued, rendered as CLI text
    pub fn reads(&self) -> Vec<String> {
        self.reads.borrow().clone()
    }

    /// Every mutating command issued, rendered as CLI text
    pub fn writes(&self) -> Vec<String> {
        self.writes.borrow().iter().map(|c| c.to_string()).collect()
    }

    pub fn write_commands(&self) -> Vec<Command> {
        self.writes.borrow().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.reads.borrow().len() + self.writes.borrow().len()
    }

    fn fail_if_configured(&self, cmd: &Command) -> Result<()> {
        match self.failures.borrow().get(&cmd.name) {
            Some(message) => Err(SvcError::Api {
                status: 500,
                message: message.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }
}

impl SvcApi for FakeApi {
    async fn obj_info(&self, cmd: &Command) -> Result<Option<Value>> {
        self.reads.borrow_mut().push(cmd.to_string());
        self.fail_if_configured(cmd)?;

        let mut listings = self.listings.borrow_mut();
        let Some(queue) = listings.get_mut(&key_of(cmd)) else {
            return Ok(None);
        };
        let response = if queue.len() > 1 {
            queue.pop_front().flatten()
        } else {
            queue.front().cloned().flatten()
        };
        Ok(response)
    }

    async fn run(&self, cmd: &Command) -> Result<Value> {
        self.writes.borrow_mut().push(cmd.clone());
        self.fail_if_configured(cmd)?;

        Ok(self
            .results
            .borrow()
            .get(&cmd.name)
            .cloned()
            .unwrap_or_else(|| json!({})))
    }
}

/// Arguments from a `json!` object literal
pub fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}
