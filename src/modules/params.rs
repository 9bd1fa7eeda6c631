//! Argument parsing and validation helpers
//!
//! Argument bundles arrive loosely typed: booleans as `"yes"`/`"True"`,
//! integers as strings, lists as comma separated strings. The [`de`]
//! functions accept those forms; the validators below express the
//! mutually-exclusive / required-by / allowed-for-state rules each module
//! declares.

use super::result::invalid;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Desired presence of a managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Present,
    Absent,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Present => write!(f, "present"),
            State::Absent => write!(f, "absent"),
        }
    }
}

/// `yes` / `no` option values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn as_str(&self) -> &'static str {
        match self {
            YesNo::Yes => "yes",
            YesNo::No => "no",
        }
    }

    /// Compare with the attribute string the appliance reports
    pub fn matches(&self, observed: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(observed.trim())
    }
}

/// `on` / `off` option values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnOff::On => "on",
            OnOff::Off => "off",
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, OnOff::On)
    }

    pub fn matches(&self, observed: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(observed.trim())
    }

    pub fn from_observed(observed: &str) -> Option<Self> {
        match observed.trim().to_ascii_lowercase().as_str() {
            "on" => Some(OnOff::On),
            "off" => Some(OnOff::Off),
            _ => None,
        }
    }
}

/// Lenient deserializers for Ansible-style argument values
pub mod de {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    fn parse_bool(raw: &str) -> Option<bool> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" | "y" | "t" => Some(true),
            "false" | "no" | "off" | "0" | "n" | "f" | "" => Some(false),
            _ => None,
        }
    }

    fn loose_to_bool<E: serde::de::Error>(value: Loose) -> Result<bool, E> {
        match value {
            Loose::Bool(b) => Ok(b),
            Loose::Int(0) => Ok(false),
            Loose::Int(1) => Ok(true),
            Loose::Int(other) => Err(E::custom(format!("{} is not a valid boolean", other))),
            Loose::Str(s) => {
                parse_bool(&s).ok_or_else(|| E::custom(format!("'{}' is not a valid boolean", s)))
            }
        }
    }

    fn loose_to_u32<E: serde::de::Error>(value: Loose) -> Result<u32, E> {
        match value {
            Loose::Int(i) => u32::try_from(i).map_err(|_| E::custom(format!("{} is out of range", i))),
            Loose::Str(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| E::custom(format!("'{}' is not a valid integer", s))),
            Loose::Bool(b) => Err(E::custom(format!("{} is not a valid integer", b))),
        }
    }

    /// `bool` accepting `true`, `"yes"`, `"True"`, `1`, ...
    pub fn bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let value = Option::<Loose>::deserialize(deserializer)?;
        match value {
            Some(v) => loose_to_bool(v),
            None => Ok(false),
        }
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        Option::<Loose>::deserialize(deserializer)?
            .map(loose_to_bool)
            .transpose()
    }

    /// `u32` accepting numbers or numeric strings
    pub fn u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        loose_to_u32(Loose::deserialize(deserializer)?)
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        Option::<Loose>::deserialize(deserializer)?
            .map(loose_to_u32)
            .transpose()
    }

    /// String that may have been written as a bare number (`iogrp: 0`)
    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<Loose>::deserialize(deserializer)?.map(|v| match v {
            Loose::Str(s) => s,
            Loose::Int(i) => i.to_string(),
            Loose::Bool(b) => b.to_string(),
        }))
    }

    /// List given either as an array or as a comma separated string
    pub fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ListOrString {
            List(Vec<String>),
            Str(String),
        }

        let items = match Option::<ListOrString>::deserialize(deserializer)? {
            Some(ListOrString::List(items)) => items,
            Some(ListOrString::Str(s)) => s.split(',').map(|p| p.to_string()).collect(),
            None => Vec::new(),
        };
        Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

/// Deserialize module parameters, rejecting unknown keys with the familiar
/// Ansible wording
pub fn parse<T: DeserializeOwned>(module: &str, params: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(params)).map_err(|err| {
        let text = err.to_string();
        if let Some(rest) = text.strip_prefix("unknown field ") {
            let field = rest.split(',').next().unwrap_or(rest).trim_matches('`');
            return invalid(format!("Unsupported parameters for ({}) module: {}", module, field));
        }
        if let Some(rest) = text.strip_prefix("missing field ") {
            return invalid(format!("missing required arguments: {}", rest.trim_matches('`')));
        }
        invalid(format!("Invalid arguments for ({}) module: {}", module, text))
    })
}

/// Names of the parameters the caller actually supplied: present values and
/// flags set to `true`. Works off the serialized form of the typed params.
pub fn supplied<T: Serialize>(params: &T) -> Result<BTreeSet<String>> {
    let value = serde_json::to_value(params).context("Failed to inspect parameters")?;
    let Value::Object(map) = value else {
        return Ok(BTreeSet::new());
    };
    Ok(map
        .into_iter()
        .filter(|(_, v)| !matches!(v, Value::Null | Value::Bool(false)))
        .filter(|(_, v)| !matches!(v, Value::Array(items) if items.is_empty()))
        .map(|(k, _)| k)
        .collect())
}

/// Fail if both members of any pair were supplied
pub fn mutually_exclusive(supplied: &BTreeSet<String>, pairs: &[(&str, &str)]) -> Result<()> {
    for (a, b) in pairs {
        if supplied.contains(*a) && supplied.contains(*b) {
            return Err(invalid(format!("parameters are mutually exclusive: {}|{}", a, b)));
        }
    }
    Ok(())
}

/// Fail if a parameter was supplied without the parameters it depends on
pub fn required_by(supplied: &BTreeSet<String>, rules: &[(&str, &[&str])]) -> Result<()> {
    for (param, requirements) in rules {
        if !supplied.contains(*param) {
            continue;
        }
        let missing: Vec<&str> = requirements
            .iter()
            .copied()
            .filter(|r| !supplied.contains(*r))
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!(
                "missing parameter(s) required by '{}': {}",
                param,
                missing.join(", ")
            )));
        }
    }
    Ok(())
}

/// Fail unless at least one parameter of each group was supplied
pub fn required_one_of(supplied: &BTreeSet<String>, groups: &[&[&str]]) -> Result<()> {
    for group in groups {
        if !group.iter().any(|p| supplied.contains(*p)) {
            return Err(invalid(format!(
                "one of the following is required: {}",
                group.join(", ")
            )));
        }
    }
    Ok(())
}

/// Fail if anything outside `allowed` was supplied. `action` completes the
/// sentence, e.g. "while deleting syslog server".
pub fn only_allowed(supplied: &BTreeSet<String>, allowed: &[&str], action: &str) -> Result<()> {
    let extra: Vec<&str> = supplied
        .iter()
        .map(|s| s.as_str())
        .filter(|s| !allowed.contains(s))
        .collect();
    if extra.is_empty() {
        Ok(())
    } else {
        Err(invalid(format!(
            "Parameter(s) [{}] not supported {}.",
            extra.join(", "),
            action
        )))
    }
}

/// Fail on an empty or whitespace-only required string
pub fn require_non_blank(param: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(format!("Missing mandatory parameter: {}", param)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, Serialize)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        name: String,
        #[serde(default, deserialize_with = "de::bool")]
        force: bool,
        #[serde(default, deserialize_with = "de::opt_u32")]
        port: Option<u32>,
        #[serde(default, deserialize_with = "de::string_list")]
        subsets: Vec<String>,
        #[serde(default)]
        protocol: Option<String>,
    }

    fn sample(value: Value) -> Result<Sample> {
        let Value::Object(map) = value else { unreachable!() };
        parse("sample", map)
    }

    #[test]
    fn test_lenient_values() {
        let s = sample(json!({"name": "a", "force": "True", "port": "1010", "subsets": "host, vol"})).unwrap();
        assert!(s.force);
        assert_eq!(s.port, Some(1010));
        assert_eq!(s.subsets, vec!["host", "vol"]);

        let s = sample(json!({"name": "a", "force": "no", "port": 514})).unwrap();
        assert!(!s.force);
        assert_eq!(s.port, Some(514));
        assert!(s.subsets.is_empty());
    }

    #[test]
    fn test_unknown_parameter_is_reported() {
        let err = sample(json!({"name": "a", "colour": "red"})).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported parameters for (sample) module: colour");
    }

    #[test]
    fn test_missing_required_parameter_is_reported() {
        let err = sample(json!({"force": true})).unwrap_err();
        assert_eq!(err.to_string(), "missing required arguments: name");
    }

    #[test]
    fn test_bad_boolean_is_rejected() {
        assert!(sample(json!({"name": "a", "force": "perhaps"})).is_err());
    }

    #[test]
    fn test_supplied_skips_unset_values() {
        let s = sample(json!({"name": "a", "force": false, "port": 1})).unwrap();
        let set = supplied(&s).unwrap();
        assert!(set.contains("name"));
        assert!(set.contains("port"));
        assert!(!set.contains("force"));
        assert!(!set.contains("subsets"));
        assert!(!set.contains("protocol"));
    }

    #[test]
    fn test_rule_helpers() {
        let s = sample(json!({"name": "a", "force": true, "port": 1})).unwrap();
        let set = supplied(&s).unwrap();

        let err = mutually_exclusive(&set, &[("force", "port")]).unwrap_err();
        assert_eq!(err.to_string(), "parameters are mutually exclusive: force|port");

        let err = required_by(&set, &[("port", &["protocol"])]).unwrap_err();
        assert_eq!(err.to_string(), "missing parameter(s) required by 'port': protocol");

        assert!(required_one_of(&set, &[&["port", "protocol"]]).is_ok());
        assert!(required_one_of(&set, &[&["protocol"]]).is_err());

        let err = only_allowed(&set, &["name"], "while deleting").unwrap_err();
        assert_eq!(err.to_string(), "Parameter(s) [force, port] not supported while deleting.");
    }

    #[test]
    fn test_yes_no_and_on_off_matching() {
        assert!(YesNo::Yes.matches("YES"));
        assert!(!YesNo::No.matches("yes"));
        assert!(OnOff::Off.matches(" off"));
        assert_eq!(OnOff::from_observed("on"), Some(OnOff::On));
        assert_eq!(OnOff::from_observed(""), None);
    }

    #[test]
    fn test_blank_names_rejected() {
        assert!(require_non_blank("name", "  ").is_err());
        assert!(require_non_blank("name", "x").is_ok());
    }
}
