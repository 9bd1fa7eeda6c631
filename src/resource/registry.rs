//! Gather-subset registry - load the info dispatch table from JSON
//!
//! Every subset the info module can report is defined in an embedded JSON
//! file: the list command behind it, the key it is reported under and how a
//! detailed view is obtained.

use crate::modules::result::invalid;
use anyhow::Result;
use serde::Deserialize;
use std::sync::OnceLock;

/// Embedded dispatch table (compiled into the binary)
const SUBSET_FILE: &str = include_str!("../resources/gather_subsets.json");

/// Pseudo subset selecting every entry of the table
pub const ALL: &str = "all";

/// How detailed views of a listing are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetailMode {
    /// Concise list, then one detailed lookup per id when `objectname=all`
    #[default]
    PerId,
    /// The concise list is all there is
    Concise,
    /// Singleton or unaddressable listing; `objectname` is ignored
    #[serde(rename = "none")]
    Plain,
}

/// Subset definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct SubsetDef {
    pub key: String,
    pub result_key: String,
    pub command: String,
    #[serde(default)]
    pub detail: DetailMode,
    /// Record attribute holding the object id
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Option that addresses a single object, when it is not the positional argument
    #[serde(default)]
    pub object_option: Option<String>,
}

fn default_id_field() -> String {
    "id".to_string()
}

/// Root structure of resources/gather_subsets.json
#[derive(Debug, Clone, Deserialize)]
pub struct SubsetConfig {
    pub subsets: Vec<SubsetDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<SubsetConfig> = OnceLock::new();

/// Get the subset registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static SubsetConfig {
    REGISTRY.get_or_init(|| {
        serde_json::from_str(SUBSET_FILE)
            .unwrap_or_else(|e| panic!("Failed to parse embedded gather subset JSON: {}", e))
    })
}

/// Get a subset definition by key
pub fn get_subset(key: &str) -> Option<&'static SubsetDef> {
    get_registry().subsets.iter().find(|s| s.key == key)
}

/// All subset keys, in table order
pub fn get_all_subset_keys() -> Vec<&'static str> {
    get_registry().subsets.iter().map(|s| s.key.as_str()).collect()
}

/// Resolve requested subset keys in request order. `all` expands to the
/// whole table; repeats are dropped.
pub fn resolve_subsets(requested: &[String]) -> Result<Vec<&'static SubsetDef>> {
    let mut resolved: Vec<&'static SubsetDef> = Vec::new();

    for key in requested {
        let key = key.trim();
        let defs: Vec<&'static SubsetDef> = if key == ALL {
            get_registry().subsets.iter().collect()
        } else {
            match get_subset(key) {
                Some(def) => vec![def],
                None => {
                    return Err(invalid(format!(
                        "value of gather_subset must be one or more of: {}, {}. Got: {}",
                        ALL,
                        get_all_subset_keys().join(", "),
                        key
                    )))
                }
            }
        };

        for def in defs {
            if !resolved.iter().any(|r| r.key == def.key) {
                resolved.push(def);
            }
        }
    }

    Ok(resolved)
}
