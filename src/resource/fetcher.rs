//! Subset Fetcher
//!
//! Fetches the records behind one gather subset according to its detail mode.

use super::registry::{DetailMode, SubsetDef, ALL};
use crate::svc::{attr, records, Command, SvcApi};
use anyhow::{Context, Result};
use serde_json::Value;

/// Command addressing a single object of the subset
fn object_command(def: &SubsetDef, object: &str) -> Command {
    let cmd = Command::new(&def.command);
    match &def.object_option {
        Some(option) => cmd.opt(option, object),
        None => cmd.arg(object),
    }
}

/// Run a listing command and flatten the answer into records
async fn list<A: SvcApi>(api: &A, cmd: &Command) -> Result<Vec<Value>> {
    let response = api.obj_info(cmd).await?;
    Ok(records(response).into_iter().map(Value::Object).collect())
}

/// Fetch the records of one subset.
///
/// - no `objectname`, or a subset without detail views: the plain listing
/// - `objectname=all`: the concise listing, expanded per id for `per_id` subsets
/// - any other `objectname`: the detailed view of that object
pub async fn fetch_subset<A: SvcApi>(api: &A, def: &SubsetDef, objectname: Option<&str>) -> Result<Vec<Value>> {
    let listing = Command::new(&def.command);

    let items = match (objectname, def.detail) {
        (None, _) | (_, DetailMode::Plain) => list(api, &listing).await?,
        (Some(ALL), DetailMode::Concise) => list(api, &listing).await?,
        (Some(ALL), DetailMode::PerId) => {
            let concise = records(api.obj_info(&listing).await?);
            let mut detailed = Vec::with_capacity(concise.len());
            for record in &concise {
                let id = attr(record, &def.id_field);
                if id.is_empty() {
                    tracing::warn!("{} record without {}", def.command, def.id_field);
                    continue;
                }
                detailed.extend(list(api, &object_command(def, id)).await?);
            }
            detailed
        }
        (Some(object), _) => list(api, &object_command(def, object)).await?,
    };

    tracing::debug!("{}: {} record(s)", def.key, items.len());
    Ok(items)
}

/// Fetch several subsets in order, keyed by their result keys
pub async fn fetch_subsets<A: SvcApi>(
    api: &A,
    defs: &[&SubsetDef],
    objectname: Option<&str>,
) -> Result<serde_json::Map<String, Value>> {
    let mut out = serde_json::Map::new();
    for def in defs {
        let items = fetch_subset(api, def, objectname)
            .await
            .with_context(|| format!("Failed to gather [{}]", def.key))?;
        out.insert(def.result_key.clone(), Value::Array(items));
    }
    Ok(out)
}
