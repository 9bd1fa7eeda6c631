//! Read-only gather over the appliance listings
//!
//! Each requested subset runs the listing command behind it and is reported
//! under its result key, in the order requested.

use super::params::{self, de};
use super::result::ModuleResult;
use crate::resource::{fetch_subsets, resolve_subsets, SubsetDef, ALL};
use crate::svc::SvcApi;
use anyhow::Result;
use serde::{Deserialize, Serialize};

fn default_subsets() -> Vec<String> {
    vec![ALL.to_string()]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InfoParams {
    #[serde(default = "default_subsets", deserialize_with = "de::string_list")]
    pub gather_subset: Vec<String>,
    #[serde(default)]
    pub objectname: Option<String>,
}

impl InfoParams {
    pub fn validate(&self) -> Result<()> {
        if let Some(object) = &self.objectname {
            params::require_non_blank("objectname", object)?;
        }
        self.subsets().map(|_| ())
    }

    /// Requested subsets in request order; an empty list means `all`
    pub fn subsets(&self) -> Result<Vec<&'static SubsetDef>> {
        if self.gather_subset.is_empty() {
            return resolve_subsets(&default_subsets());
        }
        resolve_subsets(&self.gather_subset)
    }
}

pub async fn apply<A: SvcApi>(params: &InfoParams, api: &A) -> Result<ModuleResult> {
    let subsets = params.subsets()?;
    tracing::debug!(
        "Gathering {} subset(s), objectname={:?}",
        subsets.len(),
        params.objectname
    );

    let facts = fetch_subsets(api, &subsets, params.objectname.as_deref().map(str::trim)).await?;
    Ok(ModuleResult::facts(facts))
}
