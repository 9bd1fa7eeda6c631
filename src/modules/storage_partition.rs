//! Storage partition management

use super::params::{self, de, State};
use super::reconcile::{reconcile, ChangeSet, Resource};
use super::result::{invalid, ModuleResult};
use crate::svc::{created_id, fetch_record, Command, SvcApi};
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionParams {
    pub name: String,
    pub state: State,
    #[serde(default)]
    pub replicationpolicy: Option<String>,
    #[serde(default, deserialize_with = "de::bool")]
    pub noreplicationpolicy: bool,
    #[serde(default)]
    pub preferredmanagementsystem: Option<String>,
    #[serde(default, deserialize_with = "de::bool")]
    pub deletenonpreferredmanagementobjects: bool,
    #[serde(default, deserialize_with = "de::bool")]
    pub deletepreferredmanagementobjects: bool,
}

const DELETE_ONLY: &[&str] = &[
    "deletenonpreferredmanagementobjects",
    "deletepreferredmanagementobjects",
];

impl PartitionParams {
    pub fn validate(&self) -> Result<()> {
        params::require_non_blank("name", &self.name)?;

        let supplied = params::supplied(self)?;
        params::mutually_exclusive(
            &supplied,
            &[
                ("replicationpolicy", "noreplicationpolicy"),
                (
                    "deletenonpreferredmanagementobjects",
                    "deletepreferredmanagementobjects",
                ),
            ],
        )?;

        match self.state {
            State::Present => {
                let misplaced: Vec<&str> = DELETE_ONLY
                    .iter()
                    .copied()
                    .filter(|p| supplied.contains(*p))
                    .collect();
                if !misplaced.is_empty() {
                    return Err(invalid(format!(
                        "Parameter(s) [{}] not supported while creating or updating storage partition.",
                        misplaced.join(", ")
                    )));
                }
            }
            State::Absent => {
                let mut allowed = vec!["name", "state"];
                allowed.extend_from_slice(DELETE_ONLY);
                params::only_allowed(&supplied, &allowed, "while deleting storage partition")?;
            }
        }
        Ok(())
    }
}

/// `lspartition <name>` view
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservedPartition {
    pub id: String,
    pub name: String,
    pub preferred_management_system_name: String,
    pub replication_policy_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionChanges {
    pub preferredmanagementsystem: Option<String>,
    pub replicationpolicy: Option<String>,
    pub noreplicationpolicy: bool,
}

impl ChangeSet for PartitionChanges {
    fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.preferredmanagementsystem.is_some() {
            fields.push("preferredmanagementsystem");
        }
        if self.replicationpolicy.is_some() {
            fields.push("replicationpolicy");
        }
        if self.noreplicationpolicy {
            fields.push("noreplicationpolicy");
        }
        fields
    }
}

impl Resource for PartitionParams {
    type Observed = ObservedPartition;
    type Changes = PartitionChanges;

    fn kind(&self) -> &'static str {
        "Storage partition"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> State {
        self.state
    }

    async fn fetch<A: SvcApi>(&self, api: &A) -> Result<Option<ObservedPartition>> {
        fetch_record(api, &Command::new("lspartition").arg(&self.name)).await
    }

    fn diff(&self, observed: &ObservedPartition) -> Result<PartitionChanges> {
        let mut changes = PartitionChanges::default();

        if let Some(system) = &self.preferredmanagementsystem {
            if *system != observed.preferred_management_system_name {
                changes.preferredmanagementsystem = Some(system.clone());
            }
        }
        if let Some(policy) = &self.replicationpolicy {
            if *policy != observed.replication_policy_name {
                changes.replicationpolicy = Some(policy.clone());
            }
        }
        if self.noreplicationpolicy && !observed.replication_policy_name.is_empty() {
            changes.noreplicationpolicy = true;
        }

        Ok(changes)
    }

    async fn create<A: SvcApi>(&self, api: &A) -> Result<Option<String>> {
        let response = api
            .run(&Command::new("mkpartition").opt("name", self.name.as_str()))
            .await?;

        // Attributes mkpartition cannot set are applied right after
        let created = ObservedPartition {
            name: self.name.clone(),
            ..ObservedPartition::default()
        };
        let changes = self.diff(&created)?;
        if !changes.is_empty() {
            self.update(api, &created, &changes).await?;
        }

        Ok(created_id(&response))
    }

    async fn update<A: SvcApi>(
        &self,
        api: &A,
        _observed: &ObservedPartition,
        changes: &PartitionChanges,
    ) -> Result<()> {
        let chpartition = || Command::new("chpartition");

        if let Some(system) = &changes.preferredmanagementsystem {
            api.run(
                &chpartition()
                    .opt("preferredmanagementsystem", system.as_str())
                    .arg(&self.name),
            )
            .await?;
        }
        if let Some(policy) = &changes.replicationpolicy {
            api.run(&chpartition().opt("replicationpolicy", policy.as_str()).arg(&self.name))
                .await?;
        }
        if changes.noreplicationpolicy {
            api.run(&chpartition().flag("noreplicationpolicy").arg(&self.name))
                .await?;
        }
        Ok(())
    }

    async fn delete<A: SvcApi>(&self, api: &A, _observed: &ObservedPartition) -> Result<()> {
        let cmd = Command::new("rmpartition")
            .flag_if(
                "deletenonpreferredmanagementobjects",
                self.deletenonpreferredmanagementobjects,
            )
            .flag_if(
                "deletepreferredmanagementobjects",
                self.deletepreferredmanagementobjects,
            )
            .arg(&self.name);
        api.run(&cmd).await?;
        Ok(())
    }
}

pub async fn apply<A: SvcApi>(params: &PartitionParams, api: &A) -> Result<ModuleResult> {
    reconcile(params, api).await
}
