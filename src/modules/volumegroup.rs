//! Volume group management
//!
//! Plain volume groups are reconciled attribute by attribute. Clone and
//! thinclone groups additionally carry provenance (the snapshot they were
//! populated from). Provenance is fixed at creation: on re-apply it is
//! compared through the resolved source-volume and pool sets, never through
//! snapshot names, and a mismatch is an error rather than a modification.

use super::params::{self, de, State, YesNo};
use super::reconcile::{reconcile, reconcile_observed, ChangeSet, Resource};
use super::result::{conflict, invalid, ModuleResult};
use crate::svc::{attr, created_id, fetch_record, first_record, records, Command, SvcApi};
use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Retention of the snapshot taken when a clone is built from bare volumes
const TRANSIENT_SNAPSHOT_RETENTION_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneKind {
    Clone,
    Thinclone,
}

impl CloneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloneKind::Clone => "clone",
            CloneKind::Thinclone => "thinclone",
        }
    }
}

impl fmt::Display for CloneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeGroupParams {
    pub name: String,
    pub state: State,
    #[serde(default)]
    pub old_name: Option<String>,
    #[serde(default)]
    pub ownershipgroup: Option<String>,
    #[serde(default, deserialize_with = "de::bool")]
    pub noownershipgroup: bool,
    #[serde(default)]
    pub safeguardpolicyname: Option<String>,
    #[serde(default, deserialize_with = "de::bool")]
    pub nosafeguardpolicy: bool,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub policystarttime: Option<String>,
    #[serde(default)]
    pub snapshotpolicy: Option<String>,
    #[serde(default, deserialize_with = "de::bool")]
    pub nosnapshotpolicy: bool,
    #[serde(default)]
    pub snapshotpolicysuspended: Option<YesNo>,
    #[serde(default, deserialize_with = "de::bool")]
    pub safeguarded: bool,
    #[serde(default)]
    pub ignoreuserfcmaps: Option<YesNo>,
    #[serde(default)]
    pub replicationpolicy: Option<String>,
    #[serde(default, deserialize_with = "de::bool")]
    pub noreplicationpolicy: bool,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default, deserialize_with = "de::bool")]
    pub nopartition: bool,
    #[serde(default, rename = "type")]
    pub vg_type: Option<CloneKind>,
    #[serde(default)]
    pub snapshot: Option<String>,
    #[serde(default)]
    pub fromsourcegroup: Option<String>,
    #[serde(default)]
    pub fromsourcevolumes: Option<String>,
    #[serde(default)]
    pub pool: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub iogrp: Option<String>,
    #[serde(default, deserialize_with = "de::bool")]
    pub evictvolumes: bool,
}

/// Parameters that describe where a clone comes from, in reporting order.
/// `iogrp` is a placement hint and never compared.
const PROVENANCE_PARAMS: &[&str] = &["type", "snapshot", "fromsourcegroup", "fromsourcevolumes", "pool"];

impl VolumeGroupParams {
    pub fn validate(&self) -> Result<()> {
        params::require_non_blank("name", &self.name)?;

        let supplied = params::supplied(self)?;
        params::mutually_exclusive(
            &supplied,
            &[
                ("ownershipgroup", "noownershipgroup"),
                ("safeguardpolicyname", "nosafeguardpolicy"),
                ("snapshotpolicy", "nosnapshotpolicy"),
                ("replicationpolicy", "noreplicationpolicy"),
                ("partition", "nopartition"),
                ("ownershipgroup", "safeguardpolicyname"),
                ("snapshotpolicy", "safeguardpolicyname"),
                ("snapshot", "fromsourcevolumes"),
                ("fromsourcegroup", "fromsourcevolumes"),
            ],
        )?;

        if self.state == State::Absent {
            return params::only_allowed(
                &supplied,
                &["name", "state", "evictvolumes"],
                "while deleting volumegroup",
            );
        }

        if self.evictvolumes {
            return Err(invalid(
                "Parameter(s) [evictvolumes] not supported while creating or updating volumegroup.",
            ));
        }
        if let Some(old_name) = &self.old_name {
            params::require_non_blank("old_name", old_name)?;
        }

        params::required_by(
            &supplied,
            &[
                ("policystarttime", &["safeguardpolicyname"]),
                ("safeguarded", &["snapshotpolicy"]),
                ("fromsourcegroup", &["snapshot"]),
            ],
        )?;
        if supplied.contains("type") {
            params::required_one_of(&supplied, &[&["snapshot", "fromsourcevolumes"]])?;
        }

        if let Some(start) = &self.policystarttime {
            NaiveDateTime::parse_from_str(start, "%y%m%d%H%M").map_err(|_| {
                invalid(format!("Invalid policystarttime [{}]: expected YYMMDDHHMM.", start))
            })?;
        }
        if self.fromsourcevolumes.is_some() && self.source_volumes().is_empty() {
            return Err(invalid("Parameter [fromsourcevolumes] must name at least one volume."));
        }
        Ok(())
    }

    /// `fromsourcevolumes` split on `:` or `,`
    pub fn source_volumes(&self) -> BTreeSet<String> {
        self.fromsourcevolumes
            .as_deref()
            .unwrap_or("")
            .split([':', ','])
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn supplied_provenance(&self) -> Result<Vec<&'static str>> {
        let supplied = params::supplied(self)?;
        Ok(PROVENANCE_PARAMS
            .iter()
            .copied()
            .filter(|p| supplied.contains(*p))
            .collect())
    }

    /// Reject provenance parameters that an existing group cannot honour
    fn check_provenance(&self, observed: &ObservedVolumeGroup) -> Result<()> {
        let requested = self.supplied_provenance()?;
        if requested.is_empty() {
            return Ok(());
        }

        let Some(provenance) = &observed.provenance else {
            return Err(not_modifiable(requested[0]));
        };

        if self.fromsourcevolumes.is_some() && self.source_volumes() != provenance.source_volumes {
            return Err(not_modifiable("fromsourcevolumes"));
        }
        if let Some(pool) = &self.pool {
            if provenance.pools != BTreeSet::from([pool.clone()]) {
                return Err(not_modifiable("pool"));
            }
        }
        let Some(kind) = self.vg_type else {
            return Err(conflict(format!(
                "Existing {} volumegroup found.",
                provenance.kind
            )));
        };
        if kind != provenance.kind {
            return Err(not_modifiable("type"));
        }
        if let Some(snapshot) = &self.snapshot {
            if *snapshot != observed.source_snapshot {
                return Err(not_modifiable("snapshot"));
            }
        }
        if let Some(group) = &self.fromsourcegroup {
            if *group != observed.source_volume_group_name {
                return Err(not_modifiable("fromsourcegroup"));
            }
        }
        Ok(())
    }

    fn diff_attributes(&self, observed: &ObservedVolumeGroup) -> VolumeGroupChanges {
        fn differs(desired: &Option<String>, current: &str) -> Option<String> {
            desired.as_ref().filter(|d| d.as_str() != current).cloned()
        }
        let mut changes = VolumeGroupChanges::default();

        changes.ownershipgroup = differs(&self.ownershipgroup, &observed.owner_name);
        changes.noownershipgroup = self.noownershipgroup && !observed.owner_name.is_empty();

        changes.safeguardedpolicy = differs(&self.safeguardpolicyname, &observed.safeguarded_policy_name);
        if changes.safeguardedpolicy.is_some() {
            changes.policystarttime = self.policystarttime.clone();
        }
        changes.nosafeguardedpolicy = self.nosafeguardpolicy && !observed.safeguarded_policy_name.is_empty();

        if let Some(policy) = &self.snapshotpolicy {
            let safeguarding_missing = self.safeguarded && !YesNo::Yes.matches(&observed.snapshot_policy_safeguarded);
            if *policy != observed.snapshot_policy_name || safeguarding_missing {
                changes.snapshotpolicy = Some(policy.clone());
                changes.safeguarded = self.safeguarded;
            }
        }
        if let Some(ignore) = self.ignoreuserfcmaps {
            if !ignore.matches(&observed.ignore_user_flash_copy_maps) {
                changes.ignoreuserfcmaps = Some(ignore);
            }
        }
        changes.nosnapshotpolicy = self.nosnapshotpolicy && !observed.snapshot_policy_name.is_empty();

        if let Some(suspended) = self.snapshotpolicysuspended {
            if !suspended.matches(&observed.snapshot_policy_suspended) {
                changes.snapshotpolicysuspended = Some(suspended);
            }
        }

        changes.replicationpolicy = differs(&self.replicationpolicy, &observed.replication_policy_name);
        changes.noreplicationpolicy = self.noreplicationpolicy && !observed.replication_policy_name.is_empty();

        changes.partition = differs(&self.partition, &observed.partition_name);
        changes.nopartition = self.nopartition && !observed.partition_name.is_empty();

        changes
    }

    /// Snapshot the source volumes so a clone can be populated from them
    async fn create_transient_snapshot<A: SvcApi>(&self, api: &A) -> Result<String> {
        let name = transient_snapshot_name();
        let volumes: Vec<String> = self.source_volumes().into_iter().collect();
        let cmd = Command::new("addsnapshot")
            .opt("name", name.as_str())
            .opt("volumes", volumes.join(":"))
            .opt("retentionminutes", TRANSIENT_SNAPSHOT_RETENTION_MINUTES);
        api.run(&cmd).await?;
        tracing::info!("Transient snapshot [{}] created for [{}]", name, self.name);
        Ok(name)
    }

    /// Clone creation with the provenance options resolved
    async fn create_clone<A: SvcApi>(&self, api: &A, kind: CloneKind) -> Result<serde_json::Value> {
        let mut cmd = Command::new("mkvolumegroup")
            .opt("name", self.name.as_str())
            .opt("type", kind.as_str());

        cmd = match (&self.snapshot, &self.fromsourcegroup) {
            (Some(snapshot), Some(group)) => cmd
                .opt("snapshot", snapshot.as_str())
                .opt("fromsourcegroup", group.as_str()),
            (Some(snapshot), None) => {
                let uid = parent_uid(api, snapshot).await?;
                cmd.opt("snapshot", snapshot.as_str()).opt("fromsourceuid", uid)
            }
            (None, _) => {
                let snapshot = self.create_transient_snapshot(api).await?;
                let uid = parent_uid(api, &snapshot).await?;
                cmd.opt("snapshot", snapshot).opt("fromsourceuid", uid)
            }
        };

        let cmd = cmd
            .opt_if("pool", self.pool.as_deref())
            .opt_if("iogrp", self.iogrp.as_deref());
        api.run(&cmd).await
    }
}

fn not_modifiable(param: &str) -> anyhow::Error {
    conflict(format!("Parameter [{}] is invalid for modifying volumegroup.", param))
}

fn transient_snapshot_name() -> String {
    let digits = uuid::Uuid::new_v4().as_u128() % 10_000_000_000;
    format!("snapshot_{:010}", digits)
}

/// Uid of the volume group a snapshot was taken from
async fn parent_uid<A: SvcApi>(api: &A, snapshot: &str) -> Result<String> {
    let cmd = Command::new("lsvolumegroupsnapshot").filter("name", snapshot);
    let record = first_record(api.obj_info(&cmd).await?)
        .ok_or_else(|| conflict(format!("Snapshot [{}] does not exist.", snapshot)))?;
    let uid = attr(&record, "parent_uid");
    if uid.is_empty() {
        return Err(conflict(format!(
            "Snapshot [{}] does not report a parent volumegroup.",
            snapshot
        )));
    }
    Ok(uid.to_string())
}

/// Where a clone or thinclone group came from
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub kind: CloneKind,
    pub source_volumes: BTreeSet<String>,
    pub pools: BTreeSet<String>,
}

/// `lsvolumegroup <name>` view
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservedVolumeGroup {
    pub id: String,
    pub name: String,
    pub owner_name: String,
    pub safeguarded_policy_name: String,
    pub snapshot_policy_name: String,
    pub snapshot_policy_suspended: String,
    pub snapshot_policy_safeguarded: String,
    pub ignore_user_flash_copy_maps: String,
    pub replication_policy_name: String,
    pub partition_name: String,
    pub volume_group_type: String,
    pub source_snapshot: String,
    pub source_volume_group_name: String,
    pub parent_uid: String,
    #[serde(skip)]
    pub provenance: Option<Provenance>,
}

impl ObservedVolumeGroup {
    pub fn clone_kind(&self) -> Option<CloneKind> {
        match self.volume_group_type.trim().to_ascii_lowercase().as_str() {
            "thinclone" => Some(CloneKind::Thinclone),
            "clone" => Some(CloneKind::Clone),
            _ if !self.source_snapshot.is_empty() => Some(CloneKind::Clone),
            _ => None,
        }
    }
}

async fn fetch_group<A: SvcApi>(api: &A, name: &str) -> Result<Option<ObservedVolumeGroup>> {
    let Some(mut group) = fetch_record::<_, ObservedVolumeGroup>(api, &Command::new("lsvolumegroup").arg(name)).await?
    else {
        return Ok(None);
    };
    if let Some(kind) = group.clone_kind() {
        group.provenance = Some(load_provenance(api, &group, kind).await?);
    }
    Ok(Some(group))
}

async fn load_provenance<A: SvcApi>(
    api: &A,
    group: &ObservedVolumeGroup,
    kind: CloneKind,
) -> Result<Provenance> {
    let column = |value: Option<serde_json::Value>, key: &str| -> BTreeSet<String> {
        records(value)
            .iter()
            .map(|r| attr(r, key).to_string())
            .filter(|v| !v.is_empty())
            .collect()
    };

    let population = api
        .obj_info(&Command::new("lsvolumepopulation").filter("volume_group_name", &group.name))
        .await?;
    let mut source_volumes = column(population, "source_volume_name");

    if source_volumes.is_empty() && !group.source_snapshot.is_empty() {
        let snapshot = api
            .obj_info(&Command::new("lsvolumesnapshot").filter("snapshot_name", &group.source_snapshot))
            .await?;
        source_volumes = column(snapshot, "volume_name");
    }

    let vdisks = api
        .obj_info(&Command::new("lsvdisk").filter("volume_group_name", &group.name))
        .await?;
    let pools = column(vdisks, "mdisk_grp_name");

    tracing::debug!(
        "Volumegroup [{}] is a {} of {:?} in pools {:?}",
        group.name,
        kind,
        source_volumes,
        pools
    );

    Ok(Provenance {
        kind,
        source_volumes,
        pools,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeGroupChanges {
    pub ownershipgroup: Option<String>,
    pub noownershipgroup: bool,
    pub safeguardedpolicy: Option<String>,
    pub policystarttime: Option<String>,
    pub nosafeguardedpolicy: bool,
    pub snapshotpolicy: Option<String>,
    pub safeguarded: bool,
    pub ignoreuserfcmaps: Option<YesNo>,
    pub nosnapshotpolicy: bool,
    pub snapshotpolicysuspended: Option<YesNo>,
    pub replicationpolicy: Option<String>,
    pub noreplicationpolicy: bool,
    pub partition: Option<String>,
    pub nopartition: bool,
}

impl ChangeSet for VolumeGroupChanges {
    fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    fn fields(&self) -> Vec<&'static str> {
        [
            ("ownershipgroup", self.ownershipgroup.is_some()),
            ("noownershipgroup", self.noownershipgroup),
            ("safeguardedpolicy", self.safeguardedpolicy.is_some()),
            ("policystarttime", self.policystarttime.is_some()),
            ("nosafeguardedpolicy", self.nosafeguardedpolicy),
            ("snapshotpolicy", self.snapshotpolicy.is_some()),
            ("safeguarded", self.safeguarded),
            ("ignoreuserfcmaps", self.ignoreuserfcmaps.is_some()),
            ("nosnapshotpolicy", self.nosnapshotpolicy),
            ("snapshotpolicysuspended", self.snapshotpolicysuspended.is_some()),
            ("replicationpolicy", self.replicationpolicy.is_some()),
            ("noreplicationpolicy", self.noreplicationpolicy),
            ("partition", self.partition.is_some()),
            ("nopartition", self.nopartition),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }
}

impl VolumeGroupChanges {
    /// One `chvolumegroup` per attribute family
    pub fn commands(&self, group: &str) -> Vec<Command> {
        let ch = || Command::new("chvolumegroup");
        let mut commands = Vec::new();

        if let Some(owner) = &self.ownershipgroup {
            commands.push(ch().opt("ownershipgroup", owner.as_str()));
        } else if self.noownershipgroup {
            commands.push(ch().flag("noownershipgroup"));
        }

        if let Some(policy) = &self.safeguardedpolicy {
            commands.push(
                ch().opt("safeguardedpolicy", policy.as_str())
                    .opt_if("policystarttime", self.policystarttime.as_deref()),
            );
        } else if self.nosafeguardedpolicy {
            commands.push(ch().flag("nosafeguardedpolicy"));
        }

        let ignore = self.ignoreuserfcmaps.map(|v| v.as_str());
        if let Some(policy) = &self.snapshotpolicy {
            commands.push(
                ch().opt("snapshotpolicy", policy.as_str())
                    .flag_if("safeguarded", self.safeguarded)
                    .opt_if("ignoreuserfcmaps", ignore),
            );
        } else {
            if self.nosnapshotpolicy {
                commands.push(ch().flag("nosnapshotpolicy"));
            }
            if ignore.is_some() {
                commands.push(ch().opt_if("ignoreuserfcmaps", ignore));
            }
        }

        if let Some(suspended) = self.snapshotpolicysuspended {
            commands.push(ch().opt("snapshotpolicysuspended", suspended.as_str()));
        }

        if let Some(policy) = &self.replicationpolicy {
            commands.push(ch().opt("replicationpolicy", policy.as_str()));
        } else if self.noreplicationpolicy {
            commands.push(ch().flag("noreplicationpolicy"));
        }

        if let Some(partition) = &self.partition {
            commands.push(ch().opt("partition", partition.as_str()));
        } else if self.nopartition {
            commands.push(ch().flag("nopartition"));
        }

        commands.into_iter().map(|cmd| cmd.arg(group)).collect()
    }

    /// Options `mkvolumegroup` accepts directly; suspension is set afterwards
    fn inline_into(&self, cmd: Command) -> Command {
        cmd.opt_if("ownershipgroup", self.ownershipgroup.as_deref())
            .opt_if("safeguardedpolicy", self.safeguardedpolicy.as_deref())
            .opt_if("policystarttime", self.policystarttime.as_deref())
            .opt_if("snapshotpolicy", self.snapshotpolicy.as_deref())
            .flag_if("safeguarded", self.safeguarded)
            .opt_if("ignoreuserfcmaps", self.ignoreuserfcmaps.map(|v| v.as_str()))
            .opt_if("replicationpolicy", self.replicationpolicy.as_deref())
            .opt_if("partition", self.partition.as_deref())
    }
}

impl Resource for VolumeGroupParams {
    type Observed = ObservedVolumeGroup;
    type Changes = VolumeGroupChanges;

    fn kind(&self) -> &'static str {
        "Volumegroup"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> State {
        self.state
    }

    async fn fetch<A: SvcApi>(&self, api: &A) -> Result<Option<ObservedVolumeGroup>> {
        fetch_group(api, &self.name).await
    }

    fn diff(&self, observed: &ObservedVolumeGroup) -> Result<VolumeGroupChanges> {
        self.check_provenance(observed)?;
        Ok(self.diff_attributes(observed))
    }

    async fn create<A: SvcApi>(&self, api: &A) -> Result<Option<String>> {
        let blank = ObservedVolumeGroup {
            name: self.name.clone(),
            ..ObservedVolumeGroup::default()
        };
        let changes = self.diff_attributes(&blank);

        let response = match self.vg_type {
            None => {
                let requested = self.supplied_provenance()?;
                if let Some(param) = requested.first() {
                    return Err(invalid(format!(
                        "Parameter [type] is required when [{}] is used to create volumegroup.",
                        param
                    )));
                }

                let cmd = changes.inline_into(Command::new("mkvolumegroup").opt("name", self.name.as_str()));
                let response = api.run(&cmd).await?;
                if let Some(suspended) = changes.snapshotpolicysuspended {
                    api.run(
                        &Command::new("chvolumegroup")
                            .opt("snapshotpolicysuspended", suspended.as_str())
                            .arg(&self.name),
                    )
                    .await?;
                }
                response
            }
            Some(kind) => {
                let response = self.create_clone(api, kind).await?;
                for cmd in changes.commands(&self.name) {
                    api.run(&cmd).await?;
                }
                response
            }
        };

        Ok(created_id(&response))
    }

    async fn update<A: SvcApi>(
        &self,
        api: &A,
        observed: &ObservedVolumeGroup,
        changes: &VolumeGroupChanges,
    ) -> Result<()> {
        for cmd in changes.commands(&observed.name) {
            api.run(&cmd).await?;
        }
        Ok(())
    }

    async fn delete<A: SvcApi>(&self, api: &A, observed: &ObservedVolumeGroup) -> Result<()> {
        let cmd = Command::new("rmvolumegroup")
            .flag_if("evictvolumes", self.evictvolumes)
            .arg(&observed.name);
        api.run(&cmd).await?;
        Ok(())
    }
}

async fn rename<A: SvcApi>(params: &VolumeGroupParams, api: &A, old_name: &str) -> Result<ModuleResult> {
    let old = fetch_group(api, old_name).await?;
    let new = fetch_group(api, &params.name).await?;

    match (old, new) {
        (Some(mut current), None) => {
            let changes = params.diff(&current)?;
            api.run(
                &Command::new("chvolumegroup")
                    .opt("name", params.name.as_str())
                    .arg(old_name),
            )
            .await?;
            tracing::info!("Volumegroup [{}] renamed to [{}]", old_name, params.name);
            current.name = params.name.clone();
            params.update(api, &current, &changes).await?;

            let msg = format!("Volumegroup [{}] has been renamed to [{}].", old_name, params.name);
            let result = ModuleResult::changed(msg);
            Ok(if changes.is_empty() {
                result
            } else {
                result.with("changes", changes.fields())
            })
        }
        (None, Some(current)) => reconcile_observed(params, api, Some(current)).await,
        (None, None) => Err(conflict(format!("Volumegroup [{}] does not exist.", old_name))),
        (Some(_), Some(_)) => Err(conflict(format!(
            "Volumegroup [{}] already exists; cannot rename [{}].",
            params.name, old_name
        ))),
    }
}

pub async fn apply<A: SvcApi>(params: &VolumeGroupParams, api: &A) -> Result<ModuleResult> {
    match (&params.old_name, params.state) {
        (Some(old_name), State::Present) => rename(params, api, old_name).await,
        _ => reconcile(params, api).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn params(value: Value) -> Result<VolumeGroupParams> {
        let Value::Object(map) = value else { unreachable!() };
        let p: VolumeGroupParams = params::parse("volumegroup", map)?;
        p.validate()?;
        Ok(p)
    }

    fn plain(owner: &str, safeguarded_policy: &str, snapshot_policy: &str) -> ObservedVolumeGroup {
        ObservedVolumeGroup {
            id: "8".into(),
            name: "test_volumegroup".into(),
            owner_name: owner.into(),
            safeguarded_policy_name: safeguarded_policy.into(),
            snapshot_policy_name: snapshot_policy.into(),
            snapshot_policy_suspended: "no".into(),
            snapshot_policy_safeguarded: "no".into(),
            ignore_user_flash_copy_maps: "no".into(),
            ..ObservedVolumeGroup::default()
        }
    }

    fn thinclone() -> ObservedVolumeGroup {
        ObservedVolumeGroup {
            id: "0".into(),
            name: "v1d1thclone".into(),
            volume_group_type: "thinclone".into(),
            source_snapshot: "snapshot_3335105753".into(),
            parent_uid: "76".into(),
            snapshot_policy_suspended: "no".into(),
            ignore_user_flash_copy_maps: "no".into(),
            provenance: Some(Provenance {
                kind: CloneKind::Thinclone,
                source_volumes: BTreeSet::from(["v1".to_string(), "d1".to_string()]),
                pools: BTreeSet::from(["pool0".to_string()]),
            }),
            ..ObservedVolumeGroup::default()
        }
    }

    fn fails_with(p: &VolumeGroupParams, observed: &ObservedVolumeGroup, msg: &str) {
        let err = p.diff(observed).unwrap_err();
        assert_eq!(err.to_string(), msg);
    }

    #[test]
    fn test_exclusive_pairs() {
        for (a, b) in [
            ("ownershipgroup", "noownershipgroup"),
            ("safeguardpolicyname", "nosafeguardpolicy"),
            ("ownershipgroup", "safeguardpolicyname"),
        ] {
            let mut args = json!({"name": "test_volume", "state": "present"});
            args[a] = if a.starts_with("no") { json!(true) } else { json!("x") };
            args[b] = if b.starts_with("no") { json!(true) } else { json!("y") };
            let err = params(args).unwrap_err();
            assert_eq!(err.to_string(), format!("parameters are mutually exclusive: {}|{}", a, b));
        }
    }

    #[test]
    fn test_delete_rejects_clone_params() {
        let err = params(json!({"name": "test_volumegroup", "state": "absent", "type": "thinclone", "pool": "pool0"}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter(s) [pool, type] not supported while deleting volumegroup."
        );
        assert!(params(json!({"name": "vg", "state": "absent", "evictvolumes": true})).is_ok());
    }

    #[test]
    fn test_type_needs_a_source() {
        let err = params(json!({"name": "vg", "state": "present", "type": "clone"})).unwrap_err();
        assert_eq!(err.to_string(), "one of the following is required: snapshot, fromsourcevolumes");
    }

    #[test]
    fn test_policystarttime_format() {
        let ok = json!({"name": "vg", "state": "present", "safeguardpolicyname": "p", "policystarttime": "2401011200"});
        assert!(params(ok).is_ok());
        let bad = json!({"name": "vg", "state": "present", "safeguardpolicyname": "p", "policystarttime": "YYMMDDHHMM"});
        assert!(params(bad).is_err());
    }

    #[test]
    fn test_source_volume_separators() {
        let p = params(json!({"name": "vg", "state": "present", "type": "clone", "fromsourcevolumes": "v1:d1, v2"})).unwrap();
        assert_eq!(p.source_volumes(), BTreeSet::from(["d1".into(), "v1".into(), "v2".into()]));
    }

    #[test]
    fn test_diff_ownership_and_policies() {
        let p = params(json!({"name": "test_volume", "state": "present", "ownershipgroup": "new"})).unwrap();
        assert_eq!(p.diff(&plain("", "", "")).unwrap().fields(), vec!["ownershipgroup"]);
        assert_eq!(p.diff(&plain("old", "", "")).unwrap().fields(), vec!["ownershipgroup"]);
        assert!(p.diff(&plain("new", "", "")).unwrap().is_empty());

        let p = params(json!({"name": "test_volume", "state": "present", "noownershipgroup": true})).unwrap();
        assert_eq!(p.diff(&plain("owner", "", "")).unwrap().fields(), vec!["noownershipgroup"]);
        assert!(p.diff(&plain("", "", "")).unwrap().is_empty());

        let p = params(json!({"name": "test_volume", "state": "present", "safeguardpolicyname": "new_policy"})).unwrap();
        assert_eq!(p.diff(&plain("", "old_policy", "")).unwrap().fields(), vec!["safeguardedpolicy"]);
    }

    #[test]
    fn test_diff_safeguarded_snapshot_policy() {
        let p = params(json!({
            "name": "test_volumegroup", "state": "present",
            "snapshotpolicy": "ss_policy2", "safeguarded": true, "ignoreuserfcmaps": "yes",
        }))
        .unwrap();
        let changes = p.diff(&plain("", "", "ss_policy1")).unwrap();
        assert_eq!(changes.fields(), vec!["snapshotpolicy", "safeguarded", "ignoreuserfcmaps"]);

        let commands = changes.commands("test_volumegroup");
        assert_eq!(commands.len(), 1);
        assert!(commands[0].has_flag("safeguarded"));
        assert_eq!(commands[0].opt_str("ignoreuserfcmaps"), Some("yes"));
    }

    #[test]
    fn test_diff_unmap_and_suspend() {
        let p = params(json!({
            "name": "test_volumegroup", "state": "present",
            "nosnapshotpolicy": true, "noreplicationpolicy": true,
        }))
        .unwrap();
        let mut observed = plain("", "", "ss_policy2");
        observed.replication_policy_name = "rp0".into();
        assert_eq!(p.diff(&observed).unwrap().fields(), vec!["nosnapshotpolicy", "noreplicationpolicy"]);

        let p = params(json!({
            "name": "test_volumegroup", "state": "present",
            "nosnapshotpolicy": true, "ignoreuserfcmaps": "yes",
        }))
        .unwrap();
        let changes = p.diff(&plain("", "", "ss_policy2")).unwrap();
        let commands: Vec<String> = changes.commands("test_volumegroup").iter().map(|c| c.to_string()).collect();
        assert_eq!(
            commands,
            vec![
                "chvolumegroup -nosnapshotpolicy test_volumegroup",
                "chvolumegroup -ignoreuserfcmaps yes test_volumegroup",
            ]
        );

        let p = params(json!({"name": "test_volumegroup", "state": "present", "snapshotpolicysuspended": "yes"})).unwrap();
        let changes = p.diff(&plain("", "", "ss_policy2")).unwrap();
        assert_eq!(changes.commands("test_volumegroup")[0].to_string(), "chvolumegroup -snapshotpolicysuspended yes test_volumegroup");
    }

    #[test]
    fn test_existing_thinclone_provenance_checks() {
        let p = params(json!({"name": "v1d1thclone", "state": "present", "pool": "pool0"})).unwrap();
        fails_with(&p, &thinclone(), "Existing thinclone volumegroup found.");

        let p = params(json!({"name": "v1d1thclone", "state": "present", "fromsourcevolumes": "v3:d1", "pool": "pool0"})).unwrap();
        fails_with(&p, &thinclone(), "Parameter [fromsourcevolumes] is invalid for modifying volumegroup.");

        let p = params(json!({
            "name": "v1d1thclone", "state": "present",
            "fromsourcevolumes": "v1:d1", "type": "thinclone", "pool": "pool1",
        }))
        .unwrap();
        fails_with(&p, &thinclone(), "Parameter [pool] is invalid for modifying volumegroup.");

        let p = params(json!({
            "name": "v1d1thclone", "state": "present",
            "fromsourcevolumes": "d1:v1", "type": "thinclone", "pool": "pool0",
        }))
        .unwrap();
        assert!(p.diff(&thinclone()).unwrap().is_empty());
    }

    #[test]
    fn test_plain_group_rejects_provenance() {
        let p = params(json!({"name": "test_volumegroup", "state": "present", "pool": "pool0"})).unwrap();
        fails_with(&p, &plain("", "", ""), "Parameter [pool] is invalid for modifying volumegroup.");
    }

    #[test]
    fn test_clone_kind_detection() {
        let mut group = plain("", "", "");
        assert_eq!(group.clone_kind(), None);
        group.source_snapshot = "snap".into();
        assert_eq!(group.clone_kind(), Some(CloneKind::Clone));
        group.volume_group_type = "thinclone".into();
        assert_eq!(group.clone_kind(), Some(CloneKind::Thinclone));
    }

    #[test]
    fn test_transient_snapshot_name() {
        let name = transient_snapshot_name();
        assert!(name.starts_with("snapshot_"));
        assert_eq!(name.len(), "snapshot_".len() + 10);
    }
}
