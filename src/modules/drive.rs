//! Drive use-state changes and drive tasks
//!
//! Tasks are side-effect only. A task is started when the drive has nothing
//! in progress, treated as done when the same task is already running, and
//! refused with `CMMVC6625E` when a different one is.

use super::params::{self, de};
use super::reconcile::ChangeSet;
use super::result::{conflict, invalid, ModuleResult};
use crate::svc::{fetch_record, Command, SvcApi};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveUse {
    Unused,
    Candidate,
    Spare,
    Failed,
}

impl DriveUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveUse::Unused => "unused",
            DriveUse::Candidate => "candidate",
            DriveUse::Spare => "spare",
            DriveUse::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveTask {
    Format,
    Certify,
    Recover,
    Erase,
    Cancelerase,
    Triggerdump,
}

impl DriveTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveTask::Format => "format",
            DriveTask::Certify => "certify",
            DriveTask::Recover => "recover",
            DriveTask::Erase => "erase",
            DriveTask::Cancelerase => "cancelerase",
            DriveTask::Triggerdump => "triggerdump",
        }
    }
}

impl fmt::Display for DriveTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DriveParams {
    #[serde(deserialize_with = "de::u32")]
    pub drive_id: u32,
    #[serde(default)]
    pub drive_state: Option<DriveUse>,
    #[serde(default)]
    pub task: Option<DriveTask>,
    #[serde(default, deserialize_with = "de::bool")]
    pub allowdegraded: bool,
}

/// What a validated drive invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveAction {
    ChangeUse(DriveUse),
    Task(DriveTask),
}

impl DriveParams {
    pub fn validate(&self) -> Result<()> {
        self.action().map(drop)
    }

    /// Validate and pick the single action requested
    pub fn action(&self) -> Result<DriveAction> {
        let supplied = params::supplied(self)?;
        params::mutually_exclusive(&supplied, &[("drive_state", "task")])?;
        let action = self
            .drive_state
            .map(DriveAction::ChangeUse)
            .or(self.task.map(DriveAction::Task))
            .ok_or_else(|| invalid("one of the following is required: drive_state, task"))?;
        params::required_by(&supplied, &[("allowdegraded", &["drive_state"])])?;
        Ok(action)
    }
}

/// `lsdrive <id>` view
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservedDrive {
    pub id: String,
    pub status: String,
    #[serde(rename = "use")]
    pub drive_use: String,
}

/// `lsdriveprogress <id>` view; an empty task means nothing is running
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DriveProgress {
    pub id: String,
    pub task: String,
    pub progress: String,
    pub estimated_completion_time: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriveUseChange {
    pub drive_state: Option<DriveUse>,
}

impl ChangeSet for DriveUseChange {
    fn is_empty(&self) -> bool {
        self.drive_state.is_none()
    }

    fn fields(&self) -> Vec<&'static str> {
        match self.drive_state {
            Some(_) => vec!["drive_state"],
            None => Vec::new(),
        }
    }
}

pub fn diff_use(desired: DriveUse, observed: &ObservedDrive) -> DriveUseChange {
    if desired.as_str().eq_ignore_ascii_case(observed.drive_use.trim()) {
        DriveUseChange::default()
    } else {
        DriveUseChange {
            drive_state: Some(desired),
        }
    }
}

async fn change_use<A: SvcApi>(params: &DriveParams, api: &A, desired: DriveUse) -> Result<ModuleResult> {
    let id = params.drive_id.to_string();
    let observed: Option<ObservedDrive> = fetch_record(api, &Command::new("lsdrive").arg(&id)).await?;
    let observed = observed.ok_or_else(|| conflict(format!("Drive [{}] does not exist.", id)))?;

    let change = diff_use(desired, &observed);
    if change.is_empty() {
        return Ok(ModuleResult::unchanged(format!(
            "Drive [{}] is already in [{}] state.",
            id,
            desired.as_str()
        )));
    }

    let cmd = Command::new("chdrive")
        .opt("use", desired.as_str())
        .flag_if("allowdegraded", params.allowdegraded)
        .arg(&id);
    api.run(&cmd).await?;
    tracing::info!("Drive [{}] use changed from [{}] to [{}]", id, observed.drive_use, desired.as_str());

    Ok(ModuleResult::changed(format!(
        "Drive [{}] state changed to [{}].",
        id,
        desired.as_str()
    ))
    .with("changes", change.fields()))
}

fn busy(id: &str, running: &str) -> anyhow::Error {
    conflict(format!(
        "CMMVC6625E The task cannot be initiated because a [{}] task is already in progress on drive [{}].",
        running, id
    ))
}

async fn run_task<A: SvcApi>(params: &DriveParams, api: &A, task: DriveTask) -> Result<ModuleResult> {
    let id = params.drive_id.to_string();

    if task == DriveTask::Triggerdump {
        api.run(&Command::new("triggerdrivedump").arg(&id)).await?;
        return Ok(ModuleResult::changed(format!("Drive dump triggered on drive [{}].", id)));
    }

    let progress: Option<DriveProgress> =
        fetch_record(api, &Command::new("lsdriveprogress").arg(&id)).await?;
    let running = progress
        .map(|p| p.task.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty());
    tracing::debug!("Drive [{}] task in progress: {:?}", id, running);

    let start = Command::new("chdrive").opt("task", task.as_str()).arg(&id);

    match (task, running.as_deref()) {
        (DriveTask::Cancelerase, Some("erase")) => {
            api.run(&start).await?;
            Ok(ModuleResult::changed(format!("Erase cancelled on drive [{}].", id)))
        }
        (DriveTask::Cancelerase, None) => Ok(ModuleResult::unchanged(format!(
            "No erase task in progress on drive [{}].",
            id
        ))),
        (_, None) => {
            api.run(&start).await?;
            tracing::info!("Task [{}] started on drive [{}]", task, id);
            Ok(ModuleResult::changed(format!(
                "Task [{}] started on drive [{}].",
                task, id
            )))
        }
        (_, Some(current)) if current == task.as_str() => Ok(ModuleResult::unchanged(format!(
            "Task [{}] is already in progress on drive [{}].",
            task, id
        ))),
        (_, Some(current)) => Err(busy(&id, current)),
    }
}

pub async fn apply<A: SvcApi>(params: &DriveParams, api: &A) -> Result<ModuleResult> {
    match params.action()? {
        DriveAction::ChangeUse(desired) => change_use(params, api, desired).await,
        DriveAction::Task(task) => run_task(params, api, task).await,
    }
}
