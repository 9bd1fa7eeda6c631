//! Management modules
//!
//! Each module owns a typed parameter struct, validated once before any
//! remote call, and an `apply` entry point that runs against any [`SvcApi`].
//!
//! - [`drive`] - drive use state and drive tasks
//! - [`security`] - system-wide security settings
//! - [`storage_partition`] - storage partitions
//! - [`syslog_server`] - syslog server definitions, including rename
//! - [`volumegroup`] - volume groups, including clone and thinclone
//! - [`info`] - read-only gather over the listing commands

pub mod drive;
pub mod info;
pub mod invocation;
pub mod params;
pub mod reconcile;
pub mod result;
pub mod security;
pub mod storage_partition;
pub mod syslog_server;
pub mod volumegroup;

use crate::svc::SvcApi;
use anyhow::Result;
use clap::ValueEnum;
use serde_json::{Map, Value};
use std::fmt;

pub use result::{failure_bundle, ModuleError, ModuleResult};

/// Module selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModuleKind {
    Drive,
    Security,
    #[value(name = "storage_partition", alias = "storage-partition")]
    StoragePartition,
    #[value(name = "syslog_server", alias = "syslog-server")]
    SyslogServer,
    Volumegroup,
    Info,
}

impl ModuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModuleKind::Drive => "drive",
            ModuleKind::Security => "security",
            ModuleKind::StoragePartition => "storage_partition",
            ModuleKind::SyslogServer => "syslog_server",
            ModuleKind::Volumegroup => "volumegroup",
            ModuleKind::Info => "info",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated parameters of one module invocation
#[derive(Debug, Clone)]
pub enum ModuleParams {
    Drive(drive::DriveParams),
    Security(security::SecurityParams),
    StoragePartition(storage_partition::PartitionParams),
    SyslogServer(syslog_server::SyslogServerParams),
    Volumegroup(volumegroup::VolumeGroupParams),
    Info(info::InfoParams),
}

impl ModuleParams {
    /// Deserialize and validate module parameters. Nothing here talks to
    /// the appliance.
    pub fn parse(kind: ModuleKind, args: Map<String, Value>) -> Result<Self> {
        let module = kind.name();
        let params = match kind {
            ModuleKind::Drive => ModuleParams::Drive(params::parse(module, args)?),
            ModuleKind::Security => ModuleParams::Security(params::parse(module, args)?),
            ModuleKind::StoragePartition => {
                ModuleParams::StoragePartition(params::parse(module, args)?)
            }
            ModuleKind::SyslogServer => ModuleParams::SyslogServer(params::parse(module, args)?),
            ModuleKind::Volumegroup => ModuleParams::Volumegroup(params::parse(module, args)?),
            ModuleKind::Info => ModuleParams::Info(params::parse(module, args)?),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ModuleParams::Drive(p) => p.validate(),
            ModuleParams::Security(p) => p.validate(),
            ModuleParams::StoragePartition(p) => p.validate(),
            ModuleParams::SyslogServer(p) => p.validate(),
            ModuleParams::Volumegroup(p) => p.validate(),
            ModuleParams::Info(p) => p.validate(),
        }
    }

    pub async fn apply<A: SvcApi>(&self, api: &A) -> Result<ModuleResult> {
        match self {
            ModuleParams::Drive(p) => drive::apply(p, api).await,
            ModuleParams::Security(p) => security::apply(p, api).await,
            ModuleParams::StoragePartition(p) => storage_partition::apply(p, api).await,
            ModuleParams::SyslogServer(p) => syslog_server::apply(p, api).await,
            ModuleParams::Volumegroup(p) => volumegroup::apply(p, api).await,
            ModuleParams::Info(p) => info::apply(p, api).await,
        }
    }
}
