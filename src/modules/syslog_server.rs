//! Syslog server management, including rename through `old_name`

use super::params::{self, de, OnOff, State};
use super::reconcile::{reconcile, reconcile_observed, ChangeSet, Resource};
use super::result::{conflict, invalid, ModuleResult};
use crate::svc::{created_id, fetch_record, Command, SvcApi};
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyslogServerParams {
    pub name: String,
    pub state: State,
    #[serde(default)]
    pub old_name: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub facility: Option<u32>,
    #[serde(default)]
    pub error: Option<OnOff>,
    #[serde(default)]
    pub warning: Option<OnOff>,
    #[serde(default)]
    pub info: Option<OnOff>,
    #[serde(default)]
    pub audit: Option<OnOff>,
    #[serde(default)]
    pub login: Option<OnOff>,
    #[serde(default)]
    pub cadf: Option<OnOff>,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub port: Option<u32>,
}

/// Message levels, at least one of which has to stay enabled
const LEVELS: [&str; 5] = ["error", "warning", "info", "audit", "login"];

impl SyslogServerParams {
    pub fn validate(&self) -> Result<()> {
        params::require_non_blank("name", &self.name)?;

        let supplied = params::supplied(self)?;
        params::mutually_exclusive(&supplied, &[("cadf", "facility")])?;
        params::required_by(&supplied, &[("port", &["protocol"])])?;

        if self.state == State::Absent {
            return params::only_allowed(&supplied, &["name", "state"], "while deleting syslog server");
        }

        if let Some(old_name) = &self.old_name {
            params::require_non_blank("old_name", old_name)?;
        }
        if let Some(facility) = self.facility {
            if facility > 7 {
                return Err(invalid(format!(
                    "Invalid facility [{}]: must be between 0 and 7.",
                    facility
                )));
            }
        }
        if let Some(port) = self.port {
            if !(1..=65535).contains(&port) {
                return Err(invalid(format!(
                    "Invalid port [{}]: must be between 1 and 65535.",
                    port
                )));
            }
        }
        if self.levels().iter().all(|level| *level == Some(OnOff::Off)) {
            return Err(no_level_enabled());
        }
        Ok(())
    }

    fn levels(&self) -> [Option<OnOff>; 5] {
        [self.error, self.warning, self.info, self.audit, self.login]
    }

    /// Levels after applying the request on top of `base`
    fn effective_levels(&self, base: [OnOff; 5]) -> [OnOff; 5] {
        let mut levels = base;
        for (slot, desired) in levels.iter_mut().zip(self.levels()) {
            if let Some(desired) = desired {
                *slot = desired;
            }
        }
        levels
    }
}

fn no_level_enabled() -> anyhow::Error {
    invalid(format!(
        "At least one of [{}] must be on.",
        LEVELS.join(", ")
    ))
}

/// `lssyslogserver <name>` view
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservedSyslogServer {
    pub id: String,
    pub name: String,
    #[serde(rename = "IP_address")]
    pub ip_address: String,
    pub error: String,
    pub warning: String,
    pub info: String,
    pub audit: String,
    pub login: String,
    pub cadf: String,
    pub facility: String,
    pub protocol: String,
    pub port: String,
}

impl ObservedSyslogServer {
    fn levels(&self) -> [OnOff; 5] {
        [&self.error, &self.warning, &self.info, &self.audit, &self.login]
            .map(|raw| OnOff::from_observed(raw).unwrap_or(OnOff::Off))
    }
}

/// Appliance defaults for a new server: error, warning and info enabled
const CREATE_DEFAULT_LEVELS: [OnOff; 5] = [OnOff::On, OnOff::On, OnOff::On, OnOff::Off, OnOff::Off];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyslogServerChanges {
    pub ip: Option<String>,
    pub facility: Option<u32>,
    pub error: Option<OnOff>,
    pub warning: Option<OnOff>,
    pub info: Option<OnOff>,
    pub audit: Option<OnOff>,
    pub login: Option<OnOff>,
    pub cadf: Option<OnOff>,
    pub protocol: Option<Protocol>,
    pub port: Option<u32>,
}

impl SyslogServerChanges {
    fn level_slots(&mut self) -> [&mut Option<OnOff>; 5] {
        [
            &mut self.error,
            &mut self.warning,
            &mut self.info,
            &mut self.audit,
            &mut self.login,
        ]
    }

    fn apply_to(&self, cmd: Command) -> Command {
        let on_off = |v: Option<OnOff>| v.map(|v| v.as_str());
        cmd.opt_if("ip", self.ip.clone())
            .opt_if("facility", self.facility)
            .opt_if("error", on_off(self.error))
            .opt_if("warning", on_off(self.warning))
            .opt_if("info", on_off(self.info))
            .opt_if("audit", on_off(self.audit))
            .opt_if("login", on_off(self.login))
            .opt_if("cadf", on_off(self.cadf))
            .opt_if("protocol", self.protocol.map(|p| p.as_str()))
            .opt_if("port", self.port)
    }
}

impl ChangeSet for SyslogServerChanges {
    fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    fn fields(&self) -> Vec<&'static str> {
        [
            ("ip", self.ip.is_some()),
            ("facility", self.facility.is_some()),
            ("error", self.error.is_some()),
            ("warning", self.warning.is_some()),
            ("info", self.info.is_some()),
            ("audit", self.audit.is_some()),
            ("login", self.login.is_some()),
            ("cadf", self.cadf.is_some()),
            ("protocol", self.protocol.is_some()),
            ("port", self.port.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }
}

impl Resource for SyslogServerParams {
    type Observed = ObservedSyslogServer;
    type Changes = SyslogServerChanges;

    fn kind(&self) -> &'static str {
        "Syslog server"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> State {
        self.state
    }

    async fn fetch<A: SvcApi>(&self, api: &A) -> Result<Option<ObservedSyslogServer>> {
        fetch_server(api, &self.name).await
    }

    fn diff(&self, observed: &ObservedSyslogServer) -> Result<SyslogServerChanges> {
        let mut changes = SyslogServerChanges::default();

        if let Some(ip) = &self.ip {
            if *ip != observed.ip_address {
                changes.ip = Some(ip.clone());
            }
        }
        if let Some(facility) = self.facility {
            if observed.facility.trim().parse::<u32>().ok() != Some(facility) {
                changes.facility = Some(facility);
            }
        }

        let current = observed.levels();
        if !self.effective_levels(current).iter().any(OnOff::is_on) {
            return Err(no_level_enabled());
        }
        for ((slot, desired), current) in changes.level_slots().into_iter().zip(self.levels()).zip(current) {
            if let Some(desired) = desired {
                if desired != current {
                    *slot = Some(desired);
                }
            }
        }

        if let Some(cadf) = self.cadf {
            if !cadf.matches(&observed.cadf) {
                changes.cadf = Some(cadf);
            }
        }
        if let Some(protocol) = self.protocol {
            if !protocol.as_str().eq_ignore_ascii_case(observed.protocol.trim()) {
                changes.protocol = Some(protocol);
            }
        }
        if let Some(port) = self.port {
            if observed.port.trim().parse::<u32>().ok() != Some(port) {
                changes.port = Some(port);
            }
        }

        Ok(changes)
    }

    async fn create<A: SvcApi>(&self, api: &A) -> Result<Option<String>> {
        let ip = self
            .ip
            .as_deref()
            .filter(|ip| !ip.trim().is_empty())
            .ok_or_else(|| invalid("Missing mandatory parameter: ip"))?;

        if !self.effective_levels(CREATE_DEFAULT_LEVELS).iter().any(OnOff::is_on) {
            return Err(no_level_enabled());
        }

        let desired = SyslogServerChanges {
            ip: Some(ip.to_string()),
            facility: self.facility,
            error: self.error,
            warning: self.warning,
            info: self.info,
            audit: self.audit,
            login: self.login,
            cadf: self.cadf,
            protocol: self.protocol,
            port: self.port,
        };
        let cmd = desired.apply_to(Command::new("mksyslogserver").opt("name", self.name.as_str()));
        let response = api.run(&cmd).await?;
        Ok(created_id(&response))
    }

    async fn update<A: SvcApi>(
        &self,
        api: &A,
        observed: &ObservedSyslogServer,
        changes: &SyslogServerChanges,
    ) -> Result<()> {
        let cmd = changes.apply_to(Command::new("chsyslogserver")).arg(&observed.name);
        api.run(&cmd).await?;
        Ok(())
    }

    async fn delete<A: SvcApi>(&self, api: &A, observed: &ObservedSyslogServer) -> Result<()> {
        api.run(&Command::new("rmsyslogserver").arg(&observed.name)).await?;
        Ok(())
    }
}

async fn fetch_server<A: SvcApi>(api: &A, name: &str) -> Result<Option<ObservedSyslogServer>> {
    fetch_record(api, &Command::new("lssyslogserver").arg(name)).await
}

/// Rename `old_name` to `name`, then bring the renamed server's attributes
/// in line with the request
async fn rename<A: SvcApi>(
    params: &SyslogServerParams,
    api: &A,
    old_name: &str,
) -> Result<ModuleResult> {
    let old = fetch_server(api, old_name).await?;
    let new = fetch_server(api, &params.name).await?;

    match (old, new) {
        (Some(mut current), None) => {
            let changes = params.diff(&current)?;

            api.run(
                &Command::new("chsyslogserver")
                    .opt("name", params.name.as_str())
                    .arg(old_name),
            )
            .await?;
            tracing::info!("Syslog server [{}] renamed to [{}]", old_name, params.name);
            current.name = params.name.clone();

            let msg = format!(
                "Syslog server [{}] has been successfully rename to [{}].",
                old_name, params.name
            );
            if changes.is_empty() {
                return Ok(ModuleResult::changed(msg));
            }
            params.update(api, &current, &changes).await?;
            Ok(ModuleResult::changed(msg).with("changes", changes.fields()))
        }
        // Already renamed by an earlier run
        (None, Some(current)) => reconcile_observed(params, api, Some(current)).await,
        (None, None) => Err(conflict(format!(
            "Syslog server with old name [{}] does not exist.",
            old_name
        ))),
        (Some(_), Some(_)) => Err(conflict(format!(
            "Syslog server [{}] already exists; cannot rename [{}].",
            params.name, old_name
        ))),
    }
}

pub async fn apply<A: SvcApi>(params: &SyslogServerParams, api: &A) -> Result<ModuleResult> {
    match (&params.old_name, params.state) {
        (Some(old_name), State::Present) => rename(params, api, old_name).await,
        _ => reconcile(params, api).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn params(value: Value) -> Result<SyslogServerParams> {
        let Value::Object(map) = value else { unreachable!() };
        let p: SyslogServerParams = params::parse("syslog_server", map)?;
        p.validate()?;
        Ok(p)
    }

    fn server0() -> ObservedSyslogServer {
        ObservedSyslogServer {
            id: "1".into(),
            name: "server0".into(),
            ip_address: "1.1.1.1".into(),
            error: "on".into(),
            warning: "on".into(),
            info: "on".into(),
            audit: "off".into(),
            login: "off".into(),
            cadf: "off".into(),
            facility: "0".into(),
            protocol: "udp".into(),
            port: "514".into(),
        }
    }

    #[test]
    fn test_cadf_and_facility_exclusive() {
        let err = params(json!({"name": "server1", "state": "present", "cadf": "on", "facility": 1}))
            .unwrap_err();
        assert_eq!(err.to_string(), "parameters are mutually exclusive: cadf|facility");
    }

    #[test]
    fn test_port_requires_protocol() {
        let err = params(json!({"name": "server1", "state": "present", "port": "1010"})).unwrap_err();
        assert_eq!(err.to_string(), "missing parameter(s) required by 'port': protocol");
    }

    #[test]
    fn test_facility_range() {
        assert!(params(json!({"name": "s", "state": "present", "facility": 8})).is_err());
        assert!(params(json!({"name": "s", "state": "present", "facility": 7})).is_ok());
    }

    #[test]
    fn test_delete_accepts_only_name() {
        let err = params(json!({"name": "server0", "state": "absent", "ip": "1.1.1.1", "error": "off"}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter(s) [error, ip] not supported while deleting syslog server."
        );
    }

    #[test]
    fn test_all_levels_off_rejected() {
        let err = params(json!({
            "name": "s", "state": "present",
            "error": "off", "warning": "off", "info": "off", "audit": "off", "login": "off",
        }))
        .unwrap_err();
        assert!(err.to_string().starts_with("At least one of [error, warning, info, audit, login]"));
    }

    #[test]
    fn test_turning_off_last_enabled_level_rejected() {
        let p = params(json!({"name": "server0", "state": "present", "error": "off"})).unwrap();
        let mut observed = server0();
        observed.warning = "off".into();
        observed.info = "off".into();
        assert!(p.diff(&observed).is_err());
    }

    #[test]
    fn test_matching_server_has_no_changes() {
        let p = params(json!({"name": "server0", "state": "present", "ip": "1.1.1.1", "port": 514, "protocol": "UDP"}));
        // protocol values are lower case only
        assert!(p.is_err());

        let p = params(json!({"name": "server0", "state": "present", "ip": "1.1.1.1", "port": 514, "protocol": "udp"}))
            .unwrap();
        assert!(p.diff(&server0()).unwrap().is_empty());
    }

    #[test]
    fn test_update_collects_differences() {
        let p = params(json!({"name": "server0", "state": "present", "ip": "1.1.1.1", "info": "off"})).unwrap();
        let changes = p.diff(&server0()).unwrap();
        assert_eq!(changes.fields(), vec!["info"]);
        let cmd = changes.apply_to(Command::new("chsyslogserver")).arg("server0");
        assert_eq!(cmd.to_string(), "chsyslogserver -info off server0");
    }
}
