//! System-wide security settings
//!
//! A singleton: there is nothing to create or delete, only `lssecurity`
//! attributes to bring in line with a single `chsecurity` call.

use super::params::{self, de, YesNo};
use super::reconcile::ChangeSet;
use super::result::ModuleResult;
use crate::svc::{first_record, Command, SvcApi};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnableDisable {
    Enable,
    Disable,
}

impl EnableDisable {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnableDisable::Enable => "enable",
            EnableDisable::Disable => "disable",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityParams {
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub sshgracetime: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub sshmaxtries: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub guitimeout: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub clitimeout: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub restapitimeout: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub minpasswordlength: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub passwordspecialchars: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub passwordupperlowercase: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub passworddigits: Option<u32>,
    #[serde(default)]
    pub checkpasswordhistory: Option<YesNo>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub maxpasswordhistory: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub minpasswordage: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub passwordexpiry: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub expirywarning: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub maxfailedlogins: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub lockoutperiod: Option<u32>,
    #[serde(default)]
    pub superusermultifactor: Option<YesNo>,
    #[serde(default)]
    pub superuserpasswordsshkeyrequired: Option<YesNo>,
    #[serde(default)]
    pub superuserlocking: Option<EnableDisable>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub sslprotocol: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub sshprotocol: Option<u32>,
    #[serde(default)]
    pub patchautoupdate: Option<YesNo>,
}

/// Parameter name and the `lssecurity` attribute it is reported under
const FIELD_MAP: &[(&str, &str)] = &[
    ("sshgracetime", "ssh_grace_time_seconds"),
    ("sshmaxtries", "ssh_max_tries"),
    ("guitimeout", "gui_timeout_mins"),
    ("clitimeout", "cli_timeout_mins"),
    ("restapitimeout", "rest_api_timeout_mins"),
    ("minpasswordlength", "min_password_length"),
    ("passwordspecialchars", "password_special_chars"),
    ("passwordupperlowercase", "password_upper_lower_case"),
    ("passworddigits", "password_digits"),
    ("checkpasswordhistory", "check_password_history"),
    ("maxpasswordhistory", "max_password_history"),
    ("minpasswordage", "min_password_age_days"),
    ("passwordexpiry", "password_expiry_days"),
    ("expirywarning", "expiry_warning_days"),
    ("maxfailedlogins", "max_failed_logins"),
    ("lockoutperiod", "lockout_period_mins"),
    ("superusermultifactor", "superuser_multi_factor"),
    ("superuserpasswordsshkeyrequired", "superuser_password_sshkey_required"),
    ("superuserlocking", "superuser_locking"),
    ("sslprotocol", "ssl_protocol"),
    ("sshprotocol", "ssh_protocol"),
    ("patchautoupdate", "patch_auto_update"),
];

impl SecurityParams {
    pub fn validate(&self) -> Result<()> {
        let supplied = params::supplied(self)?;
        let all: Vec<&str> = FIELD_MAP.iter().map(|(param, _)| *param).collect();
        params::required_one_of(&supplied, &[all.as_slice()])
    }

    /// Requested settings as `(param, value)` pairs, in table order
    fn desired(&self) -> Vec<(&'static str, String)> {
        let num = |v: Option<u32>| v.map(|n| n.to_string());
        let yes_no = |v: Option<YesNo>| v.map(|v| v.as_str().to_string());

        let values = [
            num(self.sshgracetime),
            num(self.sshmaxtries),
            num(self.guitimeout),
            num(self.clitimeout),
            num(self.restapitimeout),
            num(self.minpasswordlength),
            num(self.passwordspecialchars),
            num(self.passwordupperlowercase),
            num(self.passworddigits),
            yes_no(self.checkpasswordhistory),
            num(self.maxpasswordhistory),
            num(self.minpasswordage),
            num(self.passwordexpiry),
            num(self.expirywarning),
            num(self.maxfailedlogins),
            num(self.lockoutperiod),
            yes_no(self.superusermultifactor),
            yes_no(self.superuserpasswordsshkeyrequired),
            self.superuserlocking.map(|v| v.as_str().to_string()),
            num(self.sslprotocol),
            num(self.sshprotocol),
            yes_no(self.patchautoupdate),
        ];

        FIELD_MAP
            .iter()
            .zip(values)
            .filter_map(|((param, _), value)| value.map(|v| (*param, v)))
            .collect()
    }

    pub fn diff(&self, observed: &ObservedSecurity) -> SecurityChanges {
        let settings = self
            .desired()
            .into_iter()
            .filter(|(param, desired)| {
                let current = observed.field_for(param);
                !current.is_some_and(|current| values_match(desired, current))
            })
            .collect();
        SecurityChanges { settings }
    }
}

/// Numeric values compare by value; `enable` matches `enabled`
fn values_match(desired: &str, observed: &str) -> bool {
    let observed = observed.trim();
    if desired.eq_ignore_ascii_case(observed) {
        return true;
    }
    if let (Ok(a), Ok(b)) = (desired.parse::<u64>(), observed.parse::<u64>()) {
        return a == b;
    }
    observed
        .to_ascii_lowercase()
        .strip_suffix('d')
        .is_some_and(|stem| stem == desired)
}

/// `lssecurity` attributes
#[derive(Debug, Clone, Default)]
pub struct ObservedSecurity(pub Map<String, Value>);

impl ObservedSecurity {
    fn field_for(&self, param: &str) -> Option<&str> {
        let (_, field) = FIELD_MAP.iter().find(|(p, _)| *p == param)?;
        self.0.get(*field).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityChanges {
    pub settings: Vec<(&'static str, String)>,
}

impl ChangeSet for SecurityChanges {
    fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    fn fields(&self) -> Vec<&'static str> {
        self.settings.iter().map(|(param, _)| *param).collect()
    }
}

pub async fn apply<A: SvcApi>(params: &SecurityParams, api: &A) -> Result<ModuleResult> {
    let observed = ObservedSecurity(
        first_record(api.obj_info(&Command::new("lssecurity")).await?).unwrap_or_default(),
    );

    let changes = params.diff(&observed);
    if changes.is_empty() {
        return Ok(ModuleResult::unchanged(
            "No modifications required for security settings.",
        ));
    }

    let cmd = changes
        .settings
        .iter()
        .fold(Command::new("chsecurity"), |cmd, (param, value)| {
            cmd.opt(param, value.as_str())
        });
    api.run(&cmd).await?;
    tracing::info!("Security settings updated: {:?}", changes.fields());

    Ok(ModuleResult::changed("Security settings have been updated.")
        .with("changes", changes.fields()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Result<SecurityParams> {
        let Value::Object(map) = value else { unreachable!() };
        let p: SecurityParams = params::parse("security", map)?;
        p.validate()?;
        Ok(p)
    }

    fn observed(value: Value) -> ObservedSecurity {
        let Value::Object(map) = value else { unreachable!() };
        ObservedSecurity(map)
    }

    #[test]
    fn test_at_least_one_setting_required() {
        let err = params(json!({})).unwrap_err();
        assert!(err.to_string().starts_with("one of the following is required: sshgracetime"));
    }

    #[test]
    fn test_unknown_setting_rejected() {
        let err = params(json!({"sshgracetimeout": 10})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported parameters for (security) module: sshgracetimeout"
        );
    }

    #[test]
    fn test_only_differing_settings_are_sent() {
        let p = params(json!({"sshgracetime": 1200, "guitimeout": "60", "patchautoupdate": "yes"})).unwrap();
        let changes = p.diff(&observed(json!({
            "ssh_grace_time_seconds": "1200",
            "gui_timeout_mins": "30",
            "patch_auto_update": "no",
        })));
        assert_eq!(changes.fields(), vec!["guitimeout", "patchautoupdate"]);
    }

    #[test]
    fn test_missing_attribute_counts_as_different() {
        let p = params(json!({"patchautoupdate": "yes"})).unwrap();
        assert_eq!(p.diff(&ObservedSecurity::default()).fields(), vec!["patchautoupdate"]);
    }

    #[test]
    fn test_value_matching() {
        assert!(values_match("60", "060"));
        assert!(values_match("yes", "Yes"));
        assert!(values_match("enable", "enabled"));
        assert!(!values_match("disable", "enabled"));
    }
}
