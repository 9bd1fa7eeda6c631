//! Configuration Management
//!
//! Connection settings come from the argument bundle, then the environment,
//! then the persistent defaults file.

use crate::modules::params::de;
use crate::modules::result::invalid;
use crate::svc::auth::Credentials;
use crate::svc::client::REST_PORT;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Persistent connection defaults
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub clustername: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub validate_certs: Option<bool>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("svctl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}

/// Connection parameters as they appear in the argument bundle
#[derive(Clone, Default, Deserialize)]
pub struct ConnectionParams {
    #[serde(default)]
    pub clustername: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "de::opt_bool")]
    pub validate_certs: Option<bool>,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("clustername", &self.clustername)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("validate_certs", &self.validate_certs)
            .field("log_path", &self.log_path)
            .finish_non_exhaustive()
    }
}

impl ConnectionParams {
    /// Keys that belong to the connection rather than to a module
    pub const KEYS: &'static [&'static str] = &[
        "clustername",
        "domain",
        "username",
        "password",
        "token",
        "validate_certs",
        "log_path",
    ];

    /// Resolve against the process environment and the defaults file
    pub fn resolve(self, config: &Config) -> Result<Connection> {
        self.resolve_with(config, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve_with(
        self,
        config: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Connection> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let clustername = non_empty(self.clustername)
            .or_else(|| non_empty(env("SVC_CLUSTERNAME")))
            .or_else(|| non_empty(config.clustername.clone()))
            .ok_or_else(|| invalid("missing required arguments: clustername"))?;
        let domain = non_empty(self.domain)
            .or_else(|| non_empty(env("SVC_DOMAIN")))
            .or_else(|| non_empty(config.domain.clone()));
        let username = non_empty(self.username)
            .or_else(|| non_empty(env("SVC_USERNAME")))
            .or_else(|| non_empty(config.username.clone()));
        let password = non_empty(self.password).or_else(|| non_empty(env("SVC_PASSWORD")));
        let token = non_empty(self.token).or_else(|| non_empty(env("SVC_TOKEN")));

        let validate_certs = match self.validate_certs {
            Some(v) => v,
            None => match env("SVC_VALIDATE_CERTS") {
                Some(raw) => matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
                None => config.validate_certs.unwrap_or(false),
            },
        };

        let credentials = match (username, password, token) {
            (Some(username), Some(password), _) => Credentials::Password { username, password },
            (None, None, Some(token)) => Credentials::Token(token),
            (Some(_), None, Some(token)) => Credentials::Token(token),
            (Some(_), None, None) | (None, Some(_), None) => {
                return Err(invalid("parameters are required together: username, password"))
            }
            (None, Some(_), Some(token)) => Credentials::Token(token),
            (None, None, None) => {
                return Err(invalid(
                    "You must pass in either pre-acquired token or username/password to generate new token",
                ))
            }
        };

        Ok(Connection {
            clustername,
            domain,
            credentials,
            validate_certs,
        })
    }
}

/// Fully resolved connection
#[derive(Debug, Clone)]
pub struct Connection {
    pub clustername: String,
    pub domain: Option<String>,
    pub credentials: Credentials,
    pub validate_certs: bool,
}

impl Connection {
    /// Host name used in URLs: `<cluster>` or `<cluster>.<domain>`
    pub fn host(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}.{}", self.clustername, domain),
            None => self.clustername.clone(),
        }
    }

    /// `https://<host>:7443/rest/v1/`
    pub fn rest_base_url(&self) -> Result<Url> {
        let raw = format!("https://{}:{}/rest/v1/", self.host(), REST_PORT);
        Url::parse(&raw).with_context(|| format!("Invalid cluster address: {}", self.host()))
    }
}
