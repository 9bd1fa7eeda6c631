//! Storage Virtualize client
//!
//! Main client for the REST management endpoint, combining authentication
//! and HTTP functionality.

use super::api::{Command, SvcApi};
use super::auth::SvcCredentials;
use super::http::{SvcError, SvcHttpClient};
use crate::config::Connection;
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// Management port of the REST endpoint
pub const REST_PORT: u16 = 7443;

/// Main REST client
#[derive(Clone)]
pub struct SvcClient {
    pub credentials: SvcCredentials,
    pub http: SvcHttpClient,
    pub base_url: Url,
}

impl SvcClient {
    /// Create a client for the given connection. Nothing is sent until the
    /// first command; authentication happens lazily on first use.
    pub fn new(connection: &Connection) -> Result<Self> {
        let base_url = connection.rest_base_url()?;
        Self::with_base_url(connection, base_url)
    }

    /// Create a client against an explicit base URL (used for non-standard
    /// endpoints and tests)
    pub fn with_base_url(connection: &Connection, base_url: Url) -> Result<Self> {
        let auth_url = base_url
            .join("auth")
            .context("Failed to build authentication URL")?;
        let credentials = SvcCredentials::new(connection.credentials.clone(), auth_url);
        let http = SvcHttpClient::new(connection.validate_certs)?;

        Ok(Self {
            credentials,
            http,
            base_url,
        })
    }

    /// Build the URL for a command: `<base>/<cmd>[/<arg>...]`
    pub fn command_url(&self, cmd: &Command) -> Result<Url> {
        let mut path = urlencoding::encode(&cmd.name).into_owned();
        for arg in &cmd.args {
            path.push('/');
            path.push_str(&urlencoding::encode(arg));
        }
        self.base_url
            .join(&path)
            .with_context(|| format!("Failed to build URL for command {}", cmd.name))
    }

    async fn post(&self, cmd: &Command) -> Result<Value> {
        let url = self.command_url(cmd)?;
        let token = self.credentials.get_token(&self.http).await?;
        self.http.post(&url, &token, &cmd.opts).await
    }
}

impl SvcApi for SvcClient {
    async fn obj_info(&self, cmd: &Command) -> Result<Option<Value>> {
        tracing::debug!("obj_info: {}", cmd);

        match self.post(cmd).await {
            Ok(value) => Ok(Some(value)),
            Err(err) => match err.downcast_ref::<SvcError>() {
                Some(svc) if svc.is_not_found() => {
                    tracing::debug!("{} reported no such object", cmd.name);
                    Ok(None)
                }
                _ => Err(err.context(format!("Failed to get object info with [{}]", cmd.name))),
            },
        }
    }

    async fn run(&self, cmd: &Command) -> Result<Value> {
        tracing::info!("run: {}", cmd);

        self.post(cmd).await
    }
}
