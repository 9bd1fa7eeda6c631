//! HTTP utilities for Storage Virtualize REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Message codes the appliance returns when the addressed object is missing
const NOT_FOUND_CODES: &[&str] = &["CMMVC5753E", "CMMVC5804E"];

/// Errors raised by the REST transport
#[derive(Debug, thiserror::Error)]
pub enum SvcError {
    /// Credentials were rejected or no session could be established
    #[error("Authentication failed: {0}")]
    Auth(String),
    /// The appliance answered with a non-success status
    #[error("REST API error [{status}]: {message}")]
    Api { status: u16, message: String },
}

impl SvcError {
    /// Vendor message code embedded in the error text, e.g. `CMMVC5753E`
    pub fn vendor_code(&self) -> Option<&str> {
        match self {
            SvcError::Api { message, .. } => find_vendor_code(message),
            SvcError::Auth(_) => None,
        }
    }

    /// True when the appliance reports that the addressed object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            SvcError::Api { status, .. } if *status == StatusCode::NOT_FOUND.as_u16() => true,
            SvcError::Api { .. } => self
                .vendor_code()
                .is_some_and(|code| NOT_FOUND_CODES.contains(&code)),
            SvcError::Auth(_) => false,
        }
    }
}

/// Locate the first `CMMVCnnnnX` message code in a vendor message
pub fn find_vendor_code(message: &str) -> Option<&str> {
    let mut offset = 0;
    while let Some(pos) = message[offset..].find("CMMVC") {
        let start = offset + pos;
        let end = start + 10;
        if let Some(candidate) = message.get(start..end) {
            let tail = candidate.as_bytes();
            if tail[5..9].iter().all(u8::is_ascii_digit) && tail[9].is_ascii_uppercase() {
                return Some(candidate);
            }
        }
        offset = start + 5;
    }
    None
}

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Extract the human readable vendor message from an error body.
/// The appliance answers either with plain text or with a JSON string.
fn vendor_message(body: &str) -> String {
    let trimmed = body.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) => s.trim().to_string(),
        Ok(Value::Object(obj)) => obj
            .get("message")
            .or_else(|| obj.get("error"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| trimmed.to_string()),
        _ => trimmed.to_string(),
    }
}

/// HTTP client wrapper for REST API calls
#[derive(Clone)]
pub struct SvcHttpClient {
    client: Client,
}

impl SvcHttpClient {
    /// Create a new HTTP client
    pub fn new(validate_certs: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("svctl/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!validate_certs)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Exchange username and password for a session token
    pub async fn authenticate(&self, url: &Url, username: &str, password: &str) -> Result<String> {
        tracing::debug!("POST {} (user: {})", url, username);

        let response = self
            .client
            .post(url.clone())
            .header("X-Auth-Username", username)
            .header("X-Auth-Password", password)
            .send()
            .await
            .context("Failed to send authentication request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read authentication response")?;

        if !status.is_success() {
            tracing::error!("Authentication error: {} - {}", status, sanitize_for_log(&body));
            return Err(SvcError::Auth(format!("{} {}", status.as_u16(), vendor_message(&body))).into());
        }

        let parsed: Value =
            serde_json::from_str(&body).context("Failed to parse authentication response")?;
        parsed
            .get("token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SvcError::Auth("response did not contain a token".to_string()).into())
    }

    /// POST a command with its options to the REST API
    pub async fn post(&self, url: &Url, token: &str, body: &Map<String, Value>) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url.clone())
            .header("X-Auth-Token", token)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(SvcError::Auth(format!("{} {}", status.as_u16(), vendor_message(&response_body))).into());
        }

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(SvcError::Api {
                status: status.as_u16(),
                message: vendor_message(&response_body),
            }
            .into());
        }

        // Handle empty response
        if response_body.trim().is_empty() {
            return Ok(Value::Null);
        }

        match serde_json::from_str(&response_body) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(response_body.trim().to_string())),
        }
    }
}

/// Format a REST error for the result bundle
pub fn format_svc_error(error: &anyhow::Error) -> String {
    if let Some(SvcError::Auth(detail)) = error.downcast_ref::<SvcError>() {
        return format!(
            "Authentication failed ({}). Check username, password or token.",
            detail
        );
    }
    // Keep the whole context chain so the vendor code stays visible
    format!("{:#}", error)
}
