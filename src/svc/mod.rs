//! Storage Virtualize REST interaction
//!
//! # Module Structure
//!
//! - [`api`] - the `SvcApi` trait and the `Command` value every module builds
//! - [`auth`] - session token handling
//! - [`client`] - `SvcClient`, the HTTP implementation of `SvcApi`
//! - [`http`] - HTTP utilities and the `SvcError` taxonomy
//!
//! # Example
//!
//! ```ignore
//! use svctl::svc::{Command, SvcApi, SvcClient};
//!
//! async fn example(connection: &svctl::config::Connection) -> anyhow::Result<()> {
//!     let client = SvcClient::new(connection)?;
//!     let groups = client.obj_info(&Command::new("lsvolumegroup")).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod http;

pub use api::{attr, created_id, decode, fetch_record, first_record, records, Command, SvcApi};
pub use client::SvcClient;
pub use http::{format_svc_error, SvcError};
