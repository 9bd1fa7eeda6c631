//! Gather-subset layer
//!
//! The info module is data driven. Subset definitions are loaded from a JSON
//! file at compile time, so a new listing can be reported without code
//! changes.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches subset definitions from embedded JSON
//! - [`fetcher`] - Runs the listing commands behind a subset
//!
//! # Example
//!
//! ```ignore
//! use crate::resource::{fetch_subset, get_subset};
//! use crate::svc::SvcClient;
//!
//! async fn list_hosts(client: &SvcClient) -> anyhow::Result<Vec<serde_json::Value>> {
//!     let subset = get_subset("host").unwrap();
//!     fetch_subset(client, subset, None).await
//! }
//! ```

mod fetcher;
mod registry;

pub use fetcher::{fetch_subset, fetch_subsets};
pub use registry::*;
