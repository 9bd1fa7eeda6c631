//! Declarative management of IBM Storage Virtualize systems over REST.
//!
//! - [`config`] - connection settings and their sources
//! - [`svc`] - REST transport, authentication and the [`svc::SvcApi`] seam
//! - [`modules`] - the management modules and the invocation harness
//! - [`resource`] - the gather-subset table behind the info module

pub mod config;
pub mod modules;
pub mod resource;
pub mod svc;
