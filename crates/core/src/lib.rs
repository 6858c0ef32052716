//! # simhosp Core
//!
//! Startup configuration and record handling around the `fhir` bundle builder.
//!
//! This crate contains:
//! - [`config::CoreConfig`], resolved once at startup (bundle type, registry scope, mapping file)
//! - [`service::BundleService`], which reads clinical records and turns each into a bundle
//!
//! **No CLI concerns**: argument parsing and logging setup belong in the `simhosp` binary.

pub mod config;
pub mod constants;
pub mod error;
pub mod service;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use service::{parse_records, read_records, BundleService};
