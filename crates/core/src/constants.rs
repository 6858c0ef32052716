//! Constants used throughout the simhosp core crate.
//!
//! Environment variable names live here so the binary and the docs agree on them.

/// Environment variable selecting the bundle type (`batch` or `collection`).
pub const BUNDLE_TYPE_ENV: &str = "SIMHOSP_BUNDLE_TYPE";

/// Environment variable selecting the registry scope (`per-bundle` or `session`).
pub const REGISTRY_SCOPE_ENV: &str = "SIMHOSP_REGISTRY_SCOPE";

/// Environment variable pointing at a YAML code mapping file.
pub const MAPPING_PATH_ENV: &str = "SIMHOSP_FHIR_MAPPING";

/// Tracing directives applied on top of `RUST_LOG`. Targets match by prefix, so `simhosp`
/// covers the `simhosp` binary and `simhosp_core`.
pub const DEFAULT_LOG_DIRECTIVES: &[&str] = &["simhosp=info", "fhir=info"];
