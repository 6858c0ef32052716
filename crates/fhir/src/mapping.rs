//! YAML mapping configuration for the code converters.
//!
//! Each section maps a canonical key to the source codes that should translate to it:
//!
//! ```yaml
//! allergy_severities:
//!   severe: [SV, SEVERE]
//!   mild: [MI]
//! encounter_statuses:
//!   in_progress: [IP]
//! ```
//!
//! Parsing is strict: unknown sections are rejected with the path of the offending key. Whether
//! each canonical key is valid is checked later, when the converters are built from this value
//! (see [`crate::CodeConverters::from_mapping`]).

use crate::FhirError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical key → source code aliases.
pub type AliasMap = BTreeMap<String, Vec<String>>;

/// User-supplied alias configuration, one section per converter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MappingConfig {
    pub allergy_severities: AliasMap,
    pub allergy_types: AliasMap,
    pub encounter_statuses: AliasMap,
    pub address_uses: AliasMap,
    pub observation_statuses: AliasMap,
    pub genders: AliasMap,
    pub coding_systems: AliasMap,
}

impl MappingConfig {
    /// Parse a mapping configuration from YAML text.
    ///
    /// This uses `serde_path_to_error` to surface a best-effort "path" (e.g. `genders.female`)
    /// to the failing field when the YAML does not match the schema. Empty input yields the empty
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Configuration`] if the YAML is malformed, has an unknown section, or a
    /// section value has the wrong shape.
    pub fn parse(yaml_text: &str) -> Result<Self, FhirError> {
        if yaml_text.trim().is_empty() {
            return Ok(Self::default());
        }

        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        serde_path_to_error::deserialize::<_, MappingConfig>(deserializer).map_err(|err| {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            FhirError::Configuration(format!("mapping schema mismatch at {path}: {source}"))
        })
    }
}
