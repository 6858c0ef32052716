//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The mapping file is read and validated here, so a bad mapping
//! stops the process before any record is touched.

use crate::{CoreError, CoreResult};
use fhir::{BundleType, CodeConverters, MappingConfig, RegistryScope};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug, Default)]
pub struct CoreConfig {
    bundle_type: BundleType,
    registry_scope: RegistryScope,
    mapping_path: Option<PathBuf>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if `mapping_path` is given but is not a file.
    pub fn new(
        bundle_type: BundleType,
        registry_scope: RegistryScope,
        mapping_path: Option<PathBuf>,
    ) -> CoreResult<Self> {
        if let Some(path) = &mapping_path {
            if !path.is_file() {
                return Err(CoreError::InvalidInput(format!(
                    "mapping file {} does not exist or is not a file",
                    path.display()
                )));
            }
        }

        if registry_scope == RegistryScope::Session {
            tracing::warn!(
                "session registry scope: bundles after the first may reference locations and practitioners they do not contain"
            );
        }

        Ok(Self {
            bundle_type,
            registry_scope,
            mapping_path,
        })
    }

    pub fn bundle_type(&self) -> BundleType {
        self.bundle_type
    }

    pub fn registry_scope(&self) -> RegistryScope {
        self.registry_scope
    }

    pub fn mapping_path(&self) -> Option<&Path> {
        self.mapping_path.as_deref()
    }

    /// Read the configured mapping file. Without one, the mapping is empty.
    pub fn load_mapping(&self) -> CoreResult<MappingConfig> {
        match &self.mapping_path {
            Some(path) => load_mapping_file(path),
            None => Ok(MappingConfig::default()),
        }
    }

    /// Default converters overridden by the configured mapping.
    pub fn code_converters(&self) -> CoreResult<CodeConverters> {
        let mapping = self.load_mapping()?;
        Ok(CodeConverters::from_mapping(&mapping)?)
    }
}

/// Read and parse a YAML mapping file.
pub fn load_mapping_file(path: &Path) -> CoreResult<MappingConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| CoreError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mapping = MappingConfig::parse(&text)?;
    tracing::debug!("loaded code mapping from {}", path.display());
    Ok(mapping)
}
