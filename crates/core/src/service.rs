//! Record input and bundle generation for the CLI.

use crate::config::CoreConfig;
use crate::{CoreError, CoreResult};
use fhir::{Bundle, Bundler};
use simhosp_ir::ClinicalRecord;
use simhosp_uuid::{IdGenerator, UuidIdGenerator};
use std::path::Path;
use std::sync::Arc;

/// Builds bundles for a stream of clinical records with one configured [`Bundler`].
#[derive(Debug)]
pub struct BundleService {
    bundler: Bundler,
}

impl BundleService {
    /// A service with random UUID identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured mapping cannot be read or is invalid.
    pub fn from_config(config: &CoreConfig) -> CoreResult<Self> {
        Self::with_id_generator(config, Arc::new(UuidIdGenerator::new()))
    }

    pub fn with_id_generator(
        config: &CoreConfig,
        id_generator: Arc<dyn IdGenerator>,
    ) -> CoreResult<Self> {
        let converters = config.code_converters()?;
        let bundler = Bundler::new(config.bundle_type(), converters, id_generator)
            .with_registry_scope(config.registry_scope());
        Ok(Self { bundler })
    }

    pub fn bundler(&self) -> &Bundler {
        &self.bundler
    }

    pub fn generate(&mut self, record: &ClinicalRecord) -> CoreResult<Bundle> {
        Ok(self.bundler.generate(record)?)
    }

    /// One bundle per record, in order. Stops at the first invalid record.
    pub fn generate_all(&mut self, records: &[ClinicalRecord]) -> CoreResult<Vec<Bundle>> {
        records.iter().map(|r| self.generate(r)).collect()
    }

    /// Render a bundle as JSON text.
    pub fn render(bundle: &Bundle, pretty: bool) -> CoreResult<String> {
        let rendered = if pretty {
            serde_json::to_string_pretty(bundle)
        } else {
            serde_json::to_string(bundle)
        };
        rendered.map_err(CoreError::Serialization)
    }
}

/// Parse clinical records from JSON text: either one record object or an array of them.
///
/// This uses `serde_path_to_error` to surface a best-effort "path" (e.g.
/// `[1].encounters[0].status`) to the failing field.
pub fn parse_records(json_text: &str) -> CoreResult<Vec<ClinicalRecord>> {
    let value: serde_json::Value = serde_json::from_str(json_text)
        .map_err(|e| CoreError::RecordParse(format!("invalid JSON: {e}")))?;

    let parsed = if value.is_array() {
        serde_path_to_error::deserialize::<_, Vec<ClinicalRecord>>(value)
    } else {
        serde_path_to_error::deserialize::<_, ClinicalRecord>(value).map(|r| vec![r])
    };

    parsed.map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        CoreError::RecordParse(format!("record schema mismatch at {path}: {source}"))
    })
}

/// Read and parse clinical records from a JSON file.
pub fn read_records(path: &Path) -> CoreResult<Vec<ClinicalRecord>> {
    let text = std::fs::read_to_string(path).map_err(|source| CoreError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&text)
}
