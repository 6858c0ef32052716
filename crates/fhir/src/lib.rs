//! FHIR R4 bundle generation for simulated clinical records.
//!
//! This crate turns a [`simhosp_ir::ClinicalRecord`] into a [`Bundle`] of FHIR R4 resources:
//! - [`CodeConverters`] translate source-system codes into canonical FHIR codes
//! - [`ReferenceRegistry`] deduplicates locations and practitioners
//! - [`Bundler`] walks the record and wires references between resources
//!
//! The resource structs are an output boundary: they serialise to FHIR JSON and are never read
//! back. Configuration problems (an invalid mapping, an unknown bundle type) surface as
//! [`FhirError::Configuration`] when converters and bundlers are built. Gaps in the data itself
//! never fail a build: unmapped codes are left out of the output and absent clinicians or
//! locations produce no resource.

pub mod bundle;
pub mod bundler;
pub mod codes;
pub mod datatypes;
pub mod mapping;
pub mod narrative;
pub mod registry;
pub mod resources;

pub use bundle::{Bundle, BundleEntry, BundleEntryRequest, BundleType, HttpVerb};
pub use bundler::Bundler;
pub use codes::{
    AddressUse, AdministrativeGender, AllergyCategory, AllergySeverity, CanonicalCode,
    CodeConverter, CodeConverters, CodingSystem, EncounterStatusCode, ObservationStatus,
};
pub use datatypes::{CodeableConcept, Coding, Reference};
pub use mapping::{AliasMap, MappingConfig};
pub use narrative::{narrative, Narrative, NarrativeStatus};
pub use registry::{Deduplicated, ReferenceRegistry, RegistryScope};
pub use resources::{Resource, ResourceType};

/// Errors returned by the `fhir` crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    /// A mapping, bundle type or registry scope could not be accepted. Raised while building,
    /// never while translating.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
