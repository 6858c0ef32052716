//! Translation of source-system codes into canonical FHIR codes.
//!
//! Each clinical concept (allergy severity, encounter status, ...) has its own closed set of
//! canonical codes, modelled as an enum implementing [`CanonicalCode`], and its own
//! [`CodeConverter`].
//!
//! Two phases are kept apart:
//! - **Build** validates configuration once at startup. A configured canonical key that is not in
//!   the canonical set is a [`FhirError::Configuration`].
//! - **Translate** runs per resource and never fails. A source code that was never registered
//!   degrades to the concept's `Unspecified` sentinel, which is omitted from the wire output.
//!
//! Lookups are two-tier: compiled-in default aliases first, then aliases from a validated
//! [`MappingConfig`], which win on conflict.

use crate::mapping::{AliasMap, MappingConfig};
use crate::{FhirError, FhirResult};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A closed enumeration of canonical target codes.
pub trait CanonicalCode: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Concept name used in error messages, for example `allergy severity`.
    const CONCEPT: &'static str;

    /// Every valid canonical code. Does not include [`CanonicalCode::UNSPECIFIED`].
    const ALL: &'static [Self];

    /// Sentinel returned when a source code is not mapped.
    const UNSPECIFIED: Self;

    /// The code as written on the wire, for example `in-progress`.
    fn code(self) -> &'static str;

    /// The name configuration may use instead of the wire code, for example `IN_PROGRESS`.
    fn name(self) -> &'static str {
        self.code()
    }

    /// True if `key` names this code, ignoring case and treating `_` and `-` as equal.
    fn matches_key(self, key: &str) -> bool {
        let key = normalise_key(key);
        key == normalise_key(self.code()) || key == normalise_key(self.name())
    }
}

/// Serde helper: true for the sentinel value.
pub fn is_unspecified<C: CanonicalCode>(code: &C) -> bool {
    *code == C::UNSPECIFIED
}

fn normalise_key(key: &str) -> String {
    key.trim().to_uppercase().replace('_', "-")
}

fn alias_key(source: &str) -> String {
    source.trim().to_uppercase()
}

// ============================================================================
// Canonical code sets
// ============================================================================

/// http://hl7.org/fhir/valueset-reaction-event-severity.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllergySeverity {
    Mild,
    Moderate,
    Severe,
    Unspecified,
}

impl CanonicalCode for AllergySeverity {
    const CONCEPT: &'static str = "allergy severity";
    const ALL: &'static [Self] = &[Self::Mild, Self::Moderate, Self::Severe];
    const UNSPECIFIED: Self = Self::Unspecified;

    fn code(self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::Unspecified => "",
        }
    }
}

/// http://hl7.org/fhir/valueset-allergy-intolerance-category.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllergyCategory {
    Food,
    Medication,
    Environment,
    Biologic,
    Unspecified,
}

impl CanonicalCode for AllergyCategory {
    const CONCEPT: &'static str = "allergy type";
    const ALL: &'static [Self] = &[
        Self::Food,
        Self::Medication,
        Self::Environment,
        Self::Biologic,
    ];
    const UNSPECIFIED: Self = Self::Unspecified;

    fn code(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Medication => "medication",
            Self::Environment => "environment",
            Self::Biologic => "biologic",
            Self::Unspecified => "",
        }
    }
}

/// http://hl7.org/fhir/valueset-encounter-status.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterStatusCode {
    Planned,
    Arrived,
    Triaged,
    InProgress,
    Onleave,
    Finished,
    Cancelled,
    EnteredInError,
    Unknown,
    Unspecified,
}

impl CanonicalCode for EncounterStatusCode {
    const CONCEPT: &'static str = "encounter status";
    const ALL: &'static [Self] = &[
        Self::Planned,
        Self::Arrived,
        Self::Triaged,
        Self::InProgress,
        Self::Onleave,
        Self::Finished,
        Self::Cancelled,
        Self::EnteredInError,
        Self::Unknown,
    ];
    const UNSPECIFIED: Self = Self::Unspecified;

    fn code(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Arrived => "arrived",
            Self::Triaged => "triaged",
            Self::InProgress => "in-progress",
            Self::Onleave => "onleave",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::EnteredInError => "entered-in-error",
            Self::Unknown => "unknown",
            Self::Unspecified => "",
        }
    }
}

/// http://hl7.org/fhir/valueset-address-use.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressUse {
    Home,
    Work,
    Temp,
    Old,
    Billing,
    Unspecified,
}

impl CanonicalCode for AddressUse {
    const CONCEPT: &'static str = "address use";
    const ALL: &'static [Self] = &[Self::Home, Self::Work, Self::Temp, Self::Old, Self::Billing];
    const UNSPECIFIED: Self = Self::Unspecified;

    fn code(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Work => "work",
            Self::Temp => "temp",
            Self::Old => "old",
            Self::Billing => "billing",
            Self::Unspecified => "",
        }
    }
}

/// http://hl7.org/fhir/valueset-observation-status.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationStatus {
    Registered,
    Preliminary,
    Final,
    Amended,
    Corrected,
    Cancelled,
    EnteredInError,
    Unknown,
    Unspecified,
}

impl CanonicalCode for ObservationStatus {
    const CONCEPT: &'static str = "observation status";
    const ALL: &'static [Self] = &[
        Self::Registered,
        Self::Preliminary,
        Self::Final,
        Self::Amended,
        Self::Corrected,
        Self::Cancelled,
        Self::EnteredInError,
        Self::Unknown,
    ];
    const UNSPECIFIED: Self = Self::Unspecified;

    fn code(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Preliminary => "preliminary",
            Self::Final => "final",
            Self::Amended => "amended",
            Self::Corrected => "corrected",
            Self::Cancelled => "cancelled",
            Self::EnteredInError => "entered-in-error",
            Self::Unknown => "unknown",
            Self::Unspecified => "",
        }
    }
}

/// http://hl7.org/fhir/valueset-administrative-gender.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdministrativeGender {
    Male,
    Female,
    Other,
    Unknown,
    Unspecified,
}

impl CanonicalCode for AdministrativeGender {
    const CONCEPT: &'static str = "gender";
    const ALL: &'static [Self] = &[Self::Male, Self::Female, Self::Other, Self::Unknown];
    const UNSPECIFIED: Self = Self::Unspecified;

    fn code(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::Unknown => "unknown",
            Self::Unspecified => "",
        }
    }
}

/// Terminologies a [`crate::Coding`] may point at. Serialises as the system URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CodingSystem {
    #[serde(rename = "http://snomed.info/sct")]
    Snomed,
    #[serde(rename = "http://loinc.org")]
    Loinc,
    #[serde(rename = "http://hl7.org/fhir/sid/icd-10")]
    Icd10,
    #[serde(rename = "http://unitsofmeasure.org")]
    Ucum,
    #[serde(rename = "http://www.nlm.nih.gov/research/umls/rxnorm")]
    RxNorm,
    #[serde(rename = "")]
    Unspecified,
}

impl CanonicalCode for CodingSystem {
    const CONCEPT: &'static str = "coding system";
    const ALL: &'static [Self] = &[
        Self::Snomed,
        Self::Loinc,
        Self::Icd10,
        Self::Ucum,
        Self::RxNorm,
    ];
    const UNSPECIFIED: Self = Self::Unspecified;

    fn code(self) -> &'static str {
        match self {
            Self::Snomed => "http://snomed.info/sct",
            Self::Loinc => "http://loinc.org",
            Self::Icd10 => "http://hl7.org/fhir/sid/icd-10",
            Self::Ucum => "http://unitsofmeasure.org",
            Self::RxNorm => "http://www.nlm.nih.gov/research/umls/rxnorm",
            Self::Unspecified => "",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Snomed => "SNOMED_CT",
            Self::Loinc => "LOINC",
            Self::Icd10 => "ICD_10",
            Self::Ucum => "UCUM",
            Self::RxNorm => "RXNORM",
            Self::Unspecified => "",
        }
    }
}

// ============================================================================
// Compiled-in default aliases (HL7 v2 tables where one exists)
// ============================================================================

/// HL7 table 0128.
const DEFAULT_ALLERGY_SEVERITIES: &[(&str, AllergySeverity)] = &[
    ("SV", AllergySeverity::Severe),
    ("MO", AllergySeverity::Moderate),
    ("MI", AllergySeverity::Mild),
];

/// HL7 table 0127.
const DEFAULT_ALLERGY_CATEGORIES: &[(&str, AllergyCategory)] = &[
    ("DA", AllergyCategory::Medication),
    ("FA", AllergyCategory::Food),
    ("EA", AllergyCategory::Environment),
    ("AA", AllergyCategory::Environment),
    ("PA", AllergyCategory::Environment),
    ("LA", AllergyCategory::Environment),
];

const DEFAULT_ENCOUNTER_STATUSES: &[(&str, EncounterStatusCode)] = &[
    ("planned", EncounterStatusCode::Planned),
    ("arrived", EncounterStatusCode::Arrived),
    ("in-progress", EncounterStatusCode::InProgress),
    ("finished", EncounterStatusCode::Finished),
    ("cancelled", EncounterStatusCode::Cancelled),
    ("unknown", EncounterStatusCode::Unknown),
];

const DEFAULT_ADDRESS_USES: &[(&str, AddressUse)] =
    &[("HOME", AddressUse::Home), ("WORK", AddressUse::Work)];

/// HL7 table 0085.
const DEFAULT_OBSERVATION_STATUSES: &[(&str, ObservationStatus)] = &[
    ("C", ObservationStatus::Corrected),
    ("D", ObservationStatus::EnteredInError),
    ("F", ObservationStatus::Final),
    ("I", ObservationStatus::Registered),
    ("P", ObservationStatus::Preliminary),
    ("R", ObservationStatus::Preliminary),
    ("S", ObservationStatus::Preliminary),
    ("W", ObservationStatus::EnteredInError),
    ("X", ObservationStatus::Cancelled),
];

/// HL7 table 0001.
const DEFAULT_GENDERS: &[(&str, AdministrativeGender)] = &[
    ("F", AdministrativeGender::Female),
    ("M", AdministrativeGender::Male),
    ("O", AdministrativeGender::Other),
    ("A", AdministrativeGender::Other),
    ("U", AdministrativeGender::Unknown),
    ("N", AdministrativeGender::Unknown),
];

const DEFAULT_CODING_SYSTEMS: &[(&str, CodingSystem)] = &[
    ("SNOMED", CodingSystem::Snomed),
    ("SNOMED-CT", CodingSystem::Snomed),
    ("SCT", CodingSystem::Snomed),
    ("LN", CodingSystem::Loinc),
    ("LOINC", CodingSystem::Loinc),
    ("I10", CodingSystem::Icd10),
    ("ICD-10", CodingSystem::Icd10),
    ("UCUM", CodingSystem::Ucum),
    ("RXNORM", CodingSystem::RxNorm),
];

// ============================================================================
// Converter
// ============================================================================

/// Maps source-system codes for one concept onto its canonical code set.
#[derive(Clone, Debug)]
pub struct CodeConverter<C> {
    aliases: HashMap<String, C>,
}

impl<C: CanonicalCode> Default for CodeConverter<C> {
    fn default() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }
}

impl<C: CanonicalCode> CodeConverter<C> {
    /// Build a converter from configuration alone.
    ///
    /// `config` maps canonical keys to the source codes that should translate to them.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Configuration`] if any key does not case-insensitively name a member
    /// of `C::ALL`.
    pub fn build(config: &AliasMap) -> FhirResult<Self> {
        Self::default().with_overrides(config)
    }

    /// Build a converter from compiled-in defaults. Cannot fail.
    pub fn from_defaults(defaults: &[(&str, C)]) -> Self {
        Self {
            aliases: defaults
                .iter()
                .map(|(source, canonical)| (alias_key(source), *canonical))
                .collect(),
        }
    }

    /// Two-tier converter: `defaults` first, then `config`, which wins on conflict.
    ///
    /// # Errors
    ///
    /// Same as [`CodeConverter::build`].
    pub fn with_defaults(defaults: &[(&str, C)], config: &AliasMap) -> FhirResult<Self> {
        Self::from_defaults(defaults).with_overrides(config)
    }

    /// Layer validated configuration on top of this converter.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Configuration`] on the first (in key order) invalid canonical key.
    /// Nothing is partially applied.
    pub fn with_overrides(mut self, config: &AliasMap) -> FhirResult<Self> {
        let mut resolved = Vec::new();
        for (key, sources) in config {
            let canonical = Self::canonical(key).ok_or_else(|| {
                FhirError::Configuration(format!(
                    "invalid {} {:?}, needs to be a value in {:?} (case-insensitive)",
                    C::CONCEPT,
                    key,
                    C::ALL.iter().map(|c| c.name()).collect::<Vec<_>>()
                ))
            })?;
            resolved.extend(sources.iter().map(|s| (alias_key(s), canonical)));
        }

        self.aliases.extend(resolved);
        Ok(self)
    }

    /// Resolve a canonical key (wire code or enumeration name) to its code.
    pub fn canonical(key: &str) -> Option<C> {
        C::ALL.iter().copied().find(|c| c.matches_key(key))
    }

    /// Translate a source code, ignoring case. Unmapped codes yield `C::UNSPECIFIED`.
    pub fn translate(&self, source: &str) -> C {
        match self.aliases.get(&alias_key(source)) {
            Some(canonical) => *canonical,
            None => {
                if !source.trim().is_empty() {
                    tracing::debug!("unmapped {} {:?}, leaving unspecified", C::CONCEPT, source);
                }
                C::UNSPECIFIED
            }
        }
    }

    /// Number of registered source codes.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// One converter per concept the bundler translates.
#[derive(Clone, Debug)]
pub struct CodeConverters {
    pub allergy_severity: CodeConverter<AllergySeverity>,
    pub allergy_category: CodeConverter<AllergyCategory>,
    pub encounter_status: CodeConverter<EncounterStatusCode>,
    pub address_use: CodeConverter<AddressUse>,
    pub observation_status: CodeConverter<ObservationStatus>,
    pub gender: CodeConverter<AdministrativeGender>,
    pub coding_system: CodeConverter<CodingSystem>,
}

impl Default for CodeConverters {
    fn default() -> Self {
        Self::defaults()
    }
}

impl CodeConverters {
    /// Converters holding only the compiled-in default aliases.
    pub fn defaults() -> Self {
        Self {
            allergy_severity: CodeConverter::from_defaults(DEFAULT_ALLERGY_SEVERITIES),
            allergy_category: CodeConverter::from_defaults(DEFAULT_ALLERGY_CATEGORIES),
            encounter_status: CodeConverter::from_defaults(DEFAULT_ENCOUNTER_STATUSES),
            address_use: CodeConverter::from_defaults(DEFAULT_ADDRESS_USES),
            observation_status: CodeConverter::from_defaults(DEFAULT_OBSERVATION_STATUSES),
            gender: CodeConverter::from_defaults(DEFAULT_GENDERS),
            coding_system: CodeConverter::from_defaults(DEFAULT_CODING_SYSTEMS),
        }
    }

    /// Default aliases overridden by `mapping`. Every section is validated independently.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Configuration`] if any section names an invalid canonical key.
    pub fn from_mapping(mapping: &MappingConfig) -> FhirResult<Self> {
        let defaults = Self::defaults();
        Ok(Self {
            allergy_severity: defaults
                .allergy_severity
                .with_overrides(&mapping.allergy_severities)?,
            allergy_category: defaults
                .allergy_category
                .with_overrides(&mapping.allergy_types)?,
            encounter_status: defaults
                .encounter_status
                .with_overrides(&mapping.encounter_statuses)?,
            address_use: defaults.address_use.with_overrides(&mapping.address_uses)?,
            observation_status: defaults
                .observation_status
                .with_overrides(&mapping.observation_statuses)?,
            gender: defaults.gender.with_overrides(&mapping.genders)?,
            coding_system: defaults
                .coding_system
                .with_overrides(&mapping.coding_systems)?,
        })
    }
}
