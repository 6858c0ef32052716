//! The closed set of resources the bundler produces.
//!
//! [`Resource`] is serialised with an internal `resourceType` tag, which is exactly how FHIR
//! JSON discriminates resources. Adding a resource kind means adding a variant, and the
//! exhaustive matches below point at every place that needs to know about it.

use crate::codes::{
    is_unspecified, AdministrativeGender, AllergyCategory, AllergySeverity, EncounterStatusCode,
    ObservationStatus,
};
use crate::datatypes::{
    Address, Annotation, CodeableConcept, Coding, ContactPoint, HumanName, Identifier, Period,
    Quantity, Reference,
};
use crate::narrative::Narrative;
use serde::Serialize;
use std::fmt;

/// Resource type names, as used in `fullUrl`, references and request URLs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Patient,
    AllergyIntolerance,
    Encounter,
    Location,
    Procedure,
    Condition,
    Observation,
    Practitioner,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::AllergyIntolerance => "AllergyIntolerance",
            ResourceType::Encounter => "Encounter",
            ResourceType::Location => "Location",
            ResourceType::Procedure => "Procedure",
            ResourceType::Condition => "Condition",
            ResourceType::Observation => "Observation",
            ResourceType::Practitioner => "Practitioner",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    Patient(Patient),
    AllergyIntolerance(AllergyIntolerance),
    Encounter(Encounter),
    Location(Location),
    Procedure(Procedure),
    Condition(Condition),
    Observation(Observation),
    Practitioner(Practitioner),
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::Patient(_) => ResourceType::Patient,
            Resource::AllergyIntolerance(_) => ResourceType::AllergyIntolerance,
            Resource::Encounter(_) => ResourceType::Encounter,
            Resource::Location(_) => ResourceType::Location,
            Resource::Procedure(_) => ResourceType::Procedure,
            Resource::Condition(_) => ResourceType::Condition,
            Resource::Observation(_) => ResourceType::Observation,
            Resource::Practitioner(_) => ResourceType::Practitioner,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Resource::Patient(r) => &r.id,
            Resource::AllergyIntolerance(r) => &r.id,
            Resource::Encounter(r) => &r.id,
            Resource::Location(r) => &r.id,
            Resource::Procedure(r) => &r.id,
            Resource::Condition(r) => &r.id,
            Resource::Observation(r) => &r.id,
            Resource::Practitioner(r) => &r.id,
        }
    }

    /// Every reference this resource holds to another resource.
    pub fn references(&self) -> Vec<&Reference> {
        match self {
            Resource::Patient(_) | Resource::Location(_) | Resource::Practitioner(_) => Vec::new(),
            Resource::AllergyIntolerance(r) => vec![&r.patient],
            Resource::Encounter(r) => r
                .subject
                .iter()
                .chain(r.diagnosis.iter().map(|d| &d.condition))
                .chain(r.location.iter().map(|l| &l.location))
                .collect(),
            Resource::Procedure(r) => std::iter::once(&r.subject)
                .chain(r.encounter.iter())
                .chain(r.performer.iter().map(|p| &p.actor))
                .collect(),
            Resource::Condition(r) => std::iter::once(&r.subject)
                .chain(r.encounter.iter())
                .chain(r.recorder.iter())
                .collect(),
            Resource::Observation(r) => std::iter::once(&r.subject)
                .chain(r.encounter.iter())
                .collect(),
        }
    }
}

// ============================================================================
// Patient
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub telecom: Vec<ContactPoint>,

    #[serde(skip_serializing_if = "is_unspecified")]
    pub gender: AdministrativeGender,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deceased_boolean: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deceased_date_time: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<Address>,
}

// ============================================================================
// AllergyIntolerance
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllergyIntoleranceType {
    Allergy,
    Intolerance,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllergyIntolerance {
    pub id: String,

    pub clinical_status: CodeableConcept,

    #[serde(rename = "type")]
    pub allergy_type: AllergyIntoleranceType,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<AllergyCategory>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    pub patient: Reference,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_date: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reaction: Vec<AllergyReaction>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AllergyReaction {
    pub manifestation: Vec<CodeableConcept>,

    #[serde(skip_serializing_if = "is_unspecified")]
    pub severity: AllergySeverity,
}

// ============================================================================
// Encounter
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(skip_serializing_if = "is_unspecified")]
    pub status: EncounterStatusCode,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status_history: Vec<EncounterStatusHistory>,

    /// Left out when the record carries no class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<Coding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnosis: Vec<EncounterDiagnosis>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub location: Vec<EncounterLocation>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EncounterStatusHistory {
    #[serde(skip_serializing_if = "is_unspecified")]
    pub status: EncounterStatusCode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

/// Points at a Condition or a Procedure.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EncounterDiagnosis {
    pub condition: Reference,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EncounterLocation {
    pub location: Reference,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

// ============================================================================
// Location and Practitioner
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Location {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Practitioner {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,
}

// ============================================================================
// Procedure and Condition
// ============================================================================

/// http://hl7.org/fhir/valueset-event-status.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    Preparation,
    InProgress,
    NotDone,
    OnHold,
    Stopped,
    Completed,
    EnteredInError,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,

    pub status: EventStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    pub subject: Reference,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub performed_date_time: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub performer: Vec<ProcedurePerformer>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcedurePerformer {
    pub actor: Reference,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    pub subject: Reference,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorder: Option<Reference>,
}

// ============================================================================
// Observation
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Narrative>,

    #[serde(skip_serializing_if = "is_unspecified")]
    pub status: ObservationStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    pub subject: Reference,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,
}
