//! Internal representation of a synthetic clinical record.
//!
//! A [`ClinicalRecord`] is produced upstream by the simulation layer and consumed read-only by
//! the bundle builder in the `fhir` crate. Codes in this crate are source-system codes (for
//! example HL7 v2 table values); translation to canonical target codes happens at the boundary.
//!
//! All types derive serde so that records can be supplied as JSON. Every field is defaulted,
//! which lets partially populated records through; whether such a record is usable is decided by
//! the consumer.
//!
//! [`Location`] and [`Doctor`] are value types: two instances with identical fields denote the
//! same real-world entity, which is why both derive `Eq` and `Hash`.

mod coded;
mod encounter;
mod person;

pub use coded::CodedElement;
pub use encounter::{
    DiagnosisOrProcedure, Encounter, EncounterStatus, LabResult, Location, LocationHistory, Order,
    StatusHistory,
};
pub use person::{Address, Doctor, Person};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate root for one patient's simulated history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalRecord {
    /// The patient. A record without a person is invalid.
    pub person: Option<Person>,

    /// Administrative visit identifier.
    pub visit_id: String,

    /// Patient class (for example `INPATIENT`), copied to every encounter.
    pub class: String,

    pub encounters: Vec<Encounter>,

    pub allergies: Vec<Allergy>,
}

/// A recorded allergy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Allergy {
    /// Source-system allergy type code (for example `FA` for food).
    pub allergy_type: String,

    pub description: CodedElement,

    /// Source-system severity code (for example `SV`).
    pub severity: String,

    /// Free-text reaction.
    pub reaction: String,

    pub identification_date_time: Option<DateTime<Utc>>,
}

/// Joins the non-empty parts with `separator`.
pub(crate) fn join_non_empty<'a>(
    parts: impl IntoIterator<Item = &'a str>,
    separator: &str,
) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}
