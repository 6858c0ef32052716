//! Encounters and everything that happens during one.

use crate::{join_non_empty, CodedElement, Doctor};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an encounter as tracked by the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterStatus {
    Planned,
    Arrived,
    InProgress,
    Finished,
    Cancelled,
    #[default]
    Unknown,
}

impl EncounterStatus {
    /// Returns the internal status name, for example `in-progress`.
    pub fn as_str(self) -> &'static str {
        match self {
            EncounterStatus::Planned => "planned",
            EncounterStatus::Arrived => "arrived",
            EncounterStatus::InProgress => "in-progress",
            EncounterStatus::Finished => "finished",
            EncounterStatus::Cancelled => "cancelled",
            EncounterStatus::Unknown => "unknown",
        }
    }
}

/// A single visit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Encounter {
    pub status: EncounterStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,

    /// Ordered, oldest first.
    pub status_history: Vec<StatusHistory>,

    /// Ordered, oldest first. Consecutive entries may point at the same location.
    pub location_history: Vec<LocationHistory>,

    pub procedures: Vec<DiagnosisOrProcedure>,
    pub diagnoses: Vec<DiagnosisOrProcedure>,
    pub orders: Vec<Order>,
}

impl Encounter {
    /// Human-readable summary: the status followed by the start and end times that are known.
    pub fn text(&self) -> String {
        let mut lines = vec![format!("Status: {}", self.status.as_str())];
        if let Some(start) = self.start {
            lines.push(format!(
                "Start: {}",
                start.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if let Some(end) = self.end {
            lines.push(format!(
                "End: {}",
                end.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        lines.join("\n")
    }
}

/// One past state of an encounter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusHistory {
    pub status: EncounterStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Where the patient was during an interval of an encounter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationHistory {
    pub location: Option<Location>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// A place in the hospital.
///
/// Compared by full structural equality: this is a value, not an entity, until it is
/// materialised as a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub facility: String,
    pub building: String,
    pub floor: String,
    pub point_of_care: String,
    pub room: String,
    pub bed: String,
}

impl Location {
    /// Most specific parts first, for example `Ward 3, Room 12, Bed 4, St Elsewhere`.
    pub fn name(&self) -> String {
        join_non_empty(
            [
                self.point_of_care.as_str(),
                self.room.as_str(),
                self.bed.as_str(),
                self.facility.as_str(),
                self.building.as_str(),
                self.floor.as_str(),
            ],
            ", ",
        )
    }
}

/// A diagnosis or a procedure; the two share a shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisOrProcedure {
    pub clinician: Option<Doctor>,
    pub date_time: Option<DateTime<Utc>>,
    pub description: Option<CodedElement>,

    /// Free-text category. Only meaningful for procedures.
    pub procedure_type: String,
}

impl DiagnosisOrProcedure {
    /// The description's display text, or an empty string when there is no description.
    pub fn text(&self) -> String {
        self.description
            .as_ref()
            .map(|d| d.text.clone())
            .unwrap_or_default()
    }
}

/// A test order and its results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_profile: Option<CodedElement>,
    pub placer: String,
    pub order_date_time: Option<DateTime<Utc>>,
    pub results: Vec<LabResult>,
}

/// One result of an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabResult {
    pub test_name: Option<CodedElement>,
    pub value: String,
    pub unit: String,

    /// Source-system result status (for example `F` for final).
    pub status: String,

    pub notes: Vec<String>,
    pub observation_date_time: Option<DateTime<Utc>>,
}

impl LabResult {
    /// The test name's display text, or an empty string when there is no test name.
    pub fn text(&self) -> String {
        self.test_name
            .as_ref()
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }
}
