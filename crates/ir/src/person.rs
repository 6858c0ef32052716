//! People: the patient and the clinicians who treat them.

use crate::join_non_empty;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Patient identity and demographics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Person {
    /// Medical record number.
    pub mrn: String,

    pub prefix: String,
    pub first_name: String,
    pub middle_name: String,
    pub surname: String,
    pub suffix: String,

    /// Source-system gender code (for example `F`).
    pub gender: String,

    pub birth: Option<DateTime<Utc>>,
    pub date_of_death: Option<DateTime<Utc>>,

    /// Non-empty when the patient is known to have died, even without a date of death.
    pub death_indicator: String,

    pub address: Option<Address>,
    pub phone_number: String,
}

impl Person {
    /// Returns every name part that is present, in conventional order.
    ///
    /// For example `Dr John Paul Smith Jr`.
    pub fn full_name(&self) -> String {
        join_non_empty(
            [
                self.prefix.as_str(),
                self.first_name.as_str(),
                self.middle_name.as_str(),
                self.surname.as_str(),
                self.suffix.as_str(),
            ],
            " ",
        )
    }

    /// Human-readable summary: name, MRN and date of birth when known.
    pub fn text(&self) -> String {
        let mut lines = vec![self.full_name()];
        if !self.mrn.is_empty() {
            lines.push(format!("MRN: {}", self.mrn));
        }
        if let Some(birth) = self.birth {
            lines.push(format!("Date of birth: {}", birth.format("%Y-%m-%d")));
        }
        lines.retain(|l| !l.is_empty());
        lines.join("\n")
    }
}

/// A postal address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub first_line: String,
    pub second_line: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,

    /// Source-system address type (for example `HOME`).
    pub address_type: String,
}

/// A clinician.
///
/// Compared by full structural equality: two doctors with identical fields are the same person.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Doctor {
    pub id: String,
    pub first_name: String,
    pub surname: String,
    pub prefix: String,
}

impl Doctor {
    /// Returns the prefix, first name and surname that are present, for example `Dr Jane Doe`.
    pub fn full_name(&self) -> String {
        join_non_empty(
            [
                self.prefix.as_str(),
                self.first_name.as_str(),
                self.surname.as_str(),
            ],
            " ",
        )
    }
}
