//! FHIR R4 complex datatypes, as far as the bundler needs them.
//!
//! Only serialisation is supported: these structs are an output boundary. Field names follow
//! the FHIR JSON spelling through `rename_all = "camelCase"`; empty optional fields are omitted.

use crate::codes::{is_unspecified, AddressUse};
use crate::resources::ResourceType;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// A typed pointer to another resource, `{ResourceType}/{id}`.
///
/// `display` is cosmetic; compare references with [`Reference::same_target`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub reference: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn new(resource_type: ResourceType, id: &str) -> Self {
        Self {
            reference: format!("{}/{}", resource_type, id),
            display: None,
        }
    }

    /// Attach a display string. An empty display is dropped.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = non_empty(display.into());
        self
    }

    /// Splits the reference into resource type name and id.
    pub fn target(&self) -> Option<(&str, &str)> {
        self.reference.split_once('/')
    }

    /// True if both references point at the same resource, whatever their display.
    pub fn same_target(&self, other: &Reference) -> bool {
        self.reference == other.reference
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CodeableConcept {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// A concept carrying only free text.
    pub fn from_text(text: &str) -> Self {
        Self {
            coding: Vec::new(),
            text: non_empty(text.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HumanName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prefix: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suffix: Vec<String>,
}

/// http://hl7.org/fhir/valueset-address-type.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Postal,
    Physical,
    Both,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(rename = "use", skip_serializing_if = "is_unspecified")]
    pub address_use: AddressUse,

    #[serde(rename = "type")]
    pub address_type: AddressType,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub line: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPointSystem {
    Phone,
    Email,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPointUse {
    Home,
    Work,
    Mobile,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContactPoint {
    pub system: ContactPointSystem,
    pub value: String,

    #[serde(rename = "use")]
    pub contact_use: ContactPointUse,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl Period {
    /// `None` when neither bound is known.
    pub fn from_times(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<Self> {
        if start.is_none() && end.is_none() {
            return None;
        }
        Some(Self {
            start: date_time(start),
            end: date_time(end),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub text: String,
}

/// `value` keeps the decimal text it was parsed from, so `4.10` stays `4.10` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Quantity {
    pub value: serde_json::Number,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparator: Option<QuantityComparator>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum QuantityComparator {
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
}

impl QuantityComparator {
    /// Split a leading comparator off `value`. Two-character prefixes are tried first.
    pub fn split(value: &str) -> (Option<Self>, &str) {
        const PREFIXES: [(&str, QuantityComparator); 4] = [
            ("<=", QuantityComparator::LessOrEqual),
            (">=", QuantityComparator::GreaterOrEqual),
            ("<", QuantityComparator::LessThan),
            (">", QuantityComparator::GreaterThan),
        ];
        for (prefix, comparator) in PREFIXES {
            if let Some(rest) = value.strip_prefix(prefix) {
                return (Some(comparator), rest.trim_start());
            }
        }
        (None, value)
    }
}

/// FHIR `dateTime` at second precision, in UTC.
pub(crate) fn date_time(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// FHIR `date`.
pub(crate) fn date(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.format("%Y-%m-%d").to_string())
}

pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
