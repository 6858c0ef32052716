use serde::{Deserialize, Serialize};

/// A (code, display text, coding system) triple.
///
/// `coding_system` is the source-system name (for example `SNOMED-CT`), not a URI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CodedElement {
    pub id: String,
    pub text: String,
    pub coding_system: String,
}

impl CodedElement {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        coding_system: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            coding_system: coding_system.into(),
        }
    }
}
