//! The bundle container and its entries.

use crate::resources::{Resource, ResourceType};
use crate::{FhirError, FhirResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// http://hl7.org/fhir/valueset-bundle-type.html, restricted to the two types we emit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    /// Independent actions for a server to process. Entries carry a create request.
    #[default]
    Batch,
    /// A set of resources gathered for distribution. Entries carry no request.
    Collection,
}

impl BundleType {
    const NAMES: [&'static str; 2] = ["BATCH", "COLLECTION"];

    pub fn as_str(self) -> &'static str {
        match self {
            BundleType::Batch => "batch",
            BundleType::Collection => "collection",
        }
    }
}

impl fmt::Display for BundleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BundleType {
    type Err = FhirError;

    /// Case-insensitive. The empty string means the default, [`BundleType::Batch`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "BATCH" => Ok(BundleType::Batch),
            "COLLECTION" => Ok(BundleType::Collection),
            _ => Err(FhirError::Configuration(format!(
                "invalid bundle type {:?}, expected one of {:?}",
                s,
                Self::NAMES
            ))),
        }
    }
}

/// http://hl7.org/fhir/valueset-http-verb.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Post,
}

/// How a server should execute an entry. Resources are only ever created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BundleEntryRequest {
    pub method: HttpVerb,
    pub url: String,
}

impl BundleEntryRequest {
    pub fn create(resource_type: ResourceType) -> Self {
        Self {
            method: HttpVerb::Post,
            url: resource_type.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub full_url: String,
    pub resource: Resource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,
}

impl BundleEntry {
    /// Wrap `resource` for a bundle of type `bundle_type`.
    ///
    /// `fullUrl` is always `{ResourceType}/{id}`; the request is only set for batches.
    pub fn new(resource: Resource, bundle_type: BundleType) -> Self {
        let resource_type = resource.resource_type();
        let request = match bundle_type {
            BundleType::Batch => Some(BundleEntryRequest::create(resource_type)),
            BundleType::Collection => None,
        };
        Self {
            full_url: format!("{}/{}", resource_type, resource.id()),
            resource,
            request,
        }
    }
}

/// A FHIR R4 Bundle.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "resourceType", rename = "Bundle")]
pub struct Bundle {
    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn new(bundle_type: BundleType) -> Self {
        Self {
            bundle_type,
            entry: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: BundleEntry) {
        self.entry.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    /// Entries holding a resource of `resource_type`, in bundle order.
    pub fn entries_of(&self, resource_type: ResourceType) -> impl Iterator<Item = &BundleEntry> {
        self.entry
            .iter()
            .filter(move |e| e.resource.resource_type() == resource_type)
    }

    /// Look up an entry by its `fullUrl`.
    pub fn find(&self, full_url: &str) -> Option<&BundleEntry> {
        self.entry.iter().find(|e| e.full_url == full_url)
    }

    pub fn render_json(&self) -> FhirResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn render_json_pretty(&self) -> FhirResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
