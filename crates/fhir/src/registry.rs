//! Deduplication of shared entities while a bundle is assembled.
//!
//! Locations and clinicians are values in the clinical record: every location-history entry and
//! every procedure carries its own copy. The [`ReferenceRegistry`] turns those values into
//! entities. The first time a value is seen its resource is created; afterwards the same
//! reference is handed out and no new resource is produced.
//!
//! How long a registry lives is the caller's decision, see [`RegistryScope`].

use crate::bundle::BundleEntry;
use crate::datatypes::Reference;
use crate::{FhirError, FhirResult};
use simhosp_ir::{Doctor, Location};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// A value type that is materialised at most once per registry.
pub trait Deduplicated: Clone + Eq + Hash {
    /// Used in log lines.
    const KIND: &'static str;

    #[doc(hidden)]
    fn slot(registry: &mut ReferenceRegistry) -> &mut HashMap<Self, Reference>;
}

impl Deduplicated for Location {
    const KIND: &'static str = "location";

    fn slot(registry: &mut ReferenceRegistry) -> &mut HashMap<Self, Reference> {
        &mut registry.locations
    }
}

impl Deduplicated for Doctor {
    const KIND: &'static str = "practitioner";

    fn slot(registry: &mut ReferenceRegistry) -> &mut HashMap<Self, Reference> {
        &mut registry.doctors
    }
}

/// Maps each structurally distinct value to the reference of the resource created for it.
#[derive(Clone, Debug, Default)]
pub struct ReferenceRegistry {
    locations: HashMap<Location, Reference>,
    doctors: HashMap<Doctor, Reference>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing reference for `value`, or create its resource with `factory`.
    ///
    /// The entry is `Some` only on first sight; the caller must add it to the bundle. The
    /// factory is not called on a hit.
    pub fn get_or_create<T, F>(&mut self, value: &T, factory: F) -> (Option<BundleEntry>, Reference)
    where
        T: Deduplicated,
        F: FnOnce() -> (BundleEntry, Reference),
    {
        let slot = T::slot(self);
        if let Some(existing) = slot.get(value) {
            tracing::debug!("reusing {} {}", T::KIND, existing.reference);
            return (None, existing.clone());
        }

        let (entry, reference) = factory();
        slot.insert(value.clone(), reference.clone());
        (Some(entry), reference)
    }

    /// Number of distinct locations registered.
    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    /// Number of distinct practitioners registered.
    pub fn practitioner_count(&self) -> usize {
        self.doctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.doctors.is_empty()
    }

    pub fn clear(&mut self) {
        self.locations.clear();
        self.doctors.clear();
    }
}

/// How long deduplication state lives on a [`crate::Bundler`].
///
/// - `PerBundle`: a fresh registry for every `generate` call. Each bundle is self-contained.
/// - `Session`: one registry for the bundler's lifetime. A location or practitioner seen in an
///   earlier bundle is referenced but not repeated, so later bundles can hold references that
///   resolve only against earlier ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegistryScope {
    #[default]
    PerBundle,
    Session,
}

impl RegistryScope {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistryScope::PerBundle => "per-bundle",
            RegistryScope::Session => "session",
        }
    }
}

impl fmt::Display for RegistryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistryScope {
    type Err = FhirError;

    fn from_str(s: &str) -> FhirResult<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "" | "per-bundle" => Ok(RegistryScope::PerBundle),
            "session" => Ok(RegistryScope::Session),
            _ => Err(FhirError::Configuration(format!(
                "invalid registry scope {:?}, expected one of [\"per-bundle\", \"session\"]",
                s
            ))),
        }
    }
}
