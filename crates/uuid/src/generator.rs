//! Internal implementation of identifier allocation.
//!
//! This module contains the [`IdGenerator`] implementations used to allocate resource
//! identifiers.

use crate::{UuidError, UuidResult};
use std::sync::atomic::{AtomicU64, Ordering};

use ::uuid::Uuid;

/// Maximum length of a FHIR resource id.
const MAX_ID_LEN: usize = 64;

/// Capability that supplies resource identifiers on demand.
///
/// The only contract is uniqueness: an implementation must never return the same identifier
/// twice for its own lifetime, including when it is shared between threads.
pub trait IdGenerator: Send + Sync {
    /// Allocates a new identifier.
    fn new_id(&self) -> String;
}

/// Allocates random identifiers: version 4 UUIDs as 32 lowercase hex characters, no hyphens.
///
/// Collisions between version 4 UUIDs are not a practical concern, so this generator keeps no
/// state and is freely shareable.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGenerator;

impl UuidIdGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl IdGenerator for UuidIdGenerator {
    fn new_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Allocates deterministic identifiers of the form `{prefix}{n}` with `n` counting up from 1.
///
/// Output produced with this generator is reproducible from run to run, which makes it the
/// allocator of choice in tests.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            next: AtomicU64::new(1),
        }
    }
}

impl SequentialIdGenerator {
    /// Creates a generator producing `1`, `2`, `3`, ...
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator producing `{prefix}1`, `{prefix}2`, ...
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if the prefix contains characters that are not allowed
    /// in a FHIR id (`A-Z`, `a-z`, `0-9`, `-`, `.`) or leaves no room for the counter.
    pub fn with_prefix(prefix: impl Into<String>) -> UuidResult<Self> {
        let prefix = prefix.into();

        // u64::MAX has 20 digits.
        if prefix.len() + 20 > MAX_ID_LEN {
            return Err(UuidError::InvalidInput(format!(
                "identifier prefix exceeds maximum length of {} characters",
                MAX_ID_LEN - 20
            )));
        }

        let ok = prefix
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-'));
        if !ok {
            return Err(UuidError::InvalidInput(format!(
                "identifier prefix '{}' contains invalid characters (only alphanumeric, '.', '-' allowed)",
                prefix
            )));
        }

        Ok(Self {
            prefix,
            next: AtomicU64::new(1),
        })
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn new_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}
