//! Resource identifier allocation.
//!
//! Every resource materialised into a bundle needs an identifier that is unique for the lifetime
//! of the bundler that produced it. This crate provides that capability behind a small trait so
//! callers can inject whichever allocator suits them.
//!
//! This crate provides:
//! - [`IdGenerator`], the allocation capability threaded through the bundler.
//! - [`UuidIdGenerator`], which hands out random UUIDs as 32 lowercase hex characters.
//! - [`SequentialIdGenerator`], which hands out deterministic counter-based identifiers for
//!   reproducible output and tests.
//!
//! Both forms are valid FHIR `id`s (at most 64 characters drawn from `[A-Za-z0-9\-\.]`), so
//! generated identifiers can be used as resource ids without escaping.

mod generator;

// Re-export public types
pub use generator::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
