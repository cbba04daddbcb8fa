//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the parcel store contract used by services and callers.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Lifecycle guards live in the write predicates, not in pre-checks.
//! - Repository APIs return a semantic `NotFound` for single-row reads in
//!   addition to DB transport errors.

pub mod parcel_repo;
