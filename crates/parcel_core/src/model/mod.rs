//! Parcel domain model.
//!
//! # Responsibility
//! - Define the parcel record shared by storage, services and callers.
//! - Name the conventional lifecycle statuses.
//!
//! # Invariants
//! - A parcel is identified by a storage-assigned `ParcelNumber`.
//! - Stored status is free text; `ParcelStatus` is the known subset.

pub mod parcel;
