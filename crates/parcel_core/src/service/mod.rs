//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate parcel store calls into lifecycle-level APIs.
//! - Keep CLI callers decoupled from storage details.

pub mod parcel_service;
