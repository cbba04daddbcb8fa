//! Core persistence and lifecycle logic for tracked parcels.
//! This crate owns the parcel table and its lifecycle guards.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::parcel::{
    format_rfc3339_seconds, now_rfc3339, ClientId, Parcel, ParcelNumber, ParcelStatus,
    ParcelStatusError, PARCEL_STATUS_DELIVERED, PARCEL_STATUS_REGISTERED, PARCEL_STATUS_SENT,
};
pub use repo::parcel_repo::{ParcelRepository, RepoError, RepoResult, SqliteParcelStore};
pub use service::parcel_service::{ParcelService, ParcelServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
