//! Parcel lifecycle service.
//!
//! # Responsibility
//! - Register parcels with the initial status and a current timestamp.
//! - Advance parcels along `registered -> sent -> delivered`.
//! - Forward guarded address change and deletion to the store.
//!
//! # Invariants
//! - Service APIs never bypass the store's lifecycle guards.
//! - `delivered` parcels are left untouched by `next_status`.

use crate::model::parcel::{now_rfc3339, ClientId, Parcel, ParcelNumber, ParcelStatus};
use crate::repo::parcel_repo::{ParcelRepository, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ParcelServiceError>;

/// Service error for parcel use-cases.
#[derive(Debug)]
pub enum ParcelServiceError {
    /// Persistence-layer failure, including `RepoError::NotFound`.
    Repo(RepoError),
    /// Stored status is outside the known lifecycle.
    UnknownStatus {
        number: ParcelNumber,
        status: String,
    },
    /// The current time could not be rendered as RFC 3339.
    Timestamp(time::error::Error),
}

impl Display for ParcelServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::UnknownStatus { number, status } => {
                write!(f, "parcel {number} has unknown status `{status}`")
            }
            Self::Timestamp(err) => write!(f, "failed to format timestamp: {err}"),
        }
    }
}

impl Error for ParcelServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::UnknownStatus { .. } => None,
            Self::Timestamp(err) => Some(err),
        }
    }
}

impl From<RepoError> for ParcelServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<time::error::Error> for ParcelServiceError {
    fn from(value: time::error::Error) -> Self {
        Self::Timestamp(value)
    }
}

/// Use-case service wrapper over a parcel store.
pub struct ParcelService<R: ParcelRepository> {
    repo: R,
}

impl<R: ParcelRepository> ParcelService<R> {
    /// Creates a service using the provided store implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new parcel for `client`.
    ///
    /// # Contract
    /// - Status is `registered`, `created_at` is the current UTC second.
    /// - Returns the stored parcel including its assigned number.
    pub fn register(&self, client: ClientId, address: impl Into<String>) -> ServiceResult<Parcel> {
        let mut parcel = Parcel::registered(client, address, now_rfc3339()?);
        parcel.number = self.repo.add(&parcel)?;

        info!(
            "event=parcel_register module=service status=ok number={} client={} created_at={}",
            parcel.number, parcel.client, parcel.created_at
        );
        Ok(parcel)
    }

    /// Loads one parcel by number.
    pub fn get(&self, number: ParcelNumber) -> ServiceResult<Parcel> {
        Ok(self.repo.get(number)?)
    }

    /// Lists all parcels owned by `client`, in unspecified order.
    pub fn client_parcels(&self, client: ClientId) -> ServiceResult<Vec<Parcel>> {
        Ok(self.repo.get_by_client(client)?)
    }

    /// Moves a parcel to its next lifecycle status.
    ///
    /// Returns the new status, or `None` when the parcel is already
    /// delivered.
    ///
    /// # Errors
    /// - `Repo(RepoError::NotFound)` when the parcel does not exist.
    /// - `UnknownStatus` when the stored status is not a known value.
    pub fn next_status(&self, number: ParcelNumber) -> ServiceResult<Option<ParcelStatus>> {
        let parcel = self.repo.get(number)?;
        let current = parcel
            .parsed_status()
            .map_err(|err| ParcelServiceError::UnknownStatus {
                number,
                status: err.0,
            })?;

        let Some(next) = current.next() else {
            return Ok(None);
        };

        self.repo.set_status(number, next.as_str())?;
        info!(
            "event=parcel_next_status module=service status=ok number={number} from={current} to={next}"
        );
        Ok(Some(next))
    }

    /// Changes the address of a `registered` parcel; silent no-op otherwise.
    pub fn change_address(&self, number: ParcelNumber, address: &str) -> ServiceResult<()> {
        self.repo.set_address(number, address)?;
        info!(
            "event=parcel_change_address module=service status=ok number={number} guard=registered"
        );
        Ok(())
    }

    /// Deletes a `registered` parcel; silent no-op otherwise.
    pub fn delete(&self, number: ParcelNumber) -> ServiceResult<()> {
        self.repo.delete(number)?;
        info!("event=parcel_delete module=service status=ok number={number} guard=registered");
        Ok(())
    }
}
