//! Parcel record and lifecycle statuses.
//!
//! # Responsibility
//! - Define the canonical parcel row shape.
//! - Provide conversions between `ParcelStatus` and its stored string.
//! - Produce `created_at` timestamps in the stored RFC 3339 format.
//!
//! # Invariants
//! - `number` is assigned by storage and ignored on insert.
//! - `address` may change only while status is `registered`.
//! - `created_at` is second-precision UTC, e.g. `2024-01-01T00:00:00Z`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Storage-assigned parcel identifier.
pub type ParcelNumber = i64;

/// Owning client identifier.
pub type ClientId = i64;

/// Stored value of [`ParcelStatus::Registered`].
pub const PARCEL_STATUS_REGISTERED: &str = "registered";
/// Stored value of [`ParcelStatus::Sent`].
pub const PARCEL_STATUS_SENT: &str = "sent";
/// Stored value of [`ParcelStatus::Delivered`].
pub const PARCEL_STATUS_DELIVERED: &str = "delivered";

/// Known parcel lifecycle states.
///
/// Storage does not enforce this set; any string may be written through
/// `ParcelRepository::set_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    /// Initial state. The only state allowing address change and deletion.
    Registered,
    /// Handed over for delivery.
    Sent,
    /// Received by the addressee.
    Delivered,
}

impl ParcelStatus {
    /// Stable string stored in `parcel.status`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => PARCEL_STATUS_REGISTERED,
            Self::Sent => PARCEL_STATUS_SENT,
            Self::Delivered => PARCEL_STATUS_DELIVERED,
        }
    }

    /// Returns the following lifecycle state, or `None` once delivered.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Registered => Some(Self::Sent),
            Self::Sent => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }
}

impl Display for ParcelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParcelStatus {
    type Err = ParcelStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            PARCEL_STATUS_REGISTERED => Ok(Self::Registered),
            PARCEL_STATUS_SENT => Ok(Self::Sent),
            PARCEL_STATUS_DELIVERED => Ok(Self::Delivered),
            other => Err(ParcelStatusError(other.to_string())),
        }
    }
}

/// Returned when a status string is outside the known lifecycle set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParcelStatusError(pub String);

impl Display for ParcelStatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown parcel status `{}`; expected registered|sent|delivered",
            self.0
        )
    }
}

impl Error for ParcelStatusError {}

/// One row of the `parcel` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    /// Assigned on insert; `0` for parcels not yet stored.
    pub number: ParcelNumber,
    pub client: ClientId,
    /// Free text. See [`ParcelStatus`] for the conventional values.
    pub status: String,
    pub address: String,
    /// RFC 3339 timestamp string, stored verbatim.
    pub created_at: String,
}

impl Parcel {
    /// Creates an unsaved parcel with an explicit status.
    pub fn new(
        client: ClientId,
        status: impl Into<String>,
        address: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            number: 0,
            client,
            status: status.into(),
            address: address.into(),
            created_at: created_at.into(),
        }
    }

    /// Creates an unsaved parcel in the `registered` state.
    pub fn registered(
        client: ClientId,
        address: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self::new(client, PARCEL_STATUS_REGISTERED, address, created_at)
    }

    /// Whether address change and deletion are currently permitted.
    pub fn is_registered(&self) -> bool {
        self.status == PARCEL_STATUS_REGISTERED
    }

    /// Parses the stored status into the known lifecycle set.
    pub fn parsed_status(&self) -> Result<ParcelStatus, ParcelStatusError> {
        self.status.parse()
    }
}

/// Formats a timestamp as second-precision UTC RFC 3339.
pub fn format_rfc3339_seconds(value: OffsetDateTime) -> Result<String, time::error::Error> {
    let truncated = OffsetDateTime::from_unix_timestamp(value.unix_timestamp())?;
    Ok(truncated.format(&Rfc3339)?)
}

/// Current wall-clock time in the stored `created_at` format.
pub fn now_rfc3339() -> Result<String, time::error::Error> {
    format_rfc3339_seconds(OffsetDateTime::now_utc())
}
