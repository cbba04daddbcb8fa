//! Parcel store contract and SQLite implementation.
//!
//! # Responsibility
//! - Translate parcel store operations into queries against `parcel`.
//! - Map rows to `Parcel` values and surface storage failures unchanged.
//! - Emit one diagnostic entry per failure through the injected logger.
//!
//! # Invariants
//! - `set_address` and `delete` only touch rows in `registered` status.
//!   A guard mismatch is a silent success, indistinguishable from a missing
//!   row. Callers confirm effects by reading the parcel back.
//! - `set_status` overwrites unconditionally and does not check that a row
//!   matched.
//! - `get` is the only operation reporting `RepoError::NotFound`.
//! - `get_by_client` has no ordering guarantee and never returns partial
//!   results.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::parcel::{ClientId, Parcel, ParcelNumber};
use log::{Level, Log, Metadata, Record};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::error::Error;
use std::fmt::{Arguments, Display, Formatter};

const LOG_TARGET: &str = module_path!();

const PARCEL_TABLE: &str = "parcel";
const PARCEL_COLUMNS: [&str; 5] = ["number", "client", "status", "address", "created_at"];

const PARCEL_SELECT_SQL: &str = "SELECT
    number,
    client,
    status,
    address,
    created_at
FROM parcel";

const PARCEL_INSERT_SQL: &str = "INSERT INTO parcel (client, status, address, created_at)
VALUES (?1, ?2, ?3, ?4)
RETURNING number;";

const PARCEL_SET_STATUS_SQL: &str = "UPDATE parcel
SET status = ?1
WHERE number = ?2;";

const PARCEL_SET_ADDRESS_SQL: &str = "UPDATE parcel
SET address = ?1
WHERE number = ?2
  AND status = 'registered';";

const PARCEL_DELETE_SQL: &str = "DELETE FROM parcel
WHERE number = ?1
  AND status = 'registered';";

pub type RepoResult<T> = Result<T, RepoError>;

/// Parcel store error.
#[derive(Debug)]
pub enum RepoError {
    /// Query preparation, execution or row materialization failed.
    Db(DbError),
    /// `get` matched no row.
    NotFound(ParcelNumber),
    /// Connection schema version is older than this binary requires.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    /// Whether this is the expected "record absent" outcome of `get`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(number) => write!(f, "parcel not found: {number}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} is older than required {expected_version}; open it with open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for parcel persistence.
pub trait ParcelRepository {
    /// Inserts a parcel and returns the storage-assigned number.
    /// `parcel.number` is ignored.
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber>;
    /// Loads one parcel, or `RepoError::NotFound`.
    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel>;
    /// Loads all parcels owned by `client`, in unspecified order.
    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>>;
    /// Overwrites status with any string, whatever the current value.
    fn set_status(&self, number: ParcelNumber, status: &str) -> RepoResult<()>;
    /// Changes address while the parcel is `registered`; no-op otherwise.
    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()>;
    /// Removes the parcel while it is `registered`; no-op otherwise.
    fn delete(&self, number: ParcelNumber) -> RepoResult<()>;
}

/// SQLite-backed parcel store over a borrowed connection.
pub struct SqliteParcelStore<'conn> {
    conn: &'conn Connection,
    logger: &'conn dyn Log,
}

impl<'conn> SqliteParcelStore<'conn> {
    /// Constructs a store from a migrated connection, logging through the
    /// process-global `log` backend.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Self::try_with_logger(conn, log::logger())
    }

    /// Constructs a store from a migrated connection and an explicit
    /// diagnostic sink.
    pub fn try_with_logger(conn: &'conn Connection, logger: &'conn dyn Log) -> RepoResult<Self> {
        let store = Self { conn, logger };
        if let Err(err) = ensure_connection_ready(conn) {
            store.emit(
                Level::Error,
                format_args!(
                    "event=parcel_store_init module=repo status=error error_code=connection_not_ready error={err}"
                ),
            );
            return Err(err);
        }
        Ok(store)
    }

    fn execute_write<P: Params>(
        &self,
        event: &'static str,
        sql: &str,
        number: ParcelNumber,
        params: P,
    ) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare(sql).map_err(|err| {
            self.storage_failure(event, "prepare", format_args!("number={number}"), err)
        })?;
        let changed = stmt.execute(params).map_err(|err| {
            self.storage_failure(event, "execute", format_args!("number={number}"), err)
        })?;
        Ok(changed)
    }

    fn log_guard_outcome(&self, event: &'static str, number: ParcelNumber, changed: usize) {
        if changed == 0 {
            self.emit(
                Level::Debug,
                format_args!(
                    "event={event} module=repo status=skipped number={number} reason=missing_or_not_registered"
                ),
            );
        }
    }

    fn storage_failure(
        &self,
        event: &'static str,
        phase: &'static str,
        subject: Arguments<'_>,
        err: rusqlite::Error,
    ) -> RepoError {
        self.emit(
            Level::Error,
            format_args!(
                "event={event} module=repo status=error phase={phase} {subject} error_code=db_query_failed error={err}"
            ),
        );
        RepoError::from(err)
    }

    fn emit(&self, level: Level, args: Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(LOG_TARGET).build();
        if !self.logger.enabled(&metadata) {
            return;
        }
        self.logger.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .module_path_static(Some(module_path!()))
                .file_static(Some(file!()))
                .build(),
        );
    }
}

impl ParcelRepository for SqliteParcelStore<'_> {
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        self.conn
            .query_row(
                PARCEL_INSERT_SQL,
                params![
                    parcel.client,
                    parcel.status.as_str(),
                    parcel.address.as_str(),
                    parcel.created_at.as_str(),
                ],
                |row| row.get(0),
            )
            .map_err(|err| {
                self.storage_failure(
                    "parcel_add",
                    "query",
                    format_args!("client={}", parcel.client),
                    err,
                )
            })
    }

    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        let found = self
            .conn
            .query_row(
                &format!("{PARCEL_SELECT_SQL} WHERE number = ?1;"),
                [number],
                parse_parcel_row,
            )
            .optional()
            .map_err(|err| {
                self.storage_failure("parcel_get", "query", format_args!("number={number}"), err)
            })?;

        found.ok_or_else(|| {
            self.emit(
                Level::Debug,
                format_args!("event=parcel_get module=repo status=not_found number={number}"),
            );
            RepoError::NotFound(number)
        })
    }

    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARCEL_SELECT_SQL} WHERE client = ?1;"))
            .map_err(|err| {
                self.storage_failure(
                    "parcel_get_by_client",
                    "prepare",
                    format_args!("client={client}"),
                    err,
                )
            })?;
        let mut rows = stmt.query([client]).map_err(|err| {
            self.storage_failure(
                "parcel_get_by_client",
                "query",
                format_args!("client={client}"),
                err,
            )
        })?;

        let mut parcels = Vec::new();
        loop {
            let row = rows.next().and_then(|row| row.map(parse_parcel_row).transpose());
            match row {
                Ok(Some(parcel)) => parcels.push(parcel),
                Ok(None) => break,
                Err(err) => {
                    return Err(self.storage_failure(
                        "parcel_get_by_client",
                        "scan",
                        format_args!("client={client} scanned={}", parcels.len()),
                        err,
                    ));
                }
            }
        }

        Ok(parcels)
    }

    fn set_status(&self, number: ParcelNumber, status: &str) -> RepoResult<()> {
        self.execute_write(
            "parcel_set_status",
            PARCEL_SET_STATUS_SQL,
            number,
            params![status, number],
        )?;
        Ok(())
    }

    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        let changed = self.execute_write(
            "parcel_set_address",
            PARCEL_SET_ADDRESS_SQL,
            number,
            params![address, number],
        )?;
        self.log_guard_outcome("parcel_set_address", number, changed);
        Ok(())
    }

    fn delete(&self, number: ParcelNumber) -> RepoResult<()> {
        let changed =
            self.execute_write("parcel_delete", PARCEL_DELETE_SQL, number, [number])?;
        self.log_guard_outcome("parcel_delete", number, changed);
        Ok(())
    }
}

fn parse_parcel_row(row: &Row<'_>) -> rusqlite::Result<Parcel> {
    Ok(Parcel {
        number: row.get("number")?,
        client: row.get("client")?,
        status: row.get("status")?,
        address: row.get("address")?,
        created_at: row.get("created_at")?,
    })
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, PARCEL_TABLE)? {
        return Err(RepoError::MissingRequiredTable(PARCEL_TABLE));
    }

    for column in PARCEL_COLUMNS {
        if !table_has_column(conn, PARCEL_TABLE, column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: PARCEL_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
