//! Parcel tracker demo executable.
//!
//! # Responsibility
//! - Wire logging, storage bootstrap and `ParcelService` together.
//! - Walk one client through register/update/advance/delete.
//!
//! Environment:
//! - `PARCEL_TRACKER_DB`: database path, default `tracker.db`. A positional
//!   argument takes precedence.
//! - `PARCEL_TRACKER_LOG_DIR`: absolute log directory; unset disables file logs.
//! - `PARCEL_TRACKER_LOG_LEVEL`: `trace|debug|info|warn|error`.

use parcel_core::db::open_db;
use parcel_core::{
    default_log_level, init_logging, ClientId, Parcel, ParcelRepository, ParcelService,
    SqliteParcelStore,
};
use std::error::Error;
use std::process::ExitCode;

const DEFAULT_DB_PATH: &str = "tracker.db";
const DEMO_CLIENT: ClientId = 1;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("PARCEL_TRACKER_LOG_DIR") {
        let level = std::env::var("PARCEL_TRACKER_LOG_LEVEL")
            .unwrap_or_else(|_| default_log_level().to_string());
        init_logging(&level, &log_dir)?;
    }

    let db_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PARCEL_TRACKER_DB").ok())
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

    let conn = open_db(&db_path)?;
    let service = ParcelService::new(SqliteParcelStore::try_new(&conn)?);

    let parcel = service.register(DEMO_CLIENT, "Moscow, Red Square 1")?;
    println!(
        "registered parcel #{} for client {} to `{}` at {}",
        parcel.number, parcel.client, parcel.address, parcel.created_at
    );

    let new_address = "Saint Petersburg, Nevsky Prospect 28";
    service.change_address(parcel.number, new_address)?;
    println!("parcel #{} address changed to `{new_address}`", parcel.number);

    if let Some(status) = service.next_status(parcel.number)? {
        println!("parcel #{} status is now {status}", parcel.number);
    }

    print_client_parcels(&service, DEMO_CLIENT)?;

    // Not registered any more, so the store leaves it in place.
    service.delete(parcel.number)?;
    print_client_parcels(&service, DEMO_CLIENT)?;

    let parcel = service.register(DEMO_CLIENT, "Kazan, Bauman st. 5")?;
    println!("registered parcel #{}", parcel.number);
    service.delete(parcel.number)?;
    println!("parcel #{} deleted", parcel.number);

    print_client_parcels(&service, DEMO_CLIENT)?;
    Ok(())
}

fn print_client_parcels<R: ParcelRepository>(
    service: &ParcelService<R>,
    client: ClientId,
) -> Result<(), Box<dyn Error>> {
    let mut parcels: Vec<Parcel> = service.client_parcels(client)?;
    parcels.sort_by_key(|parcel| parcel.number);

    println!("client {client} parcels:");
    for parcel in parcels {
        println!(
            "  #{} {} `{}` created {}",
            parcel.number, parcel.status, parcel.address, parcel.created_at
        );
    }
    Ok(())
}
