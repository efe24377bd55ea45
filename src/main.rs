use chrono::Utc;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use seat_hold::application::coordinator::ReservationCoordinator;
use seat_hold::application::sweeper::ExpirySweeper;
use seat_hold::config::EngineConfig;
use seat_hold::domain::ports::{ClockRef, InventoryLedgerRef, PreorderStoreRef};
use seat_hold::infrastructure::clock::{ManualClock, SystemClock};
use seat_hold::infrastructure::in_memory::InMemoryPreorderStore;
#[cfg(feature = "storage-rocksdb")]
use seat_hold::infrastructure::rocksdb::RocksDBPreorderStore;
use seat_hold::interfaces::batch::BatchDriver;
use seat_hold::interfaces::catalog_file::MaterializedCatalog;
use seat_hold::interfaces::csv::availability_writer::AvailabilityWriter;
use seat_hold::interfaces::csv::request_reader::RequestReader;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input booking requests CSV file
    input: PathBuf,

    /// Materialized train services and seat capacities (JSON)
    #[arg(long, env = "SEAT_HOLD_CATALOG")]
    catalog: PathBuf,

    /// Lifetime of a hold, in seconds
    #[arg(long, env = "SEAT_HOLD_HOLD_SECONDS", default_value_t = 900)]
    hold_seconds: i64,

    /// Period of the background expiry sweep, in seconds
    #[arg(long, env = "SEAT_HOLD_SWEEP_INTERVAL_SECS", default_value_t = 30)]
    sweep_interval_secs: u64,

    /// Take the current time from each request's `at` column instead of the wall clock
    #[arg(long)]
    replay_clock: bool,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "SEAT_HOLD_DB_PATH")]
    db_path: Option<PathBuf>,
}

fn open_store(db_path: Option<PathBuf>) -> Result<PreorderStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Arc::new(
            RocksDBPreorderStore::open(path).into_diagnostic()?,
        )),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryPreorderStore::new()))
        }
        None => Ok(Arc::new(InMemoryPreorderStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "seat_hold=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config =
        EngineConfig::from_secs(cli.hold_seconds, cli.sweep_interval_secs).into_diagnostic()?;

    let catalog_file = File::open(&cli.catalog).into_diagnostic()?;
    let (catalog, ledger) = MaterializedCatalog::from_reader(catalog_file)
        .and_then(MaterializedCatalog::into_adapters)
        .into_diagnostic()?;
    tracing::info!(services = catalog.len(), "catalog loaded");

    let ledger: InventoryLedgerRef = Arc::new(ledger);
    let store = open_store(cli.db_path)?;
    let replay_clock = cli.replay_clock.then(|| ManualClock::new(Utc::now()));
    let clock: ClockRef = match &replay_clock {
        Some(manual) => Arc::new(manual.clone()),
        None => Arc::new(SystemClock),
    };

    let coordinator = ReservationCoordinator::new(
        Arc::new(catalog),
        ledger.clone(),
        store.clone(),
        clock.clone(),
        &config,
    );
    coordinator.recover().await.into_diagnostic()?;

    let sweeper = ExpirySweeper::new(store, ledger, clock);
    // A replayed run expires holds only on its own `sweep` rows.
    let sweeper_handle = replay_clock
        .is_none()
        .then(|| sweeper.clone().spawn(config.sweep_interval));
    let mut driver = BatchDriver::new(coordinator, sweeper, replay_clock);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = RequestReader::new(file);
    for request in reader.requests() {
        match request {
            Ok(request) => match driver.process(request).await {
                Ok(outcome) => tracing::debug!(?outcome, "request processed"),
                Err(e) => {
                    if !e.is_expected() {
                        tracing::error!(error = %e, "engine fault while processing request");
                    }
                    eprintln!("Error processing request: {}", e);
                }
            },
            Err(e) => {
                eprintln!("Error reading request: {}", e);
            }
        }
    }

    if let Some(handle) = sweeper_handle {
        handle.shutdown().await.into_diagnostic()?;
    }

    let rows = driver
        .coordinator()
        .inventory_snapshot()
        .await
        .into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = AvailabilityWriter::new(stdout.lock());
    writer.write_availability(&rows).into_diagnostic()?;

    Ok(())
}
