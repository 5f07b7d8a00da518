use chrono::Utc;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use paytrail::application::payments::PaymentService;
use paytrail::application::shipments::ShipmentService;
use paytrail::config::Config;
use paytrail::domain::ports::{PaymentStoreBox, ShipmentStoreBox};
use paytrail::infrastructure::in_memory::{
    InMemoryOrderBook, InMemoryPaymentStore, InMemoryShipmentStore, LoggingNotifier,
};
#[cfg(feature = "storage-rocksdb")]
use paytrail::infrastructure::rocksdb::RocksDBStore;
use paytrail::interfaces::csv::seed_reader::SeedReader;
use paytrail::interfaces::http::{AppState, router};
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn stores(config: &Config) -> Result<(PaymentStoreBox, ShipmentStoreBox)> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &config.db_path {
        let store = RocksDBStore::open(db_path).into_diagnostic()?;
        info!(path = %db_path.display(), "using RocksDB storage");
        return Ok((Box::new(store.clone()), Box::new(store)));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if config.db_path.is_some() {
        tracing::warn!(
            "--db-path was provided but the 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }

    Ok((
        Box::new(InMemoryPaymentStore::new()),
        Box::new(InMemoryShipmentStore::new()),
    ))
}

fn spawn_expiry_sweeper(payments: Arc<PaymentService>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(err) = payments.expire_overdue(Utc::now()).await {
                error!(error = %err, "expiry sweep failed");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let policy = config.policy().into_diagnostic()?;
    let book = InMemoryOrderBook::new();
    if let Some(seed) = &config.seed {
        let file = File::open(seed).into_diagnostic()?;
        let loaded = SeedReader::new(file)
            .load_into(&book)
            .await
            .into_diagnostic()?;
        info!(rows = loaded, path = %seed.display(), "loaded seed data");
    }

    let (payment_store, shipment_store) = stores(&config)?;
    let payments = PaymentService::new(
        payment_store,
        Box::new(book.clone()),
        Box::new(LoggingNotifier),
        policy,
    );
    let shipments = ShipmentService::new(shipment_store, Box::new(book));
    let state = AppState::new(payments, shipments);

    if config.expiry_sweep_secs > 0 {
        spawn_expiry_sweeper(
            state.payments.clone(),
            Duration::from_secs(config.expiry_sweep_secs),
        );
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .into_diagnostic()?;
    info!(addr = %config.bind, "listening");
    axum::serve(listener, router(state)).await.into_diagnostic()?;

    Ok(())
}
