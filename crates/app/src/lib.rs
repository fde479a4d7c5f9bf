//! Process wiring for the CQRS core.
//!
//! Loads [`Config`], installs logging, picks an event store and builds a
//! [`CqrsContext`] with the account handlers and the account report
//! projection registered.

pub mod config;
pub mod error;

use std::sync::Arc;

use domain::{CqrsContext, DomainError, account};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use projections::{AccountReportView, subscribe_projection};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use config::{Config, ConfigError, LogFormat};
pub use error::AppError;

/// Event store shared by every component of the process.
pub type SharedStore = Arc<dyn EventStore>;

/// Installs the global tracing subscriber.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Opens Postgres when a database URL is configured, otherwise an empty
/// in-memory store.
pub async fn open_store(config: &Config) -> Result<SharedStore, AppError> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresEventStore::connect(url).await?;
            store.run_migrations().await?;
            tracing::info!("using postgres event store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("using in-memory event store");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
    }
}

/// Registers every projection and command handler, then freezes the
/// context.
pub fn build_context<S: EventStore + Clone + 'static>(
    store: S,
    config: &Config,
    report: &AccountReportView,
) -> Result<CqrsContext<S>, DomainError> {
    let mut builder = CqrsContext::builder(store);
    subscribe_projection(builder.dispatcher_mut(), Arc::new(report.clone()));
    account::register(builder, config.command_retry_limit).build()
}
