//! Top-level error type for the binary.

use domain::DomainError;
use event_store::EventStoreError;
use metrics_exporter_prometheus::BuildError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError),

    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
