//! Projection error types.

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur while a projection handles an event.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An event referred to a row the projection has never created.
    #[error("{projection} has no row for aggregate {aggregate_id}")]
    UnknownRow {
        projection: &'static str,
        aggregate_id: AggregateId,
    },

    #[error("Projection error: {0}")]
    Projection(String),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
