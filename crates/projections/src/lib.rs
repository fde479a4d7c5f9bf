//! Read models and projections for the CQRS query side.
//!
//! This crate provides:
//! - [`Projection`] trait for folding committed events into a read model
//! - [`subscribe_projection`] to register a projection with the dispatcher for
//!   every event kind it handles
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`AccountReportView`], the account report denormalizer

pub mod error;
pub mod projection;
pub mod read_model;
pub mod subscription;
pub mod views;

pub use error::{ProjectionError, Result};
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use subscription::{ProjectionSubscriber, subscribe_projection};
pub use views::{AccountReportRow, AccountReportView};
