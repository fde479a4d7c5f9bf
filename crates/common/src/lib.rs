//! Shared identity types used across the write and read sides.

mod types;

pub use types::AggregateId;
