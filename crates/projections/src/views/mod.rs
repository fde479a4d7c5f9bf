//! Read model views for the CQRS query side.

pub mod account_report;

pub use account_report::{AccountReportRow, AccountReportView};
