//! SQLite-backed store for sessions, bills and their child records.
//!
//! This module provides the persistent side of reconciliation using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Automatic schema migrations, including the state seed rows
//! - WAL mode so a daemon and ad-hoc imports can share one file
//! - Monitor and ignore lists steering daemon passes
//! - Import bookkeeping for dataset archives

pub mod connection;
pub mod lists;
pub mod migrations;

pub use crate::Error;

pub use connection::StoreDb;
pub use lists::{MonitoredBill, Stance};

/// Timestamp format used in every `created` / `updated` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time in store format.
pub fn timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}
