//! Reconciliation and caching engine for legislative data.
//!
//! This crate provides:
//! - Typed payload records decoded from the remote API and push bodies
//! - A SQLite store with schema migrations
//! - The reconciliation engine that diffs payloads into the store
//! - Response, document and existence caches
//! - Change signals and bulk dataset import
//! - Layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod import;
pub mod missing;
pub mod model;
pub mod reconcile;
pub mod signal;
pub mod store;

pub use cache::{ExistenceCache, FileCache};
pub use config::AppConfig;
pub use error::Error;
pub use missing::{MissingCategory, MissingMap, MissingQueue};
pub use model::Payload;
pub use reconcile::{BillSnapshot, EntryState, ImportMode, Outcome, ReconcileOptions, Reconciler};
pub use signal::SignalSink;
pub use store::StoreDb;
