//! Pull client for legisync.
//!
//! This crate fetches payloads from the remote API through the response cache
//! and drives the reconciler over bill lists and their dependent objects. It
//! also scans published datasets and keeps the remote monitor list in step
//! with the local one.

pub mod datasets;
pub mod error;
pub mod monitor;
pub mod pull;
pub mod search;
pub mod sync;
pub mod transport;

pub use datasets::{DatasetState, DatasetStatus, ScanFilter};
pub use error::PullError;
pub use pull::PullClient;
pub use search::SearchPlan;
pub use sync::{SyncOptions, SyncReport, Synchronizer};
pub use transport::{HttpConfig, HttpTransport, Transport};
