//! `SQLite` memo store and its connection helpers.

mod connection;
mod memo;
mod metrics;

pub use connection::{acquire_lock, configure_connection};
pub use memo::SqliteMemoStore;
pub use metrics::record_operation_metrics;
