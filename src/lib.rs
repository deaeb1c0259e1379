//! Ledger History - batched, sharded persistence of trading history
//!
//! Keeps the matching engine off database I/O: history rows are buffered in
//! memory and flushed asynchronously as multi-row statements.
//!
//! # Modules
//!
//! - [`history`] - Append API, pending batches, flush scheduler, execution pool
//! - [`models`] - Order snapshot types
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - MySQL connection management
//! - [`replay`] - NDJSON event replay through the append API

pub mod config;
pub mod db;
pub mod history;
pub mod logging;
pub mod models;
pub mod replay;

// Convenient re-exports at crate root
pub use config::{AppConfig, DbConfig, HistoryConfig};
pub use history::{
    BatchKey, HistoryError, HistoryService, HistoryWriter, RecordType, RetryPolicy, SqlExecutor,
};
pub use models::{Order, OrderType, Side};
