//! # clonerow
//!
//! Reconciles a single identified row between two instances of the same
//! relational schema: detect schema and data drift, then propagate source
//! values onto the target row behind a verified backup-and-restore path.

pub mod backup;
pub mod cli;
pub mod config;
pub mod diff;
pub mod duckdb_store;
pub mod error;
pub mod output;
pub mod protocol;
pub mod sql;
pub mod store;

pub use error::{CloneRowError, Result};
pub use protocol::{
    Decision, DecisionSource, ReconciliationOutcome, ReconciliationProtocol, RunContext,
};
pub use store::{DataStore, Row, RowLocator, Value};
