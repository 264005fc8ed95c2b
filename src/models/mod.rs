//! Data models for the replica router.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{
    AccessMode, ConnectionConfig, ConnectionConfigError, ConnectionId, DatabaseType,
    IsolationLevel, TransactionSettings,
};
pub use query::{CompiledQuery, JsonRow, QueryParam, QueryResult};
pub use schema::{TableInfo, TableType};
