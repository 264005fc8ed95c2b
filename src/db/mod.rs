//! Database access layer.
//!
//! This module provides:
//! - Vendor-specific connection pools and pool handles
//! - The driver trait the router is written against, and its sqlx implementation
//! - Parameter binding and row decoding
//! - The registry of connections with an open transaction

#[macro_use]
pub mod macros;
pub mod driver;
pub mod params;
pub mod pool;
pub mod transaction_registry;
pub mod types;

pub use driver::{DatabaseConnection, Driver, PoolDriver};
pub use pool::{DbConnection, DbPool, PoolHandle};
pub use transaction_registry::{TransactionMetadata, TransactionRegistry};
