//! Read/write replica router.
//!
//! This library presents a primary (write) pool and a read replica pool as one
//! logical database connection. Pure reads go to the replica, everything else
//! and everything inside a transaction goes to the primary. Pools are sqlx pools
//! for MySQL, PostgreSQL or SQLite.

pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod models;
pub mod routing;

pub use config::Config;
pub use db::PoolHandle;
pub use dialect::ReplicaDialect;
pub use error::{DbError, DbResult};
pub use routing::{LogicalConnection, ReplicaDriver, Route, RouterConfig};
