//! Read/write routing over a pair of pools.
//!
//! - [`classify`] decides whether a statement is a pure read
//! - [`decider`] turns that and the transaction flag into a [`Route`]
//! - [`connection`] is the logical connection callers execute statements on
//! - [`strategy`] and [`router`] own the pools and the connection lifecycle

pub mod classify;
pub mod connection;
pub mod decider;
pub mod router;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_utils;

pub use classify::{StatementKind, classify_sql};
pub use connection::{LogicalConnection, TransactionState};
pub use decider::{Route, decide};
pub use router::{ReplicaDriver, RouterConfig};
pub use strategy::ConnectionStrategy;
