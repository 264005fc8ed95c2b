//! Single-pool and replicated connection strategies.
//!
//! The strategy is fixed when the router is built and owns the drivers. It
//! implements the parts of the lifecycle that depend on how many pools there are:
//! concurrent init, pair acquisition and release, and teardown.

use crate::db::{Driver, PoolDriver};
use crate::error::DbResult;
use crate::models::DatabaseType;
use crate::routing::RouterConfig;
use crate::routing::connection::{LogicalConnection, Members};
use tracing::{debug, info, warn};

pub enum ConnectionStrategy<D> {
    /// One driver serves reads and writes on the same connection.
    Single(D),
    /// Pure reads go to `read`; everything else to `write`.
    Replicated { read: D, write: D },
}

impl ConnectionStrategy<PoolDriver> {
    /// Build sqlx drivers for the configured pools.
    pub fn from_config(db_type: DatabaseType, config: RouterConfig) -> Self {
        match config {
            RouterConfig::Replicated { read, write } => Self::Replicated {
                read: PoolDriver::new(db_type, read),
                write: PoolDriver::new(db_type, write),
            },
            RouterConfig::Single { pool } => Self::Single(PoolDriver::new(db_type, pool)),
        }
    }
}

impl<D: Driver> ConnectionStrategy<D> {
    pub fn db_type(&self) -> DatabaseType {
        self.write_driver().db_type()
    }

    pub fn is_replicated(&self) -> bool {
        matches!(self, Self::Replicated { .. })
    }

    pub fn read_driver(&self) -> &D {
        match self {
            Self::Single(driver) => driver,
            Self::Replicated { read, .. } => read,
        }
    }

    pub fn write_driver(&self) -> &D {
        match self {
            Self::Single(driver) => driver,
            Self::Replicated { write, .. } => write,
        }
    }

    /// Initialise every driver concurrently. Any failure is fatal.
    pub(crate) async fn init(&self) -> DbResult<()> {
        match self {
            Self::Single(driver) => driver.init().await,
            Self::Replicated { read, write } => {
                tokio::try_join!(read.init(), write.init())?;
                Ok(())
            }
        }
    }

    /// Acquire the underlying connection(s) for a new logical connection.
    ///
    /// Both sides are acquired concurrently. When only one succeeds it is released
    /// before the error is returned.
    pub(crate) async fn acquire(&self) -> DbResult<LogicalConnection<D::Connection>> {
        let (read, write) = match self {
            Self::Single(driver) => {
                return Ok(LogicalConnection::single(driver.acquire_connection().await?));
            }
            Self::Replicated { read, write } => (read, write),
        };

        match tokio::join!(read.acquire_connection(), write.acquire_connection()) {
            (Ok(read_conn), Ok(write_conn)) => Ok(LogicalConnection::paired(read_conn, write_conn)),
            (Ok(read_conn), Err(e)) => {
                warn!(error = %e, "Write side acquisition failed, releasing read side");
                if let Err(release_err) = read.release_connection(read_conn).await {
                    warn!(error = %release_err, "Failed to release read side");
                }
                Err(e)
            }
            (Err(e), Ok(write_conn)) => {
                warn!(error = %e, "Read side acquisition failed, releasing write side");
                if let Err(release_err) = write.release_connection(write_conn).await {
                    warn!(error = %release_err, "Failed to release write side");
                }
                Err(e)
            }
            (Err(read_err), Err(write_err)) => {
                debug!(error = %write_err, "Write side acquisition also failed");
                Err(read_err)
            }
        }
    }

    /// Release write then read. Both are attempted; the first error is returned.
    pub(crate) async fn release(&self, members: Members<D::Connection>) -> DbResult<()> {
        match (self, members) {
            (Self::Single(driver), Members::Single(conn)) => driver.release_connection(conn).await,
            (Self::Replicated { read, write }, Members::Paired { read: r, write: w }) => {
                let write_result = write.release_connection(w).await;
                let read_result = read.release_connection(r).await;
                write_result.and(read_result)
            }
            (Self::Single(driver), Members::Paired { read: r, write: w }) => {
                let write_result = driver.release_connection(w).await;
                let read_result = driver.release_connection(r).await;
                write_result.and(read_result)
            }
            (Self::Replicated { write, .. }, Members::Single(conn)) => {
                write.release_connection(conn).await
            }
        }
    }

    /// Tear down the pools.
    ///
    /// When both drivers resolve to the same pool it is torn down once.
    /// Otherwise both are destroyed concurrently and the first error is returned.
    pub(crate) async fn destroy(&self) -> DbResult<()> {
        match self {
            Self::Single(driver) => driver.destroy().await,
            Self::Replicated { read, write } if read.shares_pool_with(write) => {
                info!("Read and write share one pool, tearing it down once");
                write.destroy().await
            }
            Self::Replicated { read, write } => {
                let (read_result, write_result) = tokio::join!(read.destroy(), write.destroy());
                read_result.and(write_result)
            }
        }
    }
}

impl<D> std::fmt::Debug for ConnectionStrategy<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(_) => f.write_str("Single"),
            Self::Replicated { .. } => f.write_str("Replicated"),
        }
    }
}
