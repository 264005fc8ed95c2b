//! The replica-aware driver.
//!
//! [`ReplicaDriver`] presents a read pool and a write pool as one database. It
//! owns the lifecycle of both, hands out [`LogicalConnection`]s, and keeps each
//! connection's transaction flag and the [`TransactionRegistry`] in step.

use crate::db::{
    DatabaseConnection, Driver, PoolDriver, PoolHandle, TransactionMetadata, TransactionRegistry,
};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, TransactionSettings};
use crate::routing::connection::{LogicalConnection, TransactionState};
use crate::routing::strategy::ConnectionStrategy;
use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

/// Which pools the router sits on, chosen up front.
#[derive(Debug, Clone)]
pub enum RouterConfig {
    /// Pure reads go to `read`, everything else to `write`.
    Replicated { read: PoolHandle, write: PoolHandle },
    /// Reads and writes share one pool and one connection.
    Single { pool: PoolHandle },
}

pub struct ReplicaDriver<D = PoolDriver> {
    strategy: ConnectionStrategy<D>,
    registry: TransactionRegistry,
}

impl ReplicaDriver<PoolDriver> {
    /// Build a router for a known database kind.
    pub fn new(db_type: DatabaseType, config: RouterConfig) -> Self {
        Self::with_strategy(ConnectionStrategy::from_config(db_type, config))
    }

    /// Build a router from a kind selector (`"mysql"`, `"pg"`, `"sqlite"`).
    ///
    /// An unknown kind fails here, before any pool is touched.
    pub fn from_kind(kind: &str, config: RouterConfig) -> DbResult<Self> {
        let db_type: DatabaseType = kind.parse()?;
        Ok(Self::new(db_type, config))
    }
}

impl<D: Driver> ReplicaDriver<D> {
    pub fn with_strategy(strategy: ConnectionStrategy<D>) -> Self {
        Self {
            strategy,
            registry: TransactionRegistry::new(),
        }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.strategy.db_type()
    }

    pub fn strategy(&self) -> &ConnectionStrategy<D> {
        &self.strategy
    }

    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// Open transactions across all connections of this router.
    pub async fn list_transactions(&self) -> Vec<TransactionMetadata> {
        self.registry.list_all().await
    }

    /// Resolve and initialise the pools concurrently.
    pub async fn init(&self) -> DbResult<()> {
        self.strategy.init().await?;
        info!(
            db_type = %self.db_type(),
            replicated = self.strategy.is_replicated(),
            "Replica router initialized"
        );
        Ok(())
    }

    pub async fn acquire_connection(&self) -> DbResult<LogicalConnection<D::Connection>> {
        let conn = self.strategy.acquire().await?;
        debug!(connection_id = %conn.id(), "Connection acquired");
        Ok(conn)
    }

    /// Return both sides to their pools.
    ///
    /// A transaction still open at this point is rolled back first. If that
    /// rollback fails the write connection is closed instead of pooled.
    pub async fn release_connection(&self, mut conn: LogicalConnection<D::Connection>) -> DbResult<()> {
        let id = conn.id().clone();

        if conn.in_transaction() {
            warn!(connection_id = %id, "Releasing connection with an open transaction, rolling back");
            if let Err(e) = self
                .strategy
                .write_driver()
                .rollback_transaction(conn.write_connection())
                .await
            {
                warn!(
                    connection_id = %id,
                    error = %e,
                    "Rollback on release failed, discarding connection"
                );
                conn.write_connection().discard();
            }
            conn.set_state(TransactionState::Idle);
        }

        self.strategy.release(conn.into_members()).await?;
        debug!(connection_id = %id, "Connection released");
        Ok(())
    }

    /// Start a transaction on the write side.
    ///
    /// From here until commit or rollback every statement on `conn` goes to the
    /// write side. If the driver fails to begin, the connection is left as it was.
    pub async fn begin_transaction(
        &self,
        conn: &mut LogicalConnection<D::Connection>,
        settings: &TransactionSettings,
    ) -> DbResult<()> {
        if conn.in_transaction() {
            return Err(DbError::transaction(
                "Transaction already in progress",
                conn.id().as_str(),
            ));
        }

        let transaction_id = self.registry.insert(conn.id(), *settings).await?;
        conn.set_state(TransactionState::InTransaction);
        conn.hold_registration(self.registry.registration(conn.id()));

        let begun = self
            .strategy
            .write_driver()
            .begin_transaction(conn.write_connection(), settings)
            .await;

        match begun {
            Ok(()) => {
                info!(
                    connection_id = %conn.id(),
                    transaction_id = %transaction_id,
                    isolation_level = ?settings.isolation_level,
                    access_mode = ?settings.access_mode,
                    "Transaction started"
                );
                Ok(())
            }
            Err(e) => {
                conn.set_state(TransactionState::Idle);
                Err(e)
            }
        }
    }

    pub async fn commit_transaction(
        &self,
        conn: &mut LogicalConnection<D::Connection>,
    ) -> DbResult<()> {
        self.end_transaction(conn).await?;
        self.strategy
            .write_driver()
            .commit_transaction(conn.write_connection())
            .await?;
        info!(connection_id = %conn.id(), "Transaction committed");
        Ok(())
    }

    pub async fn rollback_transaction(
        &self,
        conn: &mut LogicalConnection<D::Connection>,
    ) -> DbResult<()> {
        self.end_transaction(conn).await?;
        self.strategy
            .write_driver()
            .rollback_transaction(conn.write_connection())
            .await?;
        info!(connection_id = %conn.id(), "Transaction rolled back");
        Ok(())
    }

    /// Clear the flag and the registry entry ahead of commit/rollback.
    async fn end_transaction(&self, conn: &mut LogicalConnection<D::Connection>) -> DbResult<()> {
        if !conn.in_transaction() {
            return Err(DbError::transaction(
                "No transaction in progress",
                conn.id().as_str(),
            ));
        }
        conn.set_state(TransactionState::Idle);
        Ok(())
    }

    /// Run `f` inside a transaction on `conn`.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`. A rollback
    /// failure is logged and the error from `f` is returned.
    ///
    /// ```ignore
    /// let id = router
    ///     .transaction(&mut conn, &TransactionSettings::default(), |conn| {
    ///         Box::pin(async move {
    ///             conn.execute_query(&insert).await?;
    ///             conn.execute_query(&select).await
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(
        &self,
        conn: &mut LogicalConnection<D::Connection>,
        settings: &TransactionSettings,
        f: F,
    ) -> DbResult<T>
    where
        F: for<'c> FnOnce(&'c mut LogicalConnection<D::Connection>) -> BoxFuture<'c, DbResult<T>>,
    {
        self.begin_transaction(conn, settings).await?;

        match f(&mut *conn).await {
            Ok(value) => {
                self.commit_transaction(conn).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback_transaction(conn).await {
                    warn!(
                        connection_id = %conn.id(),
                        error = %rollback_err,
                        "Rollback after failed transaction body failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Tear down the pools. A pool shared by both sides is torn down once.
    pub async fn destroy(&self) -> DbResult<()> {
        let open = self.registry.count().await;
        if open > 0 {
            warn!(open_transactions = open, "Destroying router with open transactions");
        }
        self.strategy.destroy().await?;
        info!(db_type = %self.db_type(), "Replica router destroyed");
        Ok(())
    }
}

impl<D> std::fmt::Debug for ReplicaDriver<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaDriver")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
