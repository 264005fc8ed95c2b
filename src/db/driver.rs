//! The driver seam between the router and a single connection pool.
//!
//! The router never talks to sqlx directly. It holds two [`Driver`]s (or one, in
//! single-pool mode) and asks them for connections, transaction control and
//! teardown. [`PoolDriver`] is the sqlx-backed implementation.

use crate::db::pool::{DbConnection, DbPool, PoolHandle};
use crate::error::{DbError, DbResult};
use crate::models::{CompiledQuery, DatabaseType, QueryResult, TransactionSettings};
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A connection handed out by a [`Driver`].
pub trait DatabaseConnection: Send {
    /// Run a statement to completion and return its combined result.
    fn execute_query(
        &mut self,
        query: &CompiledQuery,
    ) -> impl Future<Output = DbResult<QueryResult>> + Send;

    /// Run a statement and yield results incrementally.
    ///
    /// The stream pulls from the server cursor as it is polled. Dropping it
    /// cancels the statement.
    fn stream_query<'a>(
        &'a mut self,
        query: &'a CompiledQuery,
    ) -> BoxStream<'a, DbResult<QueryResult>>;

    /// Never hand this connection back to its pool; close it on release.
    ///
    /// Used when the session may still carry an open transaction.
    fn discard(&mut self);
}

/// Owns one pool: initialisation, connections, transaction control and teardown.
pub trait Driver: Send + Sync {
    type Connection: DatabaseConnection;

    fn db_type(&self) -> DatabaseType;

    /// Resolve the pool. Must complete before any connection is acquired.
    fn init(&self) -> impl Future<Output = DbResult<()>> + Send;

    fn acquire_connection(&self) -> impl Future<Output = DbResult<Self::Connection>> + Send;

    fn release_connection(
        &self,
        conn: Self::Connection,
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn begin_transaction(
        &self,
        conn: &mut Self::Connection,
        settings: &TransactionSettings,
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn commit_transaction(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn rollback_transaction(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = DbResult<()>> + Send;

    /// Close the pool.
    fn destroy(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Whether both drivers tear down the very same pool object.
    fn shares_pool_with(&self, other: &Self) -> bool;
}

/// A [`Driver`] over an sqlx pool given as a [`PoolHandle`].
pub struct PoolDriver {
    db_type: DatabaseType,
    handle: PoolHandle,
    pool: OnceCell<Arc<DbPool>>,
}

impl PoolDriver {
    pub fn new(db_type: DatabaseType, handle: impl Into<PoolHandle>) -> Self {
        Self {
            db_type,
            handle: handle.into(),
            pool: OnceCell::new(),
        }
    }

    /// The resolved pool.
    pub fn pool(&self) -> DbResult<&Arc<DbPool>> {
        self.pool.get().ok_or_else(|| {
            DbError::connection(
                "Pool not initialized",
                "Call init() on the driver before acquiring connections",
            )
        })
    }

    /// The pool to compare or tear down: resolved if available, otherwise a ready handle.
    fn known_pool(&self) -> Option<&Arc<DbPool>> {
        self.pool.get().or(match &self.handle {
            PoolHandle::Ready(pool) => Some(pool),
            PoolHandle::Deferred(_) => None,
        })
    }
}

impl std::fmt::Debug for PoolDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolDriver")
            .field("db_type", &self.db_type)
            .field("handle", &self.handle)
            .field("initialized", &self.pool.initialized())
            .finish()
    }
}

impl Driver for PoolDriver {
    type Connection = DbConnection;

    fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    async fn init(&self) -> DbResult<()> {
        let pool = self
            .pool
            .get_or_try_init(|| async {
                let pool = self.handle.resolve().await?;
                if pool.db_type() != self.db_type {
                    return Err(DbError::invalid_input(format!(
                        "Pool is {} but the driver was configured for {}",
                        pool.db_type(),
                        self.db_type
                    )));
                }
                Ok(pool)
            })
            .await?;

        info!(db_type = %pool.db_type(), "Driver initialized");
        Ok(())
    }

    async fn acquire_connection(&self) -> DbResult<DbConnection> {
        self.pool()?.acquire().await
    }

    async fn release_connection(&self, conn: DbConnection) -> DbResult<()> {
        // Dropping returns it to the pool, or closes it mid-transaction
        drop(conn);
        Ok(())
    }

    async fn begin_transaction(
        &self,
        conn: &mut DbConnection,
        settings: &TransactionSettings,
    ) -> DbResult<()> {
        conn.set_transaction_open(true);
        for sql in begin_statements(conn.db_type(), settings) {
            if let Err(e) = conn.execute_raw(&sql).await {
                // A half-applied begin (e.g. pending MySQL characteristics) must not
                // leak into the next checkout.
                conn.set_transaction_open(false);
                conn.discard();
                return Err(e);
            }
        }
        Ok(())
    }

    async fn commit_transaction(&self, conn: &mut DbConnection) -> DbResult<()> {
        conn.execute_raw("COMMIT").await?;
        conn.set_transaction_open(false);
        Ok(())
    }

    async fn rollback_transaction(&self, conn: &mut DbConnection) -> DbResult<()> {
        conn.execute_raw("ROLLBACK").await?;
        conn.set_transaction_open(false);
        Ok(())
    }

    async fn destroy(&self) -> DbResult<()> {
        match self.known_pool() {
            Some(pool) => {
                pool.close().await;
                info!(db_type = %self.db_type, "Pool closed");
            }
            None => debug!(db_type = %self.db_type, "Pool never resolved, nothing to close"),
        }
        Ok(())
    }

    fn shares_pool_with(&self, other: &Self) -> bool {
        match (self.known_pool(), other.known_pool()) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl DatabaseConnection for DbConnection {
    async fn execute_query(&mut self, query: &CompiledQuery) -> DbResult<QueryResult> {
        let mut stream = self.fetch(query);
        let mut result = QueryResult::default();
        while let Some(partial) = stream.try_next().await? {
            result.merge(partial);
        }
        Ok(result)
    }

    fn stream_query<'a>(
        &'a mut self,
        query: &'a CompiledQuery,
    ) -> BoxStream<'a, DbResult<QueryResult>> {
        self.fetch(query)
    }

    fn discard(&mut self) {
        DbConnection::discard(self)
    }
}

/// Statements that open a transaction with the given characteristics.
///
/// MySQL's `START TRANSACTION` takes the access mode but not the isolation level,
/// which has to be set for the next transaction beforehand.
fn begin_statements(db_type: DatabaseType, settings: &TransactionSettings) -> Vec<String> {
    match db_type {
        DatabaseType::MySQL => {
            let isolation = settings
                .isolation_level
                .map(|level| format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()));
            let start = match settings.access_mode {
                Some(mode) => format!("START TRANSACTION {}", mode.as_sql()),
                None => "START TRANSACTION".to_string(),
            };
            isolation.into_iter().chain(std::iter::once(start)).collect()
        }
        DatabaseType::PostgreSQL => match settings.characteristics() {
            Some(chars) => vec![format!("START TRANSACTION {}", chars)],
            None => vec!["BEGIN".to_string()],
        },
        DatabaseType::SQLite => {
            if let Some(chars) = settings.characteristics() {
                debug!(characteristics = %chars, "SQLite ignores transaction characteristics");
            }
            vec!["BEGIN".to_string()]
        }
    }
}
