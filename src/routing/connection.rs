//! The caller-visible connection.
//!
//! A [`LogicalConnection`] wraps one connection per side (or a single shared one)
//! and routes every statement with [`decide`]. The transaction flag it carries is
//! authoritative for routing. While the flag is set the connection also holds its
//! registry entry, so dropping it mid-transaction unregisters the transaction.

use crate::db::DatabaseConnection;
use crate::db::transaction_registry::Registration;
use crate::error::DbResult;
use crate::models::{CompiledQuery, ConnectionId, QueryResult};
use crate::routing::decider::{Route, decide};
use futures_util::stream::BoxStream;
use tracing::debug;

/// Whether a logical connection is inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    InTransaction,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InTransaction)
    }
}

/// Underlying connections of a logical connection.
pub(crate) enum Members<C> {
    /// Read and write collapse to the same connection.
    Single(C),
    Paired { read: C, write: C },
}

pub struct LogicalConnection<C> {
    id: ConnectionId,
    members: Members<C>,
    state: TransactionState,
    registration: Option<Registration>,
}

impl<C> LogicalConnection<C> {
    pub(crate) fn single(conn: C) -> Self {
        Self::with_members(Members::Single(conn))
    }

    pub(crate) fn paired(read: C, write: C) -> Self {
        Self::with_members(Members::Paired { read, write })
    }

    fn with_members(members: Members<C>) -> Self {
        Self {
            id: ConnectionId::generate(),
            members,
            state: TransactionState::Idle,
            registration: None,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    pub fn in_transaction(&self) -> bool {
        self.state.is_active()
    }

    /// Whether reads and writes use distinct underlying connections.
    pub fn is_paired(&self) -> bool {
        matches!(self.members, Members::Paired { .. })
    }

    /// The side `query` would be sent to right now.
    pub fn route_for(&self, query: &CompiledQuery) -> Route {
        decide(query.kind, self.in_transaction())
    }

    /// Leaving a transaction also drops the registry entry, if one is held.
    pub(crate) fn set_state(&mut self, state: TransactionState) {
        self.state = state;
        if !state.is_active() {
            self.registration = None;
        }
    }

    pub(crate) fn hold_registration(&mut self, registration: Registration) {
        self.registration = Some(registration);
    }

    /// The connection transaction control is issued on.
    pub(crate) fn write_connection(&mut self) -> &mut C {
        self.connection_for(Route::Write)
    }

    fn connection_for(&mut self, route: Route) -> &mut C {
        match (&mut self.members, route) {
            (Members::Single(conn), _) => conn,
            (Members::Paired { read, .. }, Route::Read) => read,
            (Members::Paired { write, .. }, Route::Write) => write,
        }
    }

    pub(crate) fn into_members(self) -> Members<C> {
        self.members
    }
}

impl<C: DatabaseConnection> LogicalConnection<C> {
    /// Run a statement on the side chosen by the routing rule.
    ///
    /// The driver's result is returned unchanged.
    pub async fn execute_query(&mut self, query: &CompiledQuery) -> DbResult<QueryResult> {
        let route = self.route_for(query);
        debug!(
            connection_id = %self.id,
            route = %route,
            kind = %query.kind,
            "Executing query"
        );
        self.connection_for(route).execute_query(query).await
    }

    /// Stream a statement from the side chosen by the routing rule.
    ///
    /// Routing follows the same rule as [`execute_query`](Self::execute_query), so
    /// a stream opened inside a transaction reads from the write side.
    pub fn stream_query<'a>(
        &'a mut self,
        query: &'a CompiledQuery,
    ) -> BoxStream<'a, DbResult<QueryResult>> {
        let route = self.route_for(query);
        debug!(
            connection_id = %self.id,
            route = %route,
            kind = %query.kind,
            "Streaming query"
        );
        self.connection_for(route).stream_query(query)
    }
}

impl<C> std::fmt::Debug for LogicalConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalConnection")
            .field("id", &self.id)
            .field("paired", &self.is_paired())
            .field("state", &self.state)
            .finish()
    }
}
