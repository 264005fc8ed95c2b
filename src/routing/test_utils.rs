//! Recording mock driver for router tests.
//!
//! Every driver call is appended to a log shared by both sides of the pair, so
//! tests can assert both what happened and in which order. Individual operations
//! can be made to fail.
//!
//! ```ignore
//! let log = EventLog::default();
//! let read = MockDriver::new("read", 1, &log);
//! let write = MockDriver::new("write", 2, &log);
//! write.set_failing(Op::Begin);
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde_json::Value as JsonValue;

use crate::db::{DatabaseConnection, Driver};
use crate::error::{DbError, DbResult};
use crate::models::{CompiledQuery, DatabaseType, JsonRow, QueryResult, TransactionSettings};

/// Driver operations that can be recorded or made to fail.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Op {
    Init,
    Acquire,
    Release,
    Begin,
    Commit,
    Rollback,
    Destroy,
    Query,
    Discard,
}

/// One recorded call: which side, which operation, and the SQL for queries.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Event {
    pub side: &'static str,
    pub op: Op,
    pub sql: Option<String>,
}

/// Shared, ordered record of driver calls.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    fn push(&self, side: &'static str, op: Op, sql: Option<String>) {
        self.0.lock().unwrap().push(Event { side, op, sql });
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// `(side, op)` pairs in call order.
    pub fn calls(&self) -> Vec<(&'static str, Op)> {
        self.events().into_iter().map(|e| (e.side, e.op)).collect()
    }

    pub fn count(&self, side: &str, op: Op) -> usize {
        self.events()
            .iter()
            .filter(|e| e.side == side && e.op == op)
            .count()
    }

    /// Sides that served queries, in order.
    pub fn query_sides(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .filter(|e| e.op == Op::Query)
            .map(|e| e.side)
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

pub struct MockDriver {
    side: &'static str,
    /// Drivers with the same pool id share a pool.
    pool_id: usize,
    log: EventLog,
    /// Shared with the connections this driver hands out.
    failing: Arc<Mutex<HashSet<Op>>>,
}

impl MockDriver {
    pub fn new(side: &'static str, pool_id: usize, log: &EventLog) -> Self {
        Self {
            side,
            pool_id,
            log: log.clone(),
            failing: Arc::default(),
        }
    }

    pub fn set_failing(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    fn record(&self, op: Op) -> DbResult<()> {
        self.log.push(self.side, op, None);
        injected(&self.failing, self.side, op)
    }
}

fn injected(failing: &Mutex<HashSet<Op>>, side: &str, op: Op) -> DbResult<()> {
    if failing.lock().unwrap().contains(&op) {
        Err(DbError::connection(
            format!("{} {:?} failed", side, op),
            "injected failure",
        ))
    } else {
        Ok(())
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;

    fn db_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn init(&self) -> DbResult<()> {
        self.record(Op::Init)
    }

    async fn acquire_connection(&self) -> DbResult<MockConnection> {
        self.record(Op::Acquire)?;
        Ok(MockConnection {
            side: self.side,
            log: self.log.clone(),
            failing: Arc::clone(&self.failing),
        })
    }

    async fn release_connection(&self, _conn: MockConnection) -> DbResult<()> {
        self.record(Op::Release)
    }

    async fn begin_transaction(
        &self,
        _conn: &mut MockConnection,
        _settings: &TransactionSettings,
    ) -> DbResult<()> {
        self.record(Op::Begin)
    }

    async fn commit_transaction(&self, _conn: &mut MockConnection) -> DbResult<()> {
        self.record(Op::Commit)
    }

    async fn rollback_transaction(&self, _conn: &mut MockConnection) -> DbResult<()> {
        self.record(Op::Rollback)
    }

    async fn destroy(&self) -> DbResult<()> {
        self.record(Op::Destroy)
    }

    fn shares_pool_with(&self, other: &Self) -> bool {
        self.pool_id == other.pool_id
    }
}

/// Connection returned by [`MockDriver`]. Each result row names the side that served it.
pub struct MockConnection {
    side: &'static str,
    log: EventLog,
    failing: Arc<Mutex<HashSet<Op>>>,
}

impl MockConnection {
    fn row(&self) -> QueryResult {
        let mut row = JsonRow::new();
        row.insert("side".to_string(), JsonValue::from(self.side));
        QueryResult::from_row(row)
    }
}

impl DatabaseConnection for MockConnection {
    async fn execute_query(&mut self, query: &CompiledQuery) -> DbResult<QueryResult> {
        self.log.push(self.side, Op::Query, Some(query.sql.clone()));
        injected(&self.failing, self.side, Op::Query)?;
        Ok(self.row())
    }

    fn stream_query<'a>(
        &'a mut self,
        query: &'a CompiledQuery,
    ) -> BoxStream<'a, DbResult<QueryResult>> {
        self.log.push(self.side, Op::Query, Some(query.sql.clone()));
        if let Err(e) = injected(&self.failing, self.side, Op::Query) {
            return stream::once(async move { Err(e) }).boxed();
        }
        stream::iter(vec![Ok(self.row()), Ok(self.row())]).boxed()
    }

    fn discard(&mut self) {
        self.log.push(self.side, Op::Discard, None);
    }
}
