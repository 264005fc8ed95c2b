//! Turns SQL text and parameters into a [`CompiledQuery`].

use crate::error::{DbError, DbResult};
use crate::models::{CompiledQuery, DatabaseType, QueryParam};
use crate::routing::classify_sql;
use tracing::debug;

/// Compiles statements for one database kind.
///
/// Compilation classifies the statement once, so the router never reparses SQL
/// on the hot path.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler {
    db_type: DatabaseType,
}

impl QueryCompiler {
    pub fn new(db_type: DatabaseType) -> Self {
        Self { db_type }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn compile(&self, sql: &str, params: Vec<QueryParam>) -> DbResult<CompiledQuery> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(DbError::invalid_input("Empty SQL statement"));
        }

        let kind = classify_sql(sql, self.db_type);
        debug!(kind = %kind, params = params.len(), "Compiled query");
        Ok(CompiledQuery::new(sql, params, kind))
    }
}
