//! SQL statement classification for read/write routing.
//!
//! Only statements classified as [`StatementKind::Select`] are pure reads and may
//! be served by the replica. Everything else, including input that fails to parse,
//! is treated as a write.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) with the dialect of the configured
//! database so that vendor syntax does not cause spurious parse failures.

use crate::models::DatabaseType;
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use tracing::debug;

/// Type of SQL statement detected by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Top-level SELECT (or VALUES / set operation) with no side effects
    Select,
    /// SELECT ... FOR UPDATE / FOR SHARE
    LockingRead,
    /// INSERT, UPDATE, DELETE, MERGE, COPY, data-modifying CTEs
    DmlWrite,
    /// CREATE, DROP, ALTER, TRUNCATE, SELECT ... INTO
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT
    Transaction,
    /// CALL, EXECUTE, PREPARE
    ProcedureCall,
    /// SHOW, DESCRIBE, EXPLAIN
    Inspection,
    /// GRANT, REVOKE, SET, USE
    Administrative,
    /// Unknown, unparseable or multi-statement input
    Unknown,
}

impl StatementKind {
    /// Whether the statement is a pure read.
    pub fn is_pure_read(&self) -> bool {
        matches!(self, Self::Select)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::LockingRead => "locking_read",
            Self::DmlWrite => "dml_write",
            Self::Ddl => "ddl",
            Self::Transaction => "transaction",
            Self::ProcedureCall => "procedure_call",
            Self::Inspection => "inspection",
            Self::Administrative => "administrative",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Get the appropriate SQL dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Classify SQL text using the dialect of `db_type`.
///
/// # Examples
///
/// ```
/// use db_replica_router::models::DatabaseType;
/// use db_replica_router::routing::classify::{StatementKind, classify_sql};
///
/// assert_eq!(classify_sql("SELECT * FROM users", DatabaseType::PostgreSQL), StatementKind::Select);
/// assert_eq!(
///     classify_sql("INSERT INTO users VALUES (1)", DatabaseType::MySQL),
///     StatementKind::DmlWrite
/// );
/// ```
pub fn classify_sql(sql: &str, db_type: DatabaseType) -> StatementKind {
    let dialect = get_dialect(db_type);

    let statements = match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) => statements,
        Err(e) => {
            debug!(error = %e, "Unparseable statement classified as unknown");
            return StatementKind::Unknown;
        }
    };

    match statements.as_slice() {
        [stmt] => classify_statement(stmt),
        // Empty input or several statements in one string: never a pure read
        _ => StatementKind::Unknown,
    }
}

/// Classify a single parsed statement.
pub fn classify_statement(stmt: &Statement) -> StatementKind {
    match stmt {
        Statement::Query(query) => classify_query(query),

        Statement::Insert { .. } => StatementKind::DmlWrite,
        Statement::Update { .. } => StatementKind::DmlWrite,
        Statement::Delete { .. } => StatementKind::DmlWrite,
        Statement::Merge { .. } => StatementKind::DmlWrite,
        Statement::Copy { .. } => StatementKind::DmlWrite,

        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreateType { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateProcedure { .. }
        | Statement::CreateTrigger { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateVirtualTable { .. }
        | Statement::CreateExtension { .. }
        | Statement::AlterTable { .. }
        | Statement::AlterView { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterRole { .. }
        | Statement::AlterType { .. }
        | Statement::Drop { .. }
        | Statement::DropFunction { .. }
        | Statement::DropProcedure { .. }
        | Statement::DropTrigger { .. }
        | Statement::Truncate { .. }
        | Statement::Comment { .. } => StatementKind::Ddl,

        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. }
        | Statement::Savepoint { .. }
        | Statement::ReleaseSavepoint { .. } => StatementKind::Transaction,

        Statement::Call { .. }
        | Statement::Execute { .. }
        | Statement::Prepare { .. }
        | Statement::Deallocate { .. } => StatementKind::ProcedureCall,

        Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ExplainTable { .. }
        | Statement::Explain { .. } => StatementKind::Inspection,

        Statement::Grant { .. }
        | Statement::Revoke { .. }
        | Statement::Set { .. }
        | Statement::Use { .. }
        | Statement::Kill { .. }
        | Statement::LockTables { .. }
        | Statement::Pragma { .. } => StatementKind::Administrative,

        _ => StatementKind::Unknown,
    }
}

/// Classify a `Statement::Query`, looking through CTEs and set operations.
fn classify_query(query: &Query) -> StatementKind {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            let inner = classify_query(&cte.query);
            if !inner.is_pure_read() {
                return inner;
            }
        }
    }

    let body = classify_set_expr(&query.body);
    if body.is_pure_read() && !query.locks.is_empty() {
        return StatementKind::LockingRead;
    }
    body
}

fn classify_set_expr(expr: &SetExpr) -> StatementKind {
    match expr {
        SetExpr::Select(select) => {
            if select.into.is_some() {
                StatementKind::Ddl
            } else {
                StatementKind::Select
            }
        }
        SetExpr::Query(query) => classify_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            let left = classify_set_expr(left);
            if !left.is_pure_read() {
                return left;
            }
            classify_set_expr(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => StatementKind::Select,
        // INSERT/UPDATE/DELETE bodies of a WITH ... statement
        _ => StatementKind::DmlWrite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Use PostgreSQL as default test database type
    const TEST_DB_TYPE: DatabaseType = DatabaseType::PostgreSQL;

    #[test]
    fn test_plain_select_is_pure_read() {
        assert_eq!(
            classify_sql("SELECT * FROM users", TEST_DB_TYPE),
            StatementKind::Select
        );
    }

    #[test]
    fn test_complex_select_with_subquery() {
        let sql = r#"
            SELECT u.name, (SELECT COUNT(*) FROM orders WHERE user_id = u.id) as order_count
            FROM users u
            WHERE u.id IN (SELECT user_id FROM active_users)
        "#;
        assert!(classify_sql(sql, TEST_DB_TYPE).is_pure_read());
    }

    #[test]
    fn test_select_with_union() {
        let sql = "SELECT a FROM t1 UNION ALL SELECT b FROM t2";
        assert!(classify_sql(sql, TEST_DB_TYPE).is_pure_read());
    }

    #[test]
    fn test_read_only_cte_is_pure_read() {
        let sql = "WITH recent AS (SELECT id FROM users WHERE id > 10) SELECT * FROM recent";
        assert!(classify_sql(sql, TEST_DB_TYPE).is_pure_read());
    }

    #[test]
    fn test_dml_is_write() {
        for sql in [
            "INSERT INTO users VALUES (1)",
            "UPDATE users SET name = 'test'",
            "DELETE FROM users WHERE id = 1",
        ] {
            assert_eq!(
                classify_sql(sql, TEST_DB_TYPE),
                StatementKind::DmlWrite,
                "{}",
                sql
            );
        }
    }

    #[test]
    fn test_insert_select_is_write() {
        let sql = "INSERT INTO archive SELECT * FROM users WHERE created_at < '2020-01-01'";
        assert_eq!(classify_sql(sql, TEST_DB_TYPE), StatementKind::DmlWrite);
    }

    #[test]
    fn test_ddl_is_write() {
        assert_eq!(
            classify_sql("CREATE TABLE test (id INT)", TEST_DB_TYPE),
            StatementKind::Ddl
        );
        assert_eq!(
            classify_sql("DROP TABLE users", TEST_DB_TYPE),
            StatementKind::Ddl
        );
    }

    #[test]
    fn test_select_for_update_is_not_pure_read() {
        let kind = classify_sql("SELECT * FROM users WHERE id = 1 FOR UPDATE", TEST_DB_TYPE);
        assert_eq!(kind, StatementKind::LockingRead);
        assert!(!kind.is_pure_read());
    }

    #[test]
    fn test_data_modifying_cte_is_write() {
        let sql = "WITH moved AS (DELETE FROM users WHERE id = 1 RETURNING *) SELECT * FROM moved";
        assert!(!classify_sql(sql, TEST_DB_TYPE).is_pure_read());
    }

    #[test]
    fn test_multiple_statements_are_not_pure_read() {
        let sql = "SELECT 1; SELECT 2";
        assert_eq!(classify_sql(sql, TEST_DB_TYPE), StatementKind::Unknown);
    }

    #[test]
    fn test_unparseable_is_unknown() {
        assert_eq!(
            classify_sql("THIS IS NOT SQL", TEST_DB_TYPE),
            StatementKind::Unknown
        );
        assert_eq!(classify_sql("", TEST_DB_TYPE), StatementKind::Unknown);
    }

    #[test]
    fn test_transaction_control_is_not_pure_read() {
        assert_eq!(
            classify_sql("COMMIT", TEST_DB_TYPE),
            StatementKind::Transaction
        );
    }

    #[test]
    fn test_mysql_dialect_backticks() {
        assert!(classify_sql("SELECT `name` FROM `users`", DatabaseType::MySQL).is_pure_read());
    }

    #[test]
    fn test_sqlite_dialect_insert() {
        assert_eq!(
            classify_sql("INSERT INTO users (name) VALUES ('a'), ('b')", DatabaseType::SQLite),
            StatementKind::DmlWrite
        );
    }
}
