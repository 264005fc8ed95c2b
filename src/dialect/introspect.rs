//! Table listing through the router.
//!
//! Catalog queries are plain SELECTs, so outside a transaction they are served
//! by the read side like any other pure read.

use crate::db::Driver;
use crate::error::DbResult;
use crate::models::{CompiledQuery, DatabaseType, JsonRow, QueryParam, TableInfo, TableType};
use crate::routing::{ReplicaDriver, StatementKind};
use tracing::debug;

mod queries {
    pub const POSTGRES_LIST_TABLES: &str = r#"
        SELECT
            t.table_name::text AS table_name,
            t.table_type::text AS table_type,
            obj_description((quote_ident($1) || '.' || quote_ident(t.table_name))::regclass) AS comment
        FROM information_schema.tables t
        WHERE t.table_schema = $1
        AND t.table_type IN ('BASE TABLE', 'VIEW')
        ORDER BY t.table_name
        "#;

    pub const MYSQL_LIST_TABLES: &str = r#"
        SELECT
            CONVERT(TABLE_NAME USING utf8) AS table_name,
            CONVERT(TABLE_TYPE USING utf8) AS table_type,
            CONVERT(ENGINE USING utf8) AS engine,
            CONVERT(TABLE_COMMENT USING utf8) AS comment
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = DATABASE()
        AND TABLE_TYPE IN ('BASE TABLE', 'VIEW')
        ORDER BY TABLE_NAME
        "#;

    pub const SQLITE_LIST_TABLES: &str = r#"
        SELECT name AS table_name, type AS table_type FROM sqlite_master
        WHERE type IN ('table', 'view')
        AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#;
}

/// Lists tables and views of the database behind a [`ReplicaDriver`].
pub struct Introspector<'a, D> {
    driver: &'a ReplicaDriver<D>,
}

impl<'a, D: Driver> Introspector<'a, D> {
    pub fn new(driver: &'a ReplicaDriver<D>) -> Self {
        Self { driver }
    }

    /// Tables and views, ordered by name. PostgreSQL lists the `public` schema.
    pub async fn get_tables(&self) -> DbResult<Vec<TableInfo>> {
        let db_type = self.driver.db_type();
        let query = list_tables_query(db_type);

        let mut conn = self.driver.acquire_connection().await?;
        let result = conn.execute_query(&query).await;
        let released = self.driver.release_connection(conn).await;

        // A failed catalog query outranks a failed release.
        let result = result?;
        released?;

        let tables: Vec<TableInfo> = result
            .rows
            .iter()
            .filter_map(|row| table_from_row(row, db_type))
            .collect();

        debug!(count = tables.len(), db_type = %db_type, "Listed tables");
        Ok(tables)
    }
}

fn list_tables_query(db_type: DatabaseType) -> CompiledQuery {
    match db_type {
        DatabaseType::PostgreSQL => CompiledQuery::new(
            queries::POSTGRES_LIST_TABLES,
            vec![QueryParam::from("public")],
            StatementKind::Select,
        ),
        DatabaseType::MySQL => {
            CompiledQuery::new(queries::MYSQL_LIST_TABLES, vec![], StatementKind::Select)
        }
        DatabaseType::SQLite => {
            CompiledQuery::new(queries::SQLITE_LIST_TABLES, vec![], StatementKind::Select)
        }
    }
}

fn text<'r>(row: &'r JsonRow, column: &str) -> Option<&'r str> {
    row.get(column)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

fn table_from_row(row: &JsonRow, db_type: DatabaseType) -> Option<TableInfo> {
    let name = text(row, "table_name")?;
    let table_type = text(row, "table_type").map_or(TableType::Table, TableType::parse);

    let mut table = TableInfo::new(name, table_type);
    if db_type == DatabaseType::PostgreSQL {
        table = table.with_schema("public");
    }
    if let Some(engine) = text(row, "engine") {
        table = table.with_engine(engine);
    }
    if let Some(comment) = text(row, "comment") {
        table = table.with_comment(comment);
    }
    Some(table)
}
