//! Query-related data models.
//!
//! This module defines the compiled statement handed to the router and the
//! results returned by the underlying drivers.

use crate::models::DatabaseType;
use crate::routing::classify::{StatementKind, classify_sql};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One decoded result row, keyed by column name.
pub type JsonRow = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// Structured JSON value (arrays and objects)
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// A statement ready for execution: SQL text, bound parameters and its classification.
///
/// The classification is computed once when the query is compiled and is what the
/// router consults to pick a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub kind: StatementKind,
}

impl CompiledQuery {
    /// Create a compiled query with an already known statement kind.
    pub fn new(sql: impl Into<String>, params: Vec<QueryParam>, kind: StatementKind) -> Self {
        Self {
            sql: sql.into(),
            params,
            kind,
        }
    }

    /// Create a compiled query by classifying `sql` with the dialect of `db_type`.
    pub fn raw(db_type: DatabaseType, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let kind = classify_sql(&sql, db_type);
        Self {
            sql,
            params: Vec::new(),
            kind,
        }
    }

    /// Add a parameter to this query.
    pub fn with_param(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Whether the statement is a pure read.
    pub fn is_pure_read(&self) -> bool {
        self.kind.is_pure_read()
    }
}

/// Result of executing a statement, passed through from the driver unmodified.
///
/// Streaming yields one `QueryResult` per row and one per statement completion; the
/// completion item carries no rows, only the counters the vendor reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub rows: Vec<JsonRow>,
    /// Rows changed by a write statement. `None` for pure reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// Last generated identifier (MySQL `LAST_INSERT_ID()`, SQLite `last_insert_rowid()`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<u64>,
}

impl QueryResult {
    /// A result holding a single row.
    pub fn from_row(row: JsonRow) -> Self {
        Self {
            rows: vec![row],
            ..Self::default()
        }
    }

    /// Fold another partial result into this one.
    ///
    /// Rows are appended, affected counts are summed and the latest insert id wins.
    pub fn merge(&mut self, other: QueryResult) {
        self.rows.extend(other.rows);
        if let Some(n) = other.rows_affected {
            self.rows_affected = Some(self.rows_affected.unwrap_or(0) + n);
        }
        if other.insert_id.is_some() {
            self.insert_id = other.insert_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_json_shapes() {
        let params: Vec<QueryParam> =
            serde_json::from_str(r#"[null, true, 42, 1.5, "text", {"a": 1}]"#).unwrap();
        assert_eq!(params[0], QueryParam::Null);
        assert_eq!(params[1], QueryParam::Bool(true));
        assert_eq!(params[2], QueryParam::Int(42));
        assert_eq!(params[3], QueryParam::Float(1.5));
        assert_eq!(params[4], QueryParam::String("text".to_string()));
        assert_eq!(params[5].type_name(), "json");
    }

    #[test]
    fn test_compiled_query_classifies_sql() {
        let select = CompiledQuery::raw(DatabaseType::PostgreSQL, "SELECT * FROM users");
        assert!(select.is_pure_read());

        let insert = CompiledQuery::raw(DatabaseType::PostgreSQL, "INSERT INTO users VALUES (1)")
            .with_param(1i64);
        assert!(!insert.is_pure_read());
        assert_eq!(insert.params, vec![QueryParam::Int(1)]);
    }

    #[test]
    fn test_query_result_merge() {
        let mut total = QueryResult::default();
        let mut row = JsonRow::new();
        row.insert("id".to_string(), JsonValue::from(1));
        total.merge(QueryResult::from_row(row));
        total.merge(QueryResult {
            rows: Vec::new(),
            rows_affected: Some(2),
            insert_id: Some(7),
        });
        total.merge(QueryResult {
            rows: Vec::new(),
            rows_affected: Some(1),
            insert_id: None,
        });

        assert_eq!(total.rows.len(), 1);
        assert_eq!(total.rows_affected, Some(3));
        assert_eq!(total.insert_id, Some(7));
    }
}
