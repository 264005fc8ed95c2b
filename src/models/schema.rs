//! Schema-related data models.
//!
//! This module defines types for database schema introspection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table_type: TableType,
    /// MySQL only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableInfo {
    /// Create a new table info.
    pub fn new(name: impl Into<String>, table_type: TableType) -> Self {
        Self {
            name: name.into(),
            schema: None,
            table_type,
            engine: None,
            comment: None,
        }
    }

    /// Set the schema name.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the storage engine (MySQL only).
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Type of database table object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Table,
    View,
    SystemTable,
    TemporaryTable,
}

impl TableType {
    /// Parse table type from database-specific string.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "table" | "base table" => Self::Table,
            "view" | "system view" => Self::View,
            "system table" => Self::SystemTable,
            "local temporary" | "temporary" | "temp" => Self::TemporaryTable,
            _ => Self::Table,
        }
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::View => write!(f, "view"),
            Self::SystemTable => write!(f, "system_table"),
            Self::TemporaryTable => write!(f, "temporary_table"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_type_parse() {
        assert_eq!(TableType::parse("BASE TABLE"), TableType::Table);
        assert_eq!(TableType::parse("table"), TableType::Table);
        assert_eq!(TableType::parse("VIEW"), TableType::View);
        assert_eq!(TableType::parse("LOCAL TEMPORARY"), TableType::TemporaryTable);
        assert_eq!(TableType::parse("something else"), TableType::Table);
    }

    #[test]
    fn test_table_info_serialization_skips_empty() {
        let table = TableInfo::new("users", TableType::Table);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json, serde_json::json!({"name": "users", "table_type": "table"}));
    }
}
