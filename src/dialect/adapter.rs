//! Vendor capabilities consulted by query builders.

use crate::models::DatabaseType;
use serde::Serialize;

/// How positional parameters are written in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `?` for every parameter (MySQL, SQLite)
    QuestionMark,
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
}

/// Capabilities of one database vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DialectAdapter {
    db_type: DatabaseType,
}

impl DialectAdapter {
    pub fn new(db_type: DatabaseType) -> Self {
        Self { db_type }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// `INSERT ... RETURNING`. SQLite has it since 3.35.
    pub fn supports_returning(&self) -> bool {
        !matches!(self.db_type, DatabaseType::MySQL)
    }

    /// Whether DDL takes part in a transaction instead of committing implicitly.
    pub fn supports_transactional_ddl(&self) -> bool {
        !matches!(self.db_type, DatabaseType::MySQL)
    }

    pub fn supports_create_if_not_exists(&self) -> bool {
        true
    }

    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self.db_type {
            DatabaseType::PostgreSQL => PlaceholderStyle::Numbered,
            DatabaseType::MySQL | DatabaseType::SQLite => PlaceholderStyle::QuestionMark,
        }
    }

    /// Placeholder for the parameter at 1-based `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self.placeholder_style() {
            PlaceholderStyle::Numbered => format!("${}", index),
            PlaceholderStyle::QuestionMark => "?".to_string(),
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self.db_type {
            DatabaseType::MySQL => format!("`{}`", ident.replace('`', "``")),
            DatabaseType::PostgreSQL | DatabaseType::SQLite => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_per_vendor() {
        let mysql = DialectAdapter::new(DatabaseType::MySQL);
        let pg = DialectAdapter::new(DatabaseType::PostgreSQL);
        let sqlite = DialectAdapter::new(DatabaseType::SQLite);

        assert!(!mysql.supports_returning());
        assert!(pg.supports_returning());
        assert!(sqlite.supports_returning());

        assert!(!mysql.supports_transactional_ddl());
        assert!(pg.supports_transactional_ddl());
        assert!(mysql.supports_create_if_not_exists());
    }

    #[test]
    fn test_placeholders() {
        let pg = DialectAdapter::new(DatabaseType::PostgreSQL);
        assert_eq!(pg.placeholder(1), "$1");
        assert_eq!(pg.placeholder(12), "$12");

        let mysql = DialectAdapter::new(DatabaseType::MySQL);
        assert_eq!(mysql.placeholder_style(), PlaceholderStyle::QuestionMark);
        assert_eq!(mysql.placeholder(3), "?");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(
            DialectAdapter::new(DatabaseType::MySQL).quote_identifier("we`ird"),
            "`we``ird`"
        );
        assert_eq!(
            DialectAdapter::new(DatabaseType::PostgreSQL).quote_identifier("user"),
            "\"user\""
        );
        assert_eq!(
            DialectAdapter::new(DatabaseType::SQLite).quote_identifier("a\"b"),
            "\"a\"\"b\""
        );
    }
}
