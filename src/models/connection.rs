//! Connection-related data models.
//!
//! This module defines the database kind selector, pool connection configuration
//! and the settings passed through when a transaction is started.

use crate::config::PoolOptions;
use crate::error::DbError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Get the default port for this database type.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::PostgreSQL => Some(5432),
            Self::MySQL => Some(3306),
            Self::SQLite => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Parse the database kind selector (`"mysql"`, `"pg"`, ...).
///
/// Unknown kinds are rejected before anything else is constructed.
impl FromStr for DatabaseType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySQL),
            "pg" | "postgres" | "postgresql" => Ok(Self::PostgreSQL),
            "sqlite" => Ok(Self::SQLite),
            _ => Err(DbError::unsupported_database(s)),
        }
    }
}

/// Configuration for opening one connection pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    /// Open the pool read-only where the driver supports it (SQLite).
    #[serde(default)]
    pub read_only: bool,
    /// Connection pool configuration options.
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl ConnectionConfig {
    /// Create a new connection configuration, detecting the database type from the URL.
    pub fn new(
        connection_string: impl Into<String>,
        read_only: bool,
        pool_options: PoolOptions,
    ) -> Result<Self, ConnectionConfigError> {
        let connection_string = connection_string.into();

        let db_type = DatabaseType::from_connection_string(&connection_string)
            .ok_or_else(|| ConnectionConfigError::UnknownDatabaseType(connection_string.clone()))?;

        pool_options
            .validate()
            .map_err(ConnectionConfigError::InvalidPoolOptions)?;

        Ok(Self {
            db_type,
            connection_string,
            read_only,
            pool_options,
        })
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        if let Some(at_pos) = self.connection_string.find('@') {
            if let Some(colon_pos) = self.connection_string[..at_pos].rfind(':') {
                let prefix = &self.connection_string[..colon_pos + 1];
                let suffix = &self.connection_string[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.connection_string.clone()
    }
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    /// Could not determine database type from connection string
    #[error("Unknown database type in connection string: {0}")]
    UnknownDatabaseType(String),

    #[error("Invalid pool options: {0}")]
    InvalidPoolOptions(String),
}

impl From<ConnectionConfigError> for DbError {
    fn from(err: ConnectionConfigError) -> Self {
        DbError::invalid_input(err.to_string())
    }
}

/// Identifier of one logical connection, unique per acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh identifier (`conn_` followed by a v4 uuid).
    pub fn generate() -> Self {
        Self(format!("conn_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL keyword form, as used after `ISOLATION LEVEL`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadOnly => "READ ONLY",
            Self::ReadWrite => "READ WRITE",
        }
    }
}

/// Settings forwarded unmodified to the write-side driver when a transaction begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSettings {
    #[serde(default)]
    pub isolation_level: Option<IsolationLevel>,
    #[serde(default)]
    pub access_mode: Option<AccessMode>,
}

impl TransactionSettings {
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn with_access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = Some(mode);
        self
    }

    /// Comma-separated transaction characteristics, e.g. `ISOLATION LEVEL SERIALIZABLE, READ ONLY`.
    pub fn characteristics(&self) -> Option<String> {
        let parts: Vec<String> = self
            .isolation_level
            .map(|level| format!("ISOLATION LEVEL {}", level.as_sql()))
            .into_iter()
            .chain(self.access_mode.map(|mode| mode.as_sql().to_string()))
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}
