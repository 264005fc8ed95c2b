//! Parameter binding for compiled queries.
//!
//! Binds [`QueryParam`] values onto vendor-specific sqlx queries. Both the read
//! and write side go through the same functions so a statement binds identically
//! whichever pool it is routed to.

use crate::models::QueryParam;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

pub(crate) fn bind_mysql_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [QueryParam],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
            QueryParam::Json(v) => query.bind(Json(v)),
        };
    }
    query
}

pub(crate) fn bind_postgres_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
            QueryParam::Json(v) => query.bind(Json(v)),
        };
    }
    query
}

pub(crate) fn bind_sqlite_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [QueryParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
            // No native JSON column type, stored as text
            QueryParam::Json(v) => query.bind(v.to_string()),
        };
    }
    query
}
