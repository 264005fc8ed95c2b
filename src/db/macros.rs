//! Backend dispatch macro.
//!
//! [`DbPool`](crate::db::DbPool) and the connection it hands out share the same
//! three variants. When every arm does the same thing with a
//! differently typed inner value, this macro writes the match.

/// Run `$body` with `$inner` bound to the backend-specific value.
///
/// ```ignore
/// for_each_backend!(self, DbPool, pool => pool.close().await)
/// ```
#[macro_export]
macro_rules! for_each_backend {
    ($value:expr, $enum:ident, $inner:ident => $body:expr) => {
        match $value {
            $enum::MySql($inner) => $body,
            $enum::Postgres($inner) => $body,
            $enum::SQLite($inner) => $body,
        }
    };
}
