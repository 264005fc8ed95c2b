//! The routing rule.

use crate::routing::classify::StatementKind;
use serde::Serialize;

/// Which side of the pair serves a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Read,
    Write,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Read => "read",
            Route::Write => "write",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick a side for a statement.
///
/// An open transaction pins everything to the write side. Otherwise only pure
/// reads go to the replica.
pub fn decide(kind: StatementKind, in_transaction: bool) -> Route {
    if in_transaction {
        Route::Write
    } else if kind.is_pure_read() {
        Route::Read
    } else {
        Route::Write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [StatementKind; 9] = [
        StatementKind::Select,
        StatementKind::LockingRead,
        StatementKind::DmlWrite,
        StatementKind::Ddl,
        StatementKind::Transaction,
        StatementKind::ProcedureCall,
        StatementKind::Inspection,
        StatementKind::Administrative,
        StatementKind::Unknown,
    ];

    #[test]
    fn test_pure_read_outside_transaction_goes_to_read() {
        assert_eq!(decide(StatementKind::Select, false), Route::Read);
    }

    #[test]
    fn test_non_reads_outside_transaction_go_to_write() {
        for kind in ALL_KINDS.into_iter().filter(|k| !k.is_pure_read()) {
            assert_eq!(decide(kind, false), Route::Write, "{}", kind);
        }
    }

    #[test]
    fn test_everything_inside_transaction_goes_to_write() {
        for kind in ALL_KINDS {
            assert_eq!(decide(kind, true), Route::Write, "{}", kind);
        }
    }

    #[test]
    fn test_route_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Route::Read).unwrap(), r#""read""#);
        assert_eq!(Route::Write.to_string(), "write");
    }
}
