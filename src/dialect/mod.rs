//! Entry point for query-building layers.
//!
//! [`ReplicaDialect`] picks the vendor implementations for the configured kind
//! and hands them out. Only the driver it creates is replica-aware; the adapter,
//! compiler and introspector are the vendor ones, unchanged.

pub mod adapter;
pub mod compiler;
pub mod introspect;

pub use adapter::{DialectAdapter, PlaceholderStyle};
pub use compiler::QueryCompiler;
pub use introspect::Introspector;

use crate::db::Driver;
use crate::error::DbResult;
use crate::models::DatabaseType;
use crate::routing::{ReplicaDriver, RouterConfig};

#[derive(Debug, Clone)]
pub struct ReplicaDialect {
    db_type: DatabaseType,
    config: RouterConfig,
}

impl ReplicaDialect {
    /// Select the vendor by kind (`"mysql"`, `"pg"`, `"sqlite"`, ...).
    ///
    /// An unknown kind is rejected here. No pool is resolved or connected.
    pub fn new(kind: &str, config: RouterConfig) -> DbResult<Self> {
        Ok(Self::with_type(kind.parse()?, config))
    }

    pub fn with_type(db_type: DatabaseType, config: RouterConfig) -> Self {
        Self { db_type, config }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn create_adapter(&self) -> DialectAdapter {
        DialectAdapter::new(self.db_type)
    }

    /// A router over the configured pools.
    ///
    /// Each call builds a new driver. Deferred pool handles are resolved by that
    /// driver's `init()`, so calling this twice with a factory yields two pools.
    pub fn create_driver(&self) -> ReplicaDriver {
        ReplicaDriver::new(self.db_type, self.config.clone())
    }

    pub fn create_query_compiler(&self) -> QueryCompiler {
        QueryCompiler::new(self.db_type)
    }

    pub fn create_introspector<'a, D: Driver>(
        &self,
        driver: &'a ReplicaDriver<D>,
    ) -> Introspector<'a, D> {
        Introspector::new(driver)
    }
}
