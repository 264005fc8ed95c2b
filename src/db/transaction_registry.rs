//! Registry of logical connections with an open transaction.
//!
//! The per-connection flag is what routing consults; the registry is a shared
//! index kept in step with it so that open transactions can be listed and
//! inspected across connections.
//!
//! The lock is never held across an await, which lets a `Registration` remove
//! its entry from `Drop`.

use crate::error::{DbError, DbResult};
use crate::models::{ConnectionId, TransactionSettings};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::debug;

struct OpenTransaction {
    transaction_id: String,
    settings: TransactionSettings,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Metadata about an open transaction.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionMetadata {
    /// Unique transaction identifier
    pub transaction_id: String,
    /// Logical connection holding the transaction
    pub connection_id: ConnectionId,
    pub started_at: DateTime<Utc>,
    /// Seconds since the transaction started
    pub duration_secs: u64,
    pub settings: TransactionSettings,
}

#[derive(Clone, Default)]
pub struct TransactionRegistry {
    transactions: Arc<RwLock<HashMap<ConnectionId, OpenTransaction>>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, OpenTransaction>> {
        self.transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, OpenTransaction>> {
        self.transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `connection_id` has entered a transaction.
    ///
    /// Returns the generated transaction id.
    pub async fn insert(
        &self,
        connection_id: &ConnectionId,
        settings: TransactionSettings,
    ) -> DbResult<String> {
        let mut txs = self.write();
        if txs.contains_key(connection_id) {
            return Err(DbError::transaction(
                "Transaction already open",
                connection_id.as_str(),
            ));
        }

        let transaction_id = generate_transaction_id();
        txs.insert(
            connection_id.clone(),
            OpenTransaction {
                transaction_id: transaction_id.clone(),
                settings,
                started_at: Utc::now(),
                started: Instant::now(),
            },
        );
        debug!(
            connection_id = %connection_id,
            transaction_id = %transaction_id,
            "Transaction registered"
        );
        Ok(transaction_id)
    }

    /// Remove the entry for `connection_id`, returning its metadata if it was present.
    pub async fn remove(&self, connection_id: &ConnectionId) -> Option<TransactionMetadata> {
        self.remove_entry(connection_id)
    }

    fn remove_entry(&self, connection_id: &ConnectionId) -> Option<TransactionMetadata> {
        let entry = self.write().remove(connection_id)?;
        debug!(connection_id = %connection_id, "Transaction unregistered");
        Some(entry.metadata(connection_id))
    }

    /// A guard that removes the entry for `connection_id` when dropped.
    pub(crate) fn registration(&self, connection_id: &ConnectionId) -> Registration {
        Registration {
            registry: self.clone(),
            connection_id: connection_id.clone(),
        }
    }

    pub async fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.read().contains_key(connection_id)
    }

    pub async fn get(&self, connection_id: &ConnectionId) -> Option<TransactionMetadata> {
        self.read()
            .get(connection_id)
            .map(|entry| entry.metadata(connection_id))
    }

    /// List all open transactions, oldest first.
    pub async fn list_all(&self) -> Vec<TransactionMetadata> {
        let txs = self.read();
        let mut list: Vec<TransactionMetadata> =
            txs.iter().map(|(id, entry)| entry.metadata(id)).collect();
        list.sort_by_key(|meta| meta.started_at);
        list
    }

    pub async fn count(&self) -> usize {
        self.read().len()
    }
}

/// Ties a registry entry to the lifetime of the connection holding it.
///
/// Dropping a connection mid-transaction drops its registration too, so the
/// registry never outlives the connections it describes.
pub(crate) struct Registration {
    registry: TransactionRegistry,
    connection_id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove_entry(&self.connection_id);
    }
}

impl OpenTransaction {
    fn metadata(&self, connection_id: &ConnectionId) -> TransactionMetadata {
        TransactionMetadata {
            transaction_id: self.transaction_id.clone(),
            connection_id: connection_id.clone(),
            started_at: self.started_at,
            duration_secs: self.started.elapsed().as_secs(),
            settings: self.settings,
        }
    }
}

fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IsolationLevel;

    #[test]
    fn test_transaction_id_format() {
        let id = generate_transaction_id();
        assert!(id.starts_with("tx_"));
        assert_eq!(id.len(), 3 + 32);
    }

    #[tokio::test]
    async fn test_registry_starts_empty() {
        let registry = TransactionRegistry::new();
        assert_eq!(registry.count().await, 0);
        assert!(registry.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let registry = TransactionRegistry::new();
        let id = ConnectionId::generate();
        let settings =
            TransactionSettings::default().with_isolation_level(IsolationLevel::Serializable);

        let tx_id = registry.insert(&id, settings).await.unwrap();
        assert!(registry.contains(&id).await);

        let meta = registry.get(&id).await.unwrap();
        assert_eq!(meta.transaction_id, tx_id);
        assert_eq!(meta.settings, settings);

        let removed = registry.remove(&id).await.unwrap();
        assert_eq!(removed.connection_id, id);
        assert!(!registry.contains(&id).await);
        assert!(registry.remove(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_double_insert_rejected() {
        let registry = TransactionRegistry::new();
        let id = ConnectionId::generate();
        registry
            .insert(&id, TransactionSettings::default())
            .await
            .unwrap();

        let err = registry
            .insert(&id, TransactionSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Transaction { .. }));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_dropping_registration_removes_entry() {
        let registry = TransactionRegistry::new();
        let id = ConnectionId::generate();
        registry
            .insert(&id, TransactionSettings::default())
            .await
            .unwrap();

        let registration = registry.registration(&id);
        assert!(registry.contains(&id).await);
        drop(registration);
        assert!(!registry.contains(&id).await);

        // An entry already removed explicitly is not an error.
        registry
            .insert(&id, TransactionSettings::default())
            .await
            .unwrap();
        let registration = registry.registration(&id);
        registry.remove(&id).await.unwrap();
        drop(registration);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_for_distinct_ids() {
        let registry = TransactionRegistry::new();
        let ids: Vec<ConnectionId> = (0..16).map(|_| ConnectionId::generate()).collect();

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .insert(&id, TransactionSettings::default())
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.count().await, ids.len());
        assert_eq!(registry.list_all().await.len(), ids.len());
    }
}
