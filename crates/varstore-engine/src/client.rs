//! Store client trait and an in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use varstore_types::{VarStoreError, VariableStore};

/// Access to persisted VariableStores.
///
/// `update` replaces the whole object. Implementations must reject a write
/// whose `metadata.resource_version` is not the current one with
/// [`VarStoreError::Conflict`] and bump the version on success.
#[async_trait]
pub trait VariableStoreClient: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> varstore_types::Result<VariableStore>;

    async fn update(&self, store: VariableStore) -> varstore_types::Result<VariableStore>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-local store keyed by `(namespace, name)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stores: RwLock<HashMap<(String, String), VariableStore>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a store without a version check.
    pub async fn insert(&self, store: VariableStore) {
        let key = (
            store.metadata.namespace.clone(),
            store.metadata.name.clone(),
        );
        self.stores.write().await.insert(key, store);
    }

    pub async fn snapshot(&self, namespace: &str, name: &str) -> Option<VariableStore> {
        self.stores
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl VariableStoreClient for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> varstore_types::Result<VariableStore> {
        self.snapshot(namespace, name)
            .await
            .ok_or_else(|| VarStoreError::StoreNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn update(&self, mut store: VariableStore) -> varstore_types::Result<VariableStore> {
        let key = (
            store.metadata.namespace.clone(),
            store.metadata.name.clone(),
        );
        let mut stores = self.stores.write().await;
        let current = stores
            .get(&key)
            .ok_or_else(|| VarStoreError::StoreNotFound {
                namespace: key.0.clone(),
                name: key.1.clone(),
            })?;

        if current.metadata.resource_version != store.metadata.resource_version {
            return Err(VarStoreError::Conflict {
                namespace: key.0,
                name: key.1,
                expected: store.metadata.resource_version,
                found: current.metadata.resource_version,
            });
        }

        store.metadata.resource_version += 1;
        stores.insert(key, store.clone());
        Ok(store)
    }
}
