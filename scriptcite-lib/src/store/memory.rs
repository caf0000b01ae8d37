use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::ObjectStore;
use crate::Result;

/// In-memory object store for development and testing.
///
/// Keys are kept sorted, so a prefix listing is a range scan.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Check if store is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove an object, returning whether it existed
    pub async fn remove(&self, key: &str) -> bool {
        self.objects.write().await.remove(key).is_some()
    }

    /// Clear all stored data
    pub async fn clear(&self) {
        self.objects.write().await.clear();
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }
}
