//! In-process memory store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::traits::Memory;
use crate::application::errors::StorageError;

/// Map-backed store. Contents are lost when the process exits.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    kv: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Memory for InMemoryStore {
    async fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let kv = self.kv.read().await;
        Ok(kv
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut kv = self.kv.write().await;
        kv.insert((namespace.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }
}
