use async_trait::async_trait;
use crate::application::errors::StorageError;

/// Memory trait - namespaced byte-blob key/value store shared by rules
///
/// Operations are single-key and immediately consistent; callers get no
/// cross-key transactions.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Read a value. A key that was never saved reads as an empty blob.
    async fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Save a value, replacing whatever was stored under the same key.
    async fn save(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError>;
}
