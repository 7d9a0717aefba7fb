//! Byte-level key-value storage.
//!
//! [`KvStore`] is the tier the persistent telemetry store scans over: a
//! namespace plus a key identifies a byte blob. Namespaces are a caller
//! convention (e.g. `"telemetry:records"`), not a first-class concept of the
//! backend.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::StorageResult;

/// A single stored entry, used by iteration APIs that need the key back
/// alongside the value.
#[derive(Debug, Clone)]
pub struct KvEntry {
    /// The key within its namespace.
    pub key: String,
    /// The raw stored bytes.
    pub value: Vec<u8>,
}

/// Byte-level key-value store.
///
/// Implementations must be safe to share across threads/tasks; callers are
/// expected to serialize their own values (typically with `serde_json`).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value by namespace and key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store a value under a namespace and key, overwriting any existing
    /// value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to write.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a value. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to delete.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()>;

    /// List every entry in a namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to scan.
    async fn list(&self, namespace: &str) -> StorageResult<Vec<KvEntry>>;
}

/// In-memory [`KvStore`], for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryKvStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let data = self.data.read().expect("kv store lock poisoned");
        Ok(data.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write().expect("kv store lock poisoned");
        data.insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        let mut data = self.data.write().expect("kv store lock poisoned");
        data.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    async fn list(&self, namespace: &str) -> StorageResult<Vec<KvEntry>> {
        let data = self.data.read().expect("kv store lock poisoned");
        Ok(data
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|((_, key), value)| KvEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}

/// A [`KvStore`] wrapper that prefixes every namespace with a fixed scope,
/// so unrelated callers sharing one backing store cannot collide.
pub struct ScopedKvStore {
    inner: std::sync::Arc<dyn KvStore>,
    scope: String,
}

impl ScopedKvStore {
    /// Wrap `inner`, prefixing every namespace with `scope`.
    pub fn new(inner: std::sync::Arc<dyn KvStore>, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }

    fn scoped_namespace(&self, namespace: &str) -> String {
        format!("{}:{namespace}", self.scope)
    }
}

#[async_trait]
impl KvStore for ScopedKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(&self.scoped_namespace(namespace), key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner
            .set(&self.scoped_namespace(namespace), key, value)
            .await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        self.inner.delete(&self.scoped_namespace(namespace), key).await
    }

    async fn list(&self, namespace: &str) -> StorageResult<Vec<KvEntry>> {
        self.inner.list(&self.scoped_namespace(namespace)).await
    }
}

#[cfg(feature = "kv")]
mod surreal_kv {
    use super::{KvEntry, KvStore, StorageResult};
    use crate::error::StorageError;
    use async_trait::async_trait;
    use std::path::Path;

    /// [`KvStore`] backed by an embedded `SurrealKV` instance.
    pub struct SurrealKvStore {
        store: surrealkv::Store,
    }

    impl SurrealKvStore {
        /// Open (or create) a `SurrealKV` store at `path`.
        ///
        /// # Errors
        ///
        /// Returns an error if the on-disk store cannot be opened.
        pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
            let mut opts = surrealkv::Options::new();
            opts.dir = path.as_ref().to_path_buf();
            let store = surrealkv::Store::new(opts)
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            Ok(Self { store })
        }

        fn composite_key(namespace: &str, key: &str) -> Vec<u8> {
            format!("{namespace}\u{0}{key}").into_bytes()
        }
    }

    #[async_trait]
    impl KvStore for SurrealKvStore {
        async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
            let composite = Self::composite_key(namespace, key);
            let mut txn = self
                .store
                .begin()
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            let value = txn
                .get(&composite)
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            Ok(value.map(|v| v.to_vec()))
        }

        async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
            let composite = Self::composite_key(namespace, key);
            let mut txn = self
                .store
                .begin()
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            txn.set(&composite, &value)
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            txn.commit()
                .await
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            Ok(())
        }

        async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
            let composite = Self::composite_key(namespace, key);
            let mut txn = self
                .store
                .begin()
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            txn.delete(&composite)
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            txn.commit()
                .await
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            Ok(())
        }

        async fn list(&self, namespace: &str) -> StorageResult<Vec<KvEntry>> {
            let prefix = format!("{namespace}\u{0}");
            let mut txn = self
                .store
                .begin()
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            let range = txn
                .scan(prefix.as_bytes().to_vec().., None)
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            let mut entries = Vec::new();
            for (k, v, _) in range {
                let Ok(full_key) = String::from_utf8(k) else {
                    continue;
                };
                let Some(key) = full_key.strip_prefix(&prefix) else {
                    continue;
                };
                entries.push(KvEntry {
                    key: key.to_string(),
                    value: v,
                });
            }
            Ok(entries)
        }
    }
}

#[cfg(feature = "kv")]
pub use surreal_kv::SurrealKvStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryKvStore::new();
        store.set("ns", "a", b"hello".to_vec()).await.unwrap();
        let got = store.get("ns", "a").await.unwrap();
        assert_eq!(got, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn memory_store_missing_key_is_none() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("ns", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_delete_is_idempotent() {
        let store = MemoryKvStore::new();
        store.set("ns", "a", b"hello".to_vec()).await.unwrap();
        store.delete("ns", "a").await.unwrap();
        store.delete("ns", "a").await.unwrap();
        assert_eq!(store.get("ns", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_list_scopes_to_namespace() {
        let store = MemoryKvStore::new();
        store.set("a", "k1", b"1".to_vec()).await.unwrap();
        store.set("b", "k2", b"2".to_vec()).await.unwrap();
        let entries = store.list("a").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "k1");
    }

    #[tokio::test]
    async fn scoped_store_isolates_namespaces() {
        let inner = std::sync::Arc::new(MemoryKvStore::new());
        let a = ScopedKvStore::new(inner.clone(), "a");
        let b = ScopedKvStore::new(inner.clone(), "b");
        a.set("ns", "k", b"from-a".to_vec()).await.unwrap();
        assert_eq!(b.get("ns", "k").await.unwrap(), None);
        assert_eq!(a.get("ns", "k").await.unwrap(), Some(b"from-a".to_vec()));
    }
}
