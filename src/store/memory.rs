//! In-memory object store for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::ObjectStore;

/// A `BTreeMap`-backed store. Listing order is lexicographic by key, matching
/// the ordering guarantee of a real S3 listing.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object, bypassing the `put` counter.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .expect("store lock poisoned")
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    /// Current body of an object, if present.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("store lock poisoned")
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of `put` calls made through the trait.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let objects = self.objects.lock().expect("store lock poisoned");
        Ok(objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.object(bucket, key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.objects
            .lock()
            .expect("store lock poisoned")
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }
}
