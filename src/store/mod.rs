//! Object-store capability and its adapters.
//!
//! The pipeline consumes storage through the three-operation [`ObjectStore`]
//! trait; the S3 adapter is one implementation of it, the in-memory store
//! another (used by tests and dry runs).

mod memory;
mod s3;
mod transfer;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
pub use transfer::{Fetcher, Publisher};

use async_trait::async_trait;

use crate::error::StoreError;

/// The object-store operations the pipeline needs: enumerate keys under a
/// prefix, fetch an object's bytes, store bytes under a key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Keys of all objects under `prefix`, in listing order.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Full body of one object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Stores `body` under `key`, overwriting any existing object.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError>;
}
