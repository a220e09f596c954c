//! Cache primitive used by the strategies and the lifecycle.
//!
//! Strategies only see this trait, so tests can hand them any store
//! implementation without a real database file.

use super::connection::CacheDb;
use crate::Error;
use crate::http::{RequestIdentity, ResponseSnapshot};

/// Persistent key-value cache scoped by store version.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the store if it does not exist yet.
    async fn open(&self, store: &str) -> Result<(), Error>;

    /// Look up a stored response by request identity.
    async fn match_entry(&self, store: &str, identity: &RequestIdentity) -> Result<Option<ResponseSnapshot>, Error>;

    /// Store (or overwrite) a response in an existing store.
    async fn put(&self, store: &str, identity: &RequestIdentity, response: &ResponseSnapshot) -> Result<(), Error>;

    /// Store a batch of responses atomically.
    async fn put_all(&self, store: &str, entries: Vec<(RequestIdentity, ResponseSnapshot)>) -> Result<(), Error>;

    /// Delete a whole store. Returns whether it existed.
    async fn delete(&self, store: &str) -> Result<bool, Error>;

    /// Store names, newest first.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    async fn entry_count(&self, store: &str) -> Result<u64, Error>;

    /// Keep only the newest `max_entries` entries of a store.
    async fn trim(&self, store: &str, max_entries: usize) -> Result<u64, Error>;
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, store: &str) -> Result<(), Error> {
        self.open_store(store).await
    }

    async fn match_entry(&self, store: &str, identity: &RequestIdentity) -> Result<Option<ResponseSnapshot>, Error> {
        CacheDb::match_entry(self, store, identity).await
    }

    async fn put(&self, store: &str, identity: &RequestIdentity, response: &ResponseSnapshot) -> Result<(), Error> {
        self.put_entry(store, identity, response).await
    }

    async fn put_all(&self, store: &str, entries: Vec<(RequestIdentity, ResponseSnapshot)>) -> Result<(), Error> {
        self.put_batch(store, entries).await
    }

    async fn delete(&self, store: &str) -> Result<bool, Error> {
        self.delete_store(store).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.list_stores().await
    }

    async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        self.count_entries(store).await
    }

    async fn trim(&self, store: &str, max_entries: usize) -> Result<u64, Error> {
        self.trim_store(store, max_entries).await
    }
}
