//! Key-value store access for usage statistics
//!
//! The relay writes usage counters into Redis; this crate only reads them.
//! `MemoryStore` serves the same data from a JSON snapshot.

mod memory;
mod redis_store;

use std::collections::HashMap;

use crate::error::StoreError;

pub(crate) use memory::MemoryStore;
pub(crate) use redis_store::RedisStore;

pub(crate) type StoreResult<T> = Result<T, StoreError>;

/// One command queued in a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoreCommand {
    pub(crate) name: String,
    pub(crate) args: Vec<String>,
}

impl StoreCommand {
    pub(crate) fn new(name: &str, args: Vec<String>) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            args,
        }
    }

    pub(crate) fn get(key: impl Into<String>) -> Self {
        Self::new("GET", vec![key.into()])
    }

    pub(crate) fn hget(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new("HGET", vec![key.into(), field.into()])
    }
}

/// Read-only view of the store. Missing keys and fields are `None` or empty,
/// never errors.
pub(crate) trait KvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    async fn hash_get_field(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Members of a set, sorted
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Keys matching a glob-style pattern (`*`, `?`, `[...]`)
    async fn scan_keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Run commands in one round trip; one reply per command, in order.
    async fn pipeline(&self, commands: &[StoreCommand]) -> StoreResult<Vec<Option<String>>>;
}

/// Either backend, chosen at runtime from the command line.
pub(crate) enum AnyStore {
    Redis(RedisStore),
    Memory(MemoryStore),
}

impl KvStore for AnyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self {
            AnyStore::Redis(s) => s.get(key).await,
            AnyStore::Memory(s) => s.get(key).await,
        }
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        match self {
            AnyStore::Redis(s) => s.hash_get_all(key).await,
            AnyStore::Memory(s) => s.hash_get_all(key).await,
        }
    }

    async fn hash_get_field(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        match self {
            AnyStore::Redis(s) => s.hash_get_field(key, field).await,
            AnyStore::Memory(s) => s.hash_get_field(key, field).await,
        }
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        match self {
            AnyStore::Redis(s) => s.set_members(key).await,
            AnyStore::Memory(s) => s.set_members(key).await,
        }
    }

    async fn scan_keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        match self {
            AnyStore::Redis(s) => s.scan_keys(pattern).await,
            AnyStore::Memory(s) => s.scan_keys(pattern).await,
        }
    }

    async fn pipeline(&self, commands: &[StoreCommand]) -> StoreResult<Vec<Option<String>>> {
        match self {
            AnyStore::Redis(s) => s.pipeline(commands).await,
            AnyStore::Memory(s) => s.pipeline(commands).await,
        }
    }
}
