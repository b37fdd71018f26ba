//! Persistence backends
//!
//! [`LocalStore`] is the on-device key/value store and the source of truth
//! for the UI. [`ProfileStore`](profile::ProfileStore) is the remote per-user
//! mirror; it is written best-effort only.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;

pub mod profile;
pub mod sqlite;

pub use profile::{MemoryProfileStore, ProfileStore};
pub use sqlite::SqliteStore;

/// Key/value storage on the local device
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory [`LocalStore`], lost on drop
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
