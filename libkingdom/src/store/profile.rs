//! Remote per-user profile store
//!
//! The remote copy of connected accounts is an eventual backup. Callers
//! catch and log its failures; they never roll back local state.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::{Result, StorageError};
use crate::types::Account;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn save_connection(&self, account: &Account) -> Result<()>;

    async fn remove_connection(&self, platform_id: &str, account_id: &str) -> Result<()>;

    async fn get_connections(&self) -> Result<Vec<Account>>;
}

/// In-process [`ProfileStore`] for one user
///
/// Can be switched offline to exercise failure paths.
pub struct MemoryProfileStore {
    user_id: String,
    connections: RwLock<Vec<Account>>,
    available: AtomicBool,
}

impl MemoryProfileStore {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            connections: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Remote(format!(
                "profile store for user '{}' is offline",
                self.user_id
            ))
            .into())
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn save_connection(&self, account: &Account) -> Result<()> {
        self.check_available()?;
        let mut connections = self.connections.write().await;
        connections.retain(|a| {
            !(a.platform_id == account.platform_id && a.account_id == account.account_id)
        });
        connections.push(account.clone());
        Ok(())
    }

    async fn remove_connection(&self, platform_id: &str, account_id: &str) -> Result<()> {
        self.check_available()?;
        self.connections
            .write()
            .await
            .retain(|a| !(a.platform_id == platform_id && a.account_id == account_id));
        Ok(())
    }

    async fn get_connections(&self) -> Result<Vec<Account>> {
        self.check_available()?;
        Ok(self.connections.read().await.clone())
    }
}
