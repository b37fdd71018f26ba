//! Connected account management
//!
//! [`AccountStore`] owns the per-platform collection of connected accounts
//! and the active-account selection. Every mutation is applied under a
//! write lock and the full account map is written to the [`LocalStore`]
//! before the lock is released. The remote profile mirror is written
//! afterwards and its failures are only logged.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::analytics::{Analytics, TracingAnalytics};
use crate::error::{KingdomError, Result, StorageError, ValidationError};
use crate::notifications::{self, LogNotifier, Notification, Notifier};
use crate::platforms::{Platform, PlatformRegistry};
use crate::store::{LocalStore, ProfileStore};
use crate::types::{Account, AccountCredentials};

pub mod active;

pub use active::ActiveAccountSelection;

/// Local storage key holding the serialized account map
pub const ACCOUNTS_KEY: &str = "connected_accounts";

/// Accounts per platform id
pub type AccountMap = BTreeMap<String, Vec<Account>>;

/// Serialize an account map into the local persistence format (JSON)
pub fn to_local_format(accounts: &AccountMap) -> Result<String> {
    Ok(serde_json::to_string(accounts).map_err(StorageError::Serialization)?)
}

/// Parse the local persistence format
pub fn from_local_format(content: &str) -> Result<AccountMap> {
    serde_json::from_str(content).map_err(|e| {
        StorageError::Corrupted {
            key: ACCOUNTS_KEY.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Drop entries a loaded map should never contain
///
/// Platforms outside the registry are skipped and repeated account ids keep
/// their first occurrence, so `(platform_id, account_id)` stays unique.
fn sanitize(accounts: AccountMap, registry: &PlatformRegistry) -> AccountMap {
    let mut clean = AccountMap::new();
    for (platform_id, list) in accounts {
        if !registry.contains(&platform_id) {
            warn!(
                "Skipping {} stored account(s) for unsupported platform '{}'",
                list.len(),
                platform_id
            );
            continue;
        }

        let mut kept: Vec<Account> = Vec::with_capacity(list.len());
        for account in list {
            if kept.iter().any(|a| a.account_id == account.account_id) {
                warn!(
                    "Skipping duplicate stored account {} on {}",
                    account.account_id, platform_id
                );
                continue;
            }
            kept.push(account);
        }

        if !kept.is_empty() {
            clean.insert(platform_id, kept);
        }
    }
    clean
}

#[derive(Debug, Clone, Default)]
struct AccountState {
    accounts: AccountMap,
    active: ActiveAccountSelection,
}

impl AccountState {
    fn find(&self, platform_id: &str, account_id: &str) -> Option<&Account> {
        self.accounts
            .get(platform_id)
            .and_then(|list| list.iter().find(|a| a.account_id == account_id))
    }

    fn find_mut(&mut self, platform_id: &str, account_id: &str) -> Option<&mut Account> {
        self.accounts
            .get_mut(platform_id)
            .and_then(|list| list.iter_mut().find(|a| a.account_id == account_id))
    }
}

pub struct AccountStore {
    registry: Arc<PlatformRegistry>,
    local: Arc<dyn LocalStore>,
    remote: Option<Arc<dyn ProfileStore>>,
    notifier: Arc<dyn Notifier>,
    analytics: Arc<dyn Analytics>,
    state: RwLock<AccountState>,
}

impl AccountStore {
    /// Open the store, loading any accounts already persisted locally
    ///
    /// A corrupted local value is logged and treated as empty.
    pub async fn open(registry: Arc<PlatformRegistry>, local: Arc<dyn LocalStore>) -> Result<Self> {
        let accounts = match local.get(ACCOUNTS_KEY).await? {
            Some(content) => match from_local_format(&content) {
                Ok(accounts) => accounts,
                Err(e) => {
                    warn!("Corrupted account state, starting empty: {}", e);
                    AccountMap::new()
                }
            },
            None => AccountMap::new(),
        };
        let accounts = sanitize(accounts, &registry);

        debug!(
            "Loaded {} account(s) across {} platform(s)",
            accounts.values().map(Vec::len).sum::<usize>(),
            accounts.len()
        );

        Ok(Self {
            registry,
            local,
            remote: None,
            notifier: Arc::new(LogNotifier),
            analytics: Arc::new(TracingAnalytics),
            state: RwLock::new(AccountState {
                accounts,
                active: ActiveAccountSelection::new(),
            }),
        })
    }

    /// Mirror connections to a remote per-user profile store
    pub fn with_remote(mut self, remote: Arc<dyn ProfileStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn Analytics>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    /// Connect an account to a platform
    ///
    /// # Errors
    ///
    /// - `UnsupportedPlatform` if the platform is not in the catalog
    /// - `DuplicateAccount` if the account id is already connected there
    /// - `Validation` if the account id is blank
    /// - `Storage` if the local write fails (nothing is changed then)
    pub async fn add_account(
        &self,
        platform_id: &str,
        credentials: AccountCredentials,
    ) -> Result<Account> {
        let platform = *self.supported(platform_id)?;

        if credentials.account_id.trim().is_empty() {
            return Err(ValidationError::InvalidAccount(
                "Account id cannot be empty".to_string(),
            )
            .into());
        }

        let account = credentials.into_account(platform_id);

        {
            let mut state = self.state.write().await;

            if state.find(platform_id, &account.account_id).is_some() {
                return Err(KingdomError::DuplicateAccount {
                    platform: platform_id.to_string(),
                    account_id: account.account_id,
                });
            }

            let previous = state.clone();
            state
                .accounts
                .entry(platform_id.to_string())
                .or_default()
                .push(account.clone());

            if let Err(e) = self.persist(&state).await {
                *state = previous;
                return Err(e);
            }
        }

        info!(
            "Connected {} account '{}' ({})",
            platform_id, account.account_id, account.username
        );

        self.mirror_save(&account).await;

        notifications::fire(
            self.notifier.as_ref(),
            Notification::new(
                format!("{} connected", platform.name),
                format!("{} is ready for posting", account.username),
            )
            .with_data(json!({
                "platform": platform_id,
                "account_id": account.account_id,
            })),
        )
        .await;

        self.analytics.track_event(
            "account_connected",
            None,
            properties(&[
                ("platform", json!(platform_id)),
                ("account_id", json!(account.account_id)),
            ]),
        );

        Ok(account)
    }

    /// Disconnect an account
    ///
    /// Clears the active selection for the platform if it pointed at this
    /// account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account is not connected.
    pub async fn remove_account(&self, platform_id: &str, account_id: &str) -> Result<()> {
        let removed = {
            let mut state = self.state.write().await;

            if state.find(platform_id, account_id).is_none() {
                return Err(not_found(platform_id, account_id));
            }

            let previous = state.clone();
            let mut removed = None;
            if let Some(list) = state.accounts.get_mut(platform_id) {
                if let Some(index) = list.iter().position(|a| a.account_id == account_id) {
                    removed = Some(list.remove(index));
                }
                if list.is_empty() {
                    state.accounts.remove(platform_id);
                }
            }

            if state.active.invalidate(platform_id, account_id) {
                debug!("Cleared active {} account '{}'", platform_id, account_id);
            }

            if let Err(e) = self.persist(&state).await {
                *state = previous;
                return Err(e);
            }

            removed
        };

        info!("Disconnected {} account '{}'", platform_id, account_id);

        self.mirror_remove(platform_id, account_id).await;

        let platform_name = self
            .registry
            .get(platform_id)
            .map(|p| p.name)
            .unwrap_or(platform_id);
        let username = removed
            .map(|a| a.username)
            .unwrap_or_else(|| account_id.to_string());

        notifications::fire(
            self.notifier.as_ref(),
            Notification::new(
                format!("{} disconnected", platform_name),
                format!("{} has been removed", username),
            )
            .with_data(json!({
                "platform": platform_id,
                "account_id": account_id,
            })),
        )
        .await;

        self.analytics.track_event(
            "account_disconnected",
            None,
            properties(&[
                ("platform", json!(platform_id)),
                ("account_id", json!(account_id)),
            ]),
        );

        Ok(())
    }

    /// Replace the tokens of a connected account after a refresh
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account is not connected.
    pub async fn update_tokens(
        &self,
        platform_id: &str,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<String>,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Account> {
        let updated = {
            let mut state = self.state.write().await;
            let previous = state.clone();

            let account = state
                .find_mut(platform_id, account_id)
                .ok_or_else(|| not_found(platform_id, account_id))?;
            account.access_token = access_token.to_string();
            if refresh_token.is_some() {
                account.refresh_token = refresh_token;
            }
            account.expires_at = expires_at;
            let updated = account.clone();

            if let Err(e) = self.persist(&state).await {
                *state = previous;
                return Err(e);
            }
            updated
        };

        debug!("Refreshed tokens for {} account '{}'", platform_id, account_id);
        self.mirror_save(&updated).await;

        Ok(updated)
    }

    /// Accounts connected to a platform, in connection order
    pub async fn list_accounts(&self, platform_id: &str) -> Vec<Account> {
        let state = self.state.read().await;
        state.accounts.get(platform_id).cloned().unwrap_or_default()
    }

    /// Look up one account
    pub async fn get_account(&self, platform_id: &str, account_id: &str) -> Option<Account> {
        let state = self.state.read().await;
        state.find(platform_id, account_id).cloned()
    }

    /// Platforms with at least one connected account, in catalog order
    pub async fn list_connected_platforms(&self) -> Vec<Platform> {
        let state = self.state.read().await;
        self.registry
            .list_supported()
            .iter()
            .filter(|p| state.accounts.get(p.id).is_some_and(|list| !list.is_empty()))
            .copied()
            .collect()
    }

    /// Make an account the default for one-click posting
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account is not connected.
    pub async fn set_active(&self, platform_id: &str, account_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.find(platform_id, account_id).is_none() {
            return Err(not_found(platform_id, account_id));
        }
        state.active.set(platform_id, account_id);
        debug!("Active {} account is now '{}'", platform_id, account_id);
        Ok(())
    }

    /// The active account for a platform, if one is selected
    pub async fn get_active(&self, platform_id: &str) -> Option<Account> {
        let state = self.state.read().await;
        let account_id = state.active.get(platform_id)?;
        state.find(platform_id, account_id).cloned()
    }

    pub async fn clear_active(&self, platform_id: &str) {
        self.state.write().await.active.clear(platform_id);
    }

    /// The account used when posting to a platform
    ///
    /// The active account if one is selected, otherwise the first connected.
    pub async fn posting_account(&self, platform_id: &str) -> Option<Account> {
        let state = self.state.read().await;
        if let Some(account) = state
            .active
            .get(platform_id)
            .and_then(|id| state.find(platform_id, id))
        {
            return Some(account.clone());
        }
        state
            .accounts
            .get(platform_id)
            .and_then(|list| list.first())
            .cloned()
    }

    /// Snapshot of the full account map
    pub async fn export_map(&self) -> AccountMap {
        self.state.read().await.accounts.clone()
    }

    /// Pull connections from the remote profile that are missing locally
    ///
    /// Returns how many accounts were restored. Remote failures are logged
    /// and yield 0.
    pub async fn restore_from_remote(&self) -> Result<usize> {
        let Some(remote) = &self.remote else {
            return Ok(0);
        };

        let connections = match remote.get_connections().await {
            Ok(connections) => connections,
            Err(e) => {
                warn!("Could not fetch remote connections: {}", e);
                return Ok(0);
            }
        };

        let mut state = self.state.write().await;
        let previous = state.clone();
        let mut restored = 0;

        for account in connections {
            if !self.registry.contains(&account.platform_id) {
                debug!(
                    "Skipping remote account on unsupported platform {}",
                    account.platform_id
                );
                continue;
            }
            if state.find(&account.platform_id, &account.account_id).is_some() {
                continue;
            }
            state
                .accounts
                .entry(account.platform_id.clone())
                .or_default()
                .push(account);
            restored += 1;
        }

        if restored > 0 {
            if let Err(e) = self.persist(&state).await {
                *state = previous;
                return Err(e);
            }
            info!("Restored {} account(s) from remote profile", restored);
        }

        Ok(restored)
    }

    fn supported(&self, platform_id: &str) -> Result<&Platform> {
        self.registry
            .get(platform_id)
            .ok_or_else(|| KingdomError::UnsupportedPlatform(platform_id.to_string()))
    }

    async fn persist(&self, state: &AccountState) -> Result<()> {
        let content = to_local_format(&state.accounts)?;
        self.local.set(ACCOUNTS_KEY, &content).await
    }

    async fn mirror_save(&self, account: &Account) {
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.save_connection(account).await {
                warn!(
                    "Remote mirror failed for {} account '{}': {}",
                    account.platform_id, account.account_id, e
                );
            }
        }
    }

    async fn mirror_remove(&self, platform_id: &str, account_id: &str) {
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.remove_connection(platform_id, account_id).await {
                warn!(
                    "Remote removal failed for {} account '{}': {}",
                    platform_id, account_id, e
                );
            }
        }
    }
}

fn not_found(platform_id: &str, account_id: &str) -> KingdomError {
    KingdomError::NotFound(format!(
        "account '{}' on platform '{}'",
        account_id, platform_id
    ))
}

fn properties(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
