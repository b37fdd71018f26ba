//! Service facade for Kingdom
//!
//! [`KingdomService`] wires the account store, distributor and scheduler to
//! shared storage, notifications and analytics so that every front end (the
//! apps, the `kingdom-send` daemon, tests) talks to the same components.
//!
//! # Example
//!
//! ```no_run
//! use libkingdom::service::KingdomService;
//! use libkingdom::{AccountCredentials, ContentPayload};
//!
//! # async fn example() -> libkingdom::Result<()> {
//! let service = KingdomService::new().await?;
//!
//! service
//!     .accounts()
//!     .add_account("instagram", AccountCredentials::new("ig_1", "@grace", "token"))
//!     .await?;
//!
//! let results = service
//!     .distributor()
//!     .distribute(&ContentPayload::text("Hello"), &["instagram".to_string()])
//!     .await?;
//! println!("Posted to {} platform(s)", results.iter().filter(|r| r.success).count());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::accounts::AccountStore;
use crate::analytics::{Analytics, TracingAnalytics};
use crate::distributor::Distributor;
use crate::notifications::{NotificationBus, NotificationReceiver};
use crate::platforms::{AdapterRegistry, PlatformRegistry};
use crate::scheduler::Scheduler;
use crate::store::{LocalStore, MemoryProfileStore, ProfileStore, SqliteStore};
use crate::types::ScheduleStatus;
use crate::{Config, Result};

const NOTIFICATION_CAPACITY: usize = 100;

/// Pluggable pieces of a [`KingdomService`]
///
/// [`KingdomService::from_config`] fills these with the SQLite store and
/// simulated adapters; tests and embedders supply their own.
pub struct Components {
    pub local: Arc<dyn LocalStore>,
    pub remote: Option<Arc<dyn ProfileStore>>,
    pub adapters: AdapterRegistry,
    pub analytics: Arc<dyn Analytics>,
    pub registry: PlatformRegistry,
}

pub struct KingdomService {
    config: Arc<Config>,
    registry: Arc<PlatformRegistry>,
    accounts: Arc<AccountStore>,
    distributor: Distributor,
    scheduler: Scheduler,
    notifications: NotificationBus,
}

impl KingdomService {
    /// Create a service from the configuration at the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the local store
    /// cannot be opened.
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Create a service backed by the SQLite store named in `config`
    pub async fn from_config(config: Config) -> Result<Self> {
        let store_path = config.store_path()?;
        let local = SqliteStore::new(&store_path.to_string_lossy()).await?;
        let registry = PlatformRegistry::builtin();

        let components = Components {
            local: Arc::new(local),
            remote: Some(Arc::new(MemoryProfileStore::new(&config.profile.user_id))),
            adapters: AdapterRegistry::simulated(&registry),
            analytics: Arc::new(TracingAnalytics),
            registry,
        };

        Self::with_components(config, components).await
    }

    /// Assemble a service from explicit components
    ///
    /// Accounts missing locally are restored from the remote profile, if
    /// one is configured.
    pub async fn with_components(config: Config, components: Components) -> Result<Self> {
        let notifications = NotificationBus::new(NOTIFICATION_CAPACITY);
        let notifier = Arc::new(notifications.clone());
        let registry = Arc::new(components.registry);

        let mut accounts = AccountStore::open(Arc::clone(&registry), Arc::clone(&components.local))
            .await?
            .with_notifier(notifier.clone())
            .with_analytics(Arc::clone(&components.analytics));
        if let Some(remote) = components.remote {
            accounts = accounts.with_remote(remote);
        }
        let accounts = Arc::new(accounts);

        match accounts.restore_from_remote().await {
            Ok(0) => {}
            Ok(restored) => info!("Restored {} account(s) from profile", restored),
            Err(e) => warn!("Could not restore accounts from profile: {}", e),
        }

        let distributor = Distributor::new(
            Arc::clone(&accounts),
            components.adapters,
            notifier.clone(),
            Arc::clone(&components.analytics),
        )
        .with_max_concurrency(config.distribution.max_concurrency);

        let scheduler = Scheduler::open(components.local)
            .await?
            .with_notifier(notifier)
            .with_analytics(components.analytics);

        Ok(Self {
            config: Arc::new(config),
            registry,
            accounts,
            distributor,
            scheduler,
            notifications,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn distributor(&self) -> &Distributor {
        &self.distributor
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Execute scheduled posts due at `now`
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<Vec<(String, ScheduleStatus)>> {
        self.scheduler.run_due(&self.distributor, now).await
    }

    /// Run the scheduler poll loop until `shutdown` is set
    pub async fn run_worker(&self, shutdown: Arc<AtomicBool>) {
        self.scheduler
            .run_worker(&self.distributor, self.config.poll_interval(), shutdown)
            .await
    }

    /// Receive every notification the service emits
    pub fn subscribe(&self) -> NotificationReceiver {
        self.notifications.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemoryAnalytics;
    use crate::store::MemoryStore;
    use crate::types::{AccountCredentials, ContentPayload};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_from_config_uses_sqlite_store() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.path = dir.path().join("store.db").to_string_lossy().to_string();

        let service = KingdomService::from_config(config.clone()).await.unwrap();
        service
            .accounts()
            .add_account("twitter", AccountCredentials::new("tw_1", "@grace", "token"))
            .await
            .unwrap();
        drop(service);

        assert!(dir.path().join("store.db").exists());
        let reopened = KingdomService::from_config(config).await.unwrap();
        assert_eq!(reopened.accounts().list_accounts("twitter").await.len(), 1);
    }

    #[tokio::test]
    async fn test_service_wires_notifications_and_analytics() {
        let analytics = Arc::new(MemoryAnalytics::new());
        let registry = PlatformRegistry::builtin();
        let service = KingdomService::with_components(
            Config::default(),
            Components {
                local: Arc::new(MemoryStore::new()),
                remote: None,
                adapters: AdapterRegistry::simulated(&registry),
                analytics: analytics.clone(),
                registry,
            },
        )
        .await
        .unwrap();

        let mut notifications = service.subscribe();

        service
            .accounts()
            .add_account("facebook", AccountCredentials::new("fb_1", "@grace.page", "token"))
            .await
            .unwrap();
        assert_eq!(notifications.recv().await.unwrap().title, "Facebook connected");

        let results = service
            .distributor()
            .distribute(&ContentPayload::text("Hello"), &["facebook".to_string()])
            .await
            .unwrap();
        assert!(results[0].success);
        assert!(results[0]
            .post_url
            .as_deref()
            .unwrap()
            .contains("facebook.com"));

        assert_eq!(notifications.recv().await.unwrap().body, "Posted to 1/1 platforms");
        assert_eq!(analytics.events_named("content_distributed").len(), 1);
    }

    #[tokio::test]
    async fn test_service_restores_accounts_from_profile() {
        let remote = Arc::new(MemoryProfileStore::new("user-1"));
        remote
            .save_connection(
                &AccountCredentials::new("li_1", "Grace", "token").into_account("linkedin"),
            )
            .await
            .unwrap();

        let registry = PlatformRegistry::builtin();
        let service = KingdomService::with_components(
            Config::default(),
            Components {
                local: Arc::new(MemoryStore::new()),
                remote: Some(remote),
                adapters: AdapterRegistry::new(),
                analytics: Arc::new(MemoryAnalytics::new()),
                registry,
            },
        )
        .await
        .unwrap();

        assert_eq!(service.accounts().list_accounts("linkedin").await.len(), 1);
    }
}
