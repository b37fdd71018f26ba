//! Platform catalog and adapter abstraction
//!
//! A [`Platform`] describes a distribution channel. A [`PlatformAdapter`]
//! performs the actual post call for one platform; the
//! [`Distributor`](crate::distributor::Distributor) looks adapters up by
//! platform id.
//!
//! # Examples
//!
//! ```no_run
//! use libkingdom::platforms::{PlatformAdapter, simulated::SimulatedAdapter};
//! use libkingdom::types::ContentPayload;
//!
//! # async fn example(account: libkingdom::Account) -> Result<(), libkingdom::error::PlatformError> {
//! let adapter = SimulatedAdapter::new("instagram");
//! let content = ContentPayload::text("Hello, Kingdom!");
//!
//! adapter.validate_content(&content)?;
//! let published = adapter.post(&content, &account).await?;
//! println!("Posted: {}", published.post_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PlatformError;
use crate::types::{Account, ContentPayload};

pub mod mock;
pub mod registry;
pub mod simulated;

pub use registry::{Platform, PlatformRegistry};

/// Identifiers returned by a successful post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub post_id: String,
    pub post_url: Option<String>,
}

/// Platform-specific posting strategy
///
/// One implementation per platform, tagged by [`platform_id`](Self::platform_id).
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Lowercase platform id this adapter serves (e.g., "instagram")
    fn platform_id(&self) -> &str;

    /// Check content against platform requirements before posting
    ///
    /// The default accepts everything.
    fn validate_content(&self, _content: &ContentPayload) -> Result<(), PlatformError> {
        Ok(())
    }

    /// Publish the content using the given account
    ///
    /// # Errors
    ///
    /// Any error is reported to the caller of the distribution as an
    /// adapter failure for this platform only.
    async fn post(
        &self,
        content: &ContentPayload,
        account: &Account,
    ) -> Result<PublishedPost, PlatformError>;
}

/// Adapters keyed by platform id
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A simulated adapter for every platform in the catalog
    pub fn simulated(registry: &PlatformRegistry) -> Self {
        let mut adapters = Self::new();
        for platform in registry.list_supported() {
            adapters.register(Arc::new(simulated::SimulatedAdapter::new(platform.id)));
        }
        adapters
    }

    /// Register an adapter, replacing any previous one for the same platform
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters
            .insert(adapter.platform_id().to_string(), adapter);
    }

    pub fn get(&self, platform_id: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(platform_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockAdapter;

    #[test]
    fn test_simulated_registry_covers_catalog() {
        let registry = PlatformRegistry::builtin();
        let adapters = AdapterRegistry::simulated(&registry);

        assert_eq!(adapters.len(), registry.list_supported().len());
        for platform in registry.list_supported() {
            let adapter = adapters.get(platform.id).unwrap();
            assert_eq!(adapter.platform_id(), platform.id);
        }
    }

    #[test]
    fn test_register_replaces_existing_adapter() {
        let mut adapters = AdapterRegistry::simulated(&PlatformRegistry::builtin());
        let before = adapters.len();

        let mock = Arc::new(MockAdapter::success("instagram"));
        adapters.register(mock.clone());

        assert_eq!(adapters.len(), before);
        let resolved = adapters.get("instagram").unwrap();
        assert!(Arc::ptr_eq(
            &resolved,
            &(mock as Arc<dyn PlatformAdapter>)
        ));
    }

    #[test]
    fn test_missing_adapter() {
        let adapters = AdapterRegistry::new();
        assert!(adapters.is_empty());
        assert!(adapters.get("instagram").is_none());
    }
}
