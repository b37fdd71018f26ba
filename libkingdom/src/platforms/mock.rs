//! Mock platform adapter for testing
//!
//! A configurable adapter that can simulate successes, failures, and delays.
//! It is available for all builds (not just tests) so integration tests can
//! verify distribution logic without network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::{PlatformAdapter, PublishedPost};
use crate::types::{Account, ContentPayload};

/// Configuration for mock adapter behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform id served by this adapter
    pub platform_id: String,

    /// Whether posting should succeed
    pub post_succeeds: bool,

    /// Error to return on posting failure
    pub post_error: Option<PlatformError>,

    /// Delay before completing a post (simulates network latency)
    pub delay: Duration,

    /// Character limit for validation
    pub character_limit: Option<usize>,

    /// Number of times post has been called
    pub post_call_count: Arc<Mutex<usize>>,

    /// (account_id, text) for every successful post
    pub posted: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            platform_id: "mock".to_string(),
            post_succeeds: true,
            post_error: None,
            delay: Duration::from_millis(0),
            character_limit: None,
            post_call_count: Arc::new(Mutex::new(0)),
            posted: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock adapter for testing
pub struct MockAdapter {
    config: MockConfig,
}

impl MockAdapter {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// An adapter that always succeeds
    pub fn success(platform_id: &str) -> Self {
        Self::new(MockConfig {
            platform_id: platform_id.to_string(),
            ..Default::default()
        })
    }

    /// An adapter whose posts fail with a posting error
    pub fn post_failure(platform_id: &str, error: &str) -> Self {
        Self::failing_with(platform_id, PlatformError::Posting(error.to_string()))
    }

    /// An adapter whose posts fail with the given error
    pub fn failing_with(platform_id: &str, error: PlatformError) -> Self {
        Self::new(MockConfig {
            platform_id: platform_id.to_string(),
            post_succeeds: false,
            post_error: Some(error),
            ..Default::default()
        })
    }

    pub fn with_delay(platform_id: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            platform_id: platform_id.to_string(),
            delay,
            ..Default::default()
        })
    }

    pub fn with_limit(platform_id: &str, limit: usize) -> Self {
        Self::new(MockConfig {
            platform_id: platform_id.to_string(),
            character_limit: Some(limit),
            ..Default::default()
        })
    }

    pub fn post_call_count(&self) -> usize {
        *self.config.post_call_count.lock().unwrap()
    }

    /// (account_id, text) pairs that were posted
    pub fn posted(&self) -> Vec<(String, String)> {
        self.config.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform_id(&self) -> &str {
        &self.config.platform_id
    }

    fn validate_content(&self, content: &ContentPayload) -> Result<(), PlatformError> {
        if let Some(limit) = self.config.character_limit {
            if content.text.len() > limit {
                return Err(PlatformError::Validation(format!(
                    "Content exceeds {} character limit (got {} characters)",
                    limit,
                    content.text.len()
                )));
            }
        }
        Ok(())
    }

    async fn post(
        &self,
        content: &ContentPayload,
        account: &Account,
    ) -> Result<PublishedPost, PlatformError> {
        *self.config.post_call_count.lock().unwrap() += 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.config.post_succeeds {
            self.config
                .posted
                .lock()
                .unwrap()
                .push((account.account_id.clone(), content.text.clone()));

            let post_id = format!("{}:mock-{}", self.config.platform_id, uuid::Uuid::new_v4());
            Ok(PublishedPost {
                post_url: Some(format!("https://mock.example/{}", post_id)),
                post_id,
            })
        } else {
            Err(self
                .config
                .post_error
                .clone()
                .unwrap_or_else(|| PlatformError::Posting("Mock posting failed".to_string())))
        }
    }
}
