//! Multi-platform content distribution
//!
//! Fans one [`ContentPayload`] out to a set of platforms. A failing target
//! never aborts the others: every target yields exactly one [`PostResult`],
//! and the caller inspects the list for partial failure.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::accounts::AccountStore;
use crate::analytics::Analytics;
use crate::error::{Result, TargetError, ValidationError};
use crate::notifications::{self, Notification, Notifier};
use crate::platforms::AdapterRegistry;
use crate::types::{ContentPayload, PostResult};

/// Default cap on concurrent adapter calls
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

pub struct Distributor {
    accounts: Arc<AccountStore>,
    adapters: AdapterRegistry,
    notifier: Arc<dyn Notifier>,
    analytics: Arc<dyn Analytics>,
    max_concurrency: usize,
}

impl Distributor {
    pub fn new(
        accounts: Arc<AccountStore>,
        adapters: AdapterRegistry,
        notifier: Arc<dyn Notifier>,
        analytics: Arc<dyn Analytics>,
    ) -> Self {
        Self {
            accounts,
            adapters,
            notifier,
            analytics,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Limit how many adapters run at once (minimum 1)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Publish `content` to every target platform
    ///
    /// Returns one result per distinct target, in target order. Duplicate
    /// target ids are posted once.
    ///
    /// # Errors
    ///
    /// Fails only when `targets` is empty or the content text is blank,
    /// before any adapter is called. Per-platform failures are reported in
    /// the results.
    pub async fn distribute(
        &self,
        content: &ContentPayload,
        targets: &[String],
    ) -> Result<Vec<PostResult>> {
        if targets.is_empty() {
            return Err(ValidationError::NoTargets.into());
        }
        content.validate()?;

        let mut unique: Vec<String> = Vec::with_capacity(targets.len());
        for target in targets {
            if !unique.contains(target) {
                unique.push(target.clone());
            }
        }

        info!("Distributing to {} platform(s): {}", unique.len(), unique.join(", "));

        // Owned ids keep the returned future Send
        let results: Vec<PostResult> = stream::iter(unique)
            .map(|platform_id| async move { self.post_to(content, &platform_id).await })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        self.report(&results).await;

        Ok(results)
    }

    async fn post_to(&self, content: &ContentPayload, platform_id: &str) -> PostResult {
        match self.try_post_to(content, platform_id).await {
            Ok(result) => {
                info!(
                    "Posted to {}: {}",
                    platform_id,
                    result.post_id.as_deref().unwrap_or_default()
                );
                result
            }
            Err(error) => {
                warn!("Failed to post to {}: {}", platform_id, error);
                PostResult::failed(platform_id, error)
            }
        }
    }

    async fn try_post_to(
        &self,
        content: &ContentPayload,
        platform_id: &str,
    ) -> std::result::Result<PostResult, TargetError> {
        if !self.accounts.registry().contains(platform_id) {
            return Err(TargetError::UnsupportedPlatform);
        }

        let account = self
            .accounts
            .posting_account(platform_id)
            .await
            .ok_or(TargetError::NoAccountConnected)?;

        if account.is_expired(Utc::now()) {
            return Err(TargetError::TokenExpired);
        }

        let adapter = self.adapters.get(platform_id).ok_or_else(|| {
            TargetError::Adapter(format!("No adapter registered for {}", platform_id))
        })?;

        adapter.validate_content(content)?;

        debug!("Posting to {} as '{}'", platform_id, account.account_id);
        let published = adapter.post(content, &account).await?;

        Ok(PostResult::succeeded(
            platform_id,
            published.post_id,
            published.post_url,
        ))
    }

    async fn report(&self, results: &[PostResult]) {
        let total = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();

        let title = if succeeded == total {
            "Post published"
        } else if succeeded == 0 {
            "Post failed"
        } else {
            "Post partially published"
        };

        notifications::fire(
            self.notifier.as_ref(),
            Notification::new(
                title,
                format!("Posted to {}/{} platforms", succeeded, total),
            )
            .with_data(json!({
                "success_count": succeeded,
                "total_count": total,
                "results": results,
            })),
        )
        .await;

        let mut properties = Map::new();
        properties.insert(
            "platforms".to_string(),
            Value::from(
                results
                    .iter()
                    .map(|r| r.platform.clone())
                    .collect::<Vec<_>>(),
            ),
        );
        properties.insert("results".to_string(), json!(results));
        properties.insert("success_count".to_string(), json!(succeeded));
        properties.insert("total_count".to_string(), json!(total));

        self.analytics
            .track_event("content_distributed", Some(succeeded as f64), properties);
    }
}
