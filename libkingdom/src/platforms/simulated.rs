//! Simulated platform adapters
//!
//! Stand-ins for real platform SDK integrations. They enforce each
//! platform's published text limits and return synthetic post ids and
//! URLs shaped like the real ones, without any network access.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::PlatformError;
use crate::platforms::{PlatformAdapter, PublishedPost};
use crate::types::{Account, ContentPayload};

/// Text limit for a platform, if it publishes one
pub fn character_limit(platform_id: &str) -> Option<usize> {
    match platform_id {
        "twitter" => Some(280),
        "pinterest" => Some(500),
        "instagram" | "tiktok" => Some(2200),
        "linkedin" => Some(3000),
        "youtube" => Some(5000),
        "facebook" => Some(63206),
        _ => None,
    }
}

fn requires_video(platform_id: &str) -> bool {
    matches!(platform_id, "youtube" | "tiktok")
}

/// Adapter that pretends to publish
pub struct SimulatedAdapter {
    platform_id: String,
}

impl SimulatedAdapter {
    pub fn new(platform_id: &str) -> Self {
        Self {
            platform_id: platform_id.to_string(),
        }
    }

    fn post_url(&self, post_id: &str, username: &str) -> Option<String> {
        let handle = username.trim_start_matches('@');
        let url = match self.platform_id.as_str() {
            "instagram" => format!("https://www.instagram.com/p/{}", post_id),
            "facebook" => format!("https://www.facebook.com/{}", post_id),
            "twitter" => format!("https://x.com/{}/status/{}", handle, post_id),
            "linkedin" => format!("https://www.linkedin.com/feed/update/{}", post_id),
            "tiktok" => format!("https://www.tiktok.com/@{}/video/{}", handle, post_id),
            "youtube" => format!("https://www.youtube.com/watch?v={}", post_id),
            "pinterest" => format!("https://www.pinterest.com/pin/{}", post_id),
            _ => return None,
        };
        Some(url)
    }
}

#[async_trait]
impl PlatformAdapter for SimulatedAdapter {
    fn platform_id(&self) -> &str {
        &self.platform_id
    }

    fn validate_content(&self, content: &ContentPayload) -> Result<(), PlatformError> {
        let rendered = content.render();
        if let Some(limit) = character_limit(&self.platform_id) {
            let length = rendered.chars().count();
            if length > limit {
                return Err(PlatformError::Validation(format!(
                    "Content exceeds {}'s {} character limit (current: {} characters)",
                    self.platform_id, limit, length
                )));
            }
        }

        if requires_video(&self.platform_id) && content.video.is_none() {
            return Err(PlatformError::Validation(format!(
                "{} posts require a video",
                self.platform_id
            )));
        }

        Ok(())
    }

    async fn post(
        &self,
        content: &ContentPayload,
        account: &Account,
    ) -> Result<PublishedPost, PlatformError> {
        if account.access_token.is_empty() {
            return Err(PlatformError::Authentication(format!(
                "No access token for {} account '{}'",
                self.platform_id, account.account_id
            )));
        }

        let post_id = Uuid::new_v4().simple().to_string();
        debug!(
            platform = %self.platform_id,
            account = %account.account_id,
            images = content.images.len(),
            "Simulated post {}",
            post_id
        );

        Ok(PublishedPost {
            post_url: self.post_url(&post_id, &account.username),
            post_id,
        })
    }
}
