//! Core types for Kingdom

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TargetError, ValidationError};

/// A credential binding for one platform
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub platform_id: String,
    pub account_id: String,
    pub username: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub connected_at: DateTime<Utc>,
}

impl Account {
    /// Whether the access token has expired at `now`
    ///
    /// Accounts without an expiry never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("platform_id", &self.platform_id)
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Credentials supplied when connecting an account
#[derive(Clone)]
pub struct AccountCredentials {
    pub account_id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccountCredentials {
    pub fn new(account_id: &str, username: &str, access_token: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            username: username.to_string(),
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_refresh_token(mut self, refresh_token: &str) -> Self {
        self.refresh_token = Some(refresh_token.to_string());
        self
    }

    pub(crate) fn into_account(self, platform_id: &str) -> Account {
        Account {
            platform_id: platform_id.to_string(),
            account_id: self.account_id,
            username: self.username,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            connected_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// The unit of distribution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
}

impl ContentPayload {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    /// Reject whitespace-only text
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        Ok(())
    }

    /// Text with hashtags and mentions appended, as most platforms expect it
    pub fn render(&self) -> String {
        let mut rendered = self.text.clone();
        let tags: Vec<String> = self
            .mentions
            .iter()
            .map(|m| prefixed(m, '@'))
            .chain(self.hashtags.iter().map(|h| prefixed(h, '#')))
            .collect();
        if !tags.is_empty() {
            rendered.push_str("\n\n");
            rendered.push_str(&tags.join(" "));
        }
        rendered
    }
}

fn prefixed(value: &str, prefix: char) -> String {
    if value.starts_with(prefix) {
        value.to_string()
    } else {
        format!("{}{}", prefix, value)
    }
}

/// Outcome of distributing to one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResult {
    /// Platform id (e.g., "instagram")
    pub platform: String,
    pub success: bool,
    /// Platform-specific post ID (if successful)
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    /// Why this target failed (if failed)
    pub error: Option<TargetError>,
}

impl PostResult {
    pub fn succeeded(platform: &str, post_id: String, post_url: Option<String>) -> Self {
        Self {
            platform: platform.to_string(),
            success: true,
            post_id: Some(post_id),
            post_url,
            error: None,
        }
    }

    pub fn failed(platform: &str, error: TargetError) -> Self {
        Self {
            platform: platform.to_string(),
            success: false,
            post_id: None,
            post_url: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Posting,
    Completed,
    Failed,
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Posting => write!(f, "posting"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A deferred distribution request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub content: ContentPayload,
    pub platforms: Vec<String>,
    pub scheduled_time: DateTime<Utc>,
    pub status: ScheduleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<PostResult>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledPost {
    pub fn new(
        content: ContentPayload,
        platforms: Vec<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            platforms,
            scheduled_time,
            status: ScheduleStatus::Pending,
            results: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Pending && self.scheduled_time <= now
    }
}
