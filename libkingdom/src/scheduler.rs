//! Deferred distribution
//!
//! [`Scheduler`] keeps the list of scheduled posts in the local store under
//! a single key. Due posts are executed by [`Scheduler::run_due`], either on
//! demand or from the polling loop in [`Scheduler::run_worker`] that the
//! `kingdom-send` daemon drives.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::analytics::{Analytics, TracingAnalytics};
use crate::distributor::Distributor;
use crate::error::{KingdomError, Result, StorageError, TargetError, ValidationError};
use crate::notifications::{self, LogNotifier, Notification, Notifier};
use crate::scheduling::parse_schedule;
use crate::store::LocalStore;
use crate::types::{ContentPayload, PostResult, ScheduleStatus, ScheduledPost};

/// Local storage key holding the serialized schedule
pub const SCHEDULED_POSTS_KEY: &str = "scheduled_posts";

/// Number of scheduled posts in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleStats {
    pub pending: usize,
    pub posting: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ScheduleStats {
    pub fn total(&self) -> usize {
        self.pending + self.posting + self.completed + self.failed
    }
}

pub struct Scheduler {
    local: Arc<dyn LocalStore>,
    notifier: Arc<dyn Notifier>,
    analytics: Arc<dyn Analytics>,
    posts: Mutex<Vec<ScheduledPost>>,
}

impl Scheduler {
    /// Open the scheduler, loading previously persisted posts
    ///
    /// A corrupted schedule is logged and treated as empty. Posts left in
    /// `posting` by an interrupted run are kept as they are.
    pub async fn open(local: Arc<dyn LocalStore>) -> Result<Self> {
        let posts = match local.get(SCHEDULED_POSTS_KEY).await? {
            Some(content) => match serde_json::from_str::<Vec<ScheduledPost>>(&content) {
                Ok(posts) => posts,
                Err(e) => {
                    warn!("Corrupted schedule, starting empty: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let interrupted = posts
            .iter()
            .filter(|p| p.status == ScheduleStatus::Posting)
            .count();
        if interrupted > 0 {
            warn!(
                "{} scheduled post(s) were interrupted while posting and will not be retried",
                interrupted
            );
        }

        debug!("Loaded {} scheduled post(s)", posts.len());

        Ok(Self {
            local,
            notifier: Arc::new(LogNotifier),
            analytics: Arc::new(TracingAnalytics),
            posts: Mutex::new(posts),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn Analytics>) -> Self {
        self.analytics = analytics;
        self
    }

    /// Schedule `content` for distribution to `targets` at `scheduled_time`
    ///
    /// Returns the id of the new scheduled post.
    ///
    /// # Errors
    ///
    /// - `Validation(EmptyContent | NoTargets)` for empty input
    /// - `Validation(InvalidTime)` unless `scheduled_time` is in the future
    /// - `Storage` if the schedule cannot be written (nothing is kept then)
    pub async fn schedule(
        &self,
        content: ContentPayload,
        targets: Vec<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Result<String> {
        content.validate()?;
        if targets.is_empty() {
            return Err(ValidationError::NoTargets.into());
        }

        let now = Utc::now();
        if scheduled_time <= now {
            return Err(ValidationError::InvalidTime(scheduled_time.to_rfc3339()).into());
        }

        let post = ScheduledPost::new(content, targets, scheduled_time);
        let id = post.id.clone();

        {
            let mut posts = self.posts.lock().await;
            posts.push(post.clone());
            if let Err(e) = self.persist(&posts).await {
                posts.pop();
                return Err(e);
            }
        }

        info!(
            "Scheduled post {} for {} on {}",
            id,
            scheduled_time.to_rfc3339(),
            post.platforms.join(", ")
        );

        notifications::fire(
            self.notifier.as_ref(),
            Notification::new(
                "Post scheduled",
                format!(
                    "Your post will be published {} on {} platform(s)",
                    scheduled_time.format("%Y-%m-%d %H:%M UTC"),
                    post.platforms.len()
                ),
            )
            .with_data(json!({
                "scheduled_post_id": id,
                "scheduled_time": scheduled_time,
                "platforms": post.platforms,
            })),
        )
        .await;

        let mut properties = Map::new();
        properties.insert("platforms".to_string(), json!(post.platforms));
        properties.insert("scheduled_time".to_string(), json!(scheduled_time));
        self.analytics.track_event("post_scheduled", None, properties);

        Ok(id)
    }

    /// Schedule using a human-readable expression ("2h", "tomorrow",
    /// "random:10m-1h")
    ///
    /// Random windows are counted from the latest pending post, so repeated
    /// calls spread posts out instead of clustering them.
    pub async fn schedule_from_str(
        &self,
        content: ContentPayload,
        targets: Vec<String>,
        expression: &str,
    ) -> Result<String> {
        let now = Utc::now();
        let latest_pending = self
            .posts
            .lock()
            .await
            .iter()
            .filter(|p| p.status == ScheduleStatus::Pending)
            .map(|p| p.scheduled_time)
            .max()
            .filter(|t| *t > now);

        let scheduled_time = parse_schedule(expression, now, latest_pending)?;
        self.schedule(content, targets, scheduled_time).await
    }

    /// All scheduled posts, ascending by scheduled time
    pub async fn list_scheduled(&self) -> Vec<ScheduledPost> {
        let mut posts = self.posts.lock().await.clone();
        posts.sort_by_key(|p| p.scheduled_time);
        posts
    }

    pub async fn get(&self, id: &str) -> Option<ScheduledPost> {
        self.posts.lock().await.iter().find(|p| p.id == id).cloned()
    }

    /// Pending posts whose time has come, ascending by scheduled time
    pub async fn due(&self, now: DateTime<Utc>) -> Vec<ScheduledPost> {
        let mut due: Vec<ScheduledPost> = self
            .posts
            .lock()
            .await
            .iter()
            .filter(|p| p.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.scheduled_time);
        due
    }

    pub async fn stats(&self) -> ScheduleStats {
        let posts = self.posts.lock().await;
        let mut stats = ScheduleStats::default();
        for post in posts.iter() {
            match post.status {
                ScheduleStatus::Pending => stats.pending += 1,
                ScheduleStatus::Posting => stats.posting += 1,
                ScheduleStatus::Completed => stats.completed += 1,
                ScheduleStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Remove a pending post
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no pending post has this id. Posts that are
    /// posting or finished cannot be cancelled.
    pub async fn cancel(&self, id: &str) -> Result<()> {
        {
            let mut posts = self.posts.lock().await;
            let index = posts
                .iter()
                .position(|p| p.id == id && p.status == ScheduleStatus::Pending)
                .ok_or_else(|| pending_not_found(id))?;

            let removed = posts.remove(index);
            if let Err(e) = self.persist(&posts).await {
                posts.insert(index, removed);
                return Err(e);
            }
        }

        info!("Cancelled scheduled post {}", id);

        notifications::fire(
            self.notifier.as_ref(),
            Notification::new("Post cancelled", "Your scheduled post has been cancelled")
                .with_data(json!({ "scheduled_post_id": id })),
        )
        .await;

        Ok(())
    }

    /// Move a pending post to a new time
    ///
    /// # Errors
    ///
    /// `NotFound` unless the post exists and is pending; `InvalidTime` unless
    /// the new time is in the future.
    pub async fn reschedule(&self, id: &str, scheduled_time: DateTime<Utc>) -> Result<ScheduledPost> {
        if scheduled_time <= Utc::now() {
            return Err(ValidationError::InvalidTime(scheduled_time.to_rfc3339()).into());
        }

        let mut posts = self.posts.lock().await;
        let post = posts
            .iter_mut()
            .find(|p| p.id == id && p.status == ScheduleStatus::Pending)
            .ok_or_else(|| pending_not_found(id))?;

        let previous_time = post.scheduled_time;
        post.scheduled_time = scheduled_time;
        let updated = post.clone();

        if let Err(e) = self.persist(&posts).await {
            if let Some(post) = posts.iter_mut().find(|p| p.id == id) {
                post.scheduled_time = previous_time;
            }
            return Err(e);
        }

        info!(
            "Rescheduled post {} from {} to {}",
            id,
            previous_time.to_rfc3339(),
            scheduled_time.to_rfc3339()
        );
        Ok(updated)
    }

    /// Distribute every post due at `now`
    ///
    /// Each post is marked `posting` (and persisted) before distribution
    /// starts, then `completed` when at least one target succeeded or
    /// `failed` otherwise. Returns the final status of every executed post.
    ///
    /// # Errors
    ///
    /// Only storage failures are returned; distribution failures are
    /// recorded on the post.
    pub async fn run_due(
        &self,
        distributor: &Distributor,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, ScheduleStatus)>> {
        let due = self.due(now).await;
        if due.is_empty() {
            debug!("No scheduled posts due");
            return Ok(Vec::new());
        }

        info!("Processing {} due scheduled post(s)", due.len());

        let mut outcomes = Vec::with_capacity(due.len());
        for post in due {
            if !self.mark_posting(&post.id).await? {
                // Cancelled or rescheduled since it was selected
                continue;
            }

            let (status, results) = match distributor.distribute(&post.content, &post.platforms).await {
                Ok(results) => {
                    let status = if results.iter().any(|r| r.success) {
                        ScheduleStatus::Completed
                    } else {
                        ScheduleStatus::Failed
                    };
                    (status, Some(results))
                }
                Err(e) => {
                    error!("Scheduled post {} could not be distributed: {}", post.id, e);
                    (ScheduleStatus::Failed, Some(rejected_results(&post.platforms, &e)))
                }
            };

            let succeeded = results
                .as_ref()
                .map(|r| r.iter().filter(|r| r.success).count())
                .unwrap_or(0);

            self.finish(&post.id, status, results).await?;

            info!("Scheduled post {} {}", post.id, status);

            let (title, body) = match status {
                ScheduleStatus::Completed => (
                    "Scheduled post published",
                    format!(
                        "Posted to {}/{} platforms",
                        succeeded,
                        post.platforms.len()
                    ),
                ),
                _ => (
                    "Scheduled post failed",
                    "Your scheduled post could not be published".to_string(),
                ),
            };
            notifications::fire(
                self.notifier.as_ref(),
                Notification::new(title, body).with_data(json!({
                    "scheduled_post_id": post.id,
                    "status": status,
                })),
            )
            .await;

            outcomes.push((post.id, status));
        }

        Ok(outcomes)
    }

    /// Poll for due posts until `shutdown` is set
    ///
    /// Storage errors are logged and the loop keeps going. The shutdown flag
    /// is checked at least once per second.
    pub async fn run_worker(
        &self,
        distributor: &Distributor,
        poll_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) {
        info!("Scheduler worker started (poll interval {:?})", poll_interval);

        while !shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.run_due(distributor, Utc::now()).await {
                error!("Error processing scheduled posts: {}", e);
            }

            let mut waited = Duration::ZERO;
            while waited < poll_interval && !shutdown.load(Ordering::SeqCst) {
                let tick = (poll_interval - waited).min(Duration::from_secs(1));
                tokio::time::sleep(tick).await;
                waited += tick;
            }
        }

        info!("Scheduler worker stopped");
    }

    async fn mark_posting(&self, id: &str) -> Result<bool> {
        let mut posts = self.posts.lock().await;
        let Some(post) = posts
            .iter_mut()
            .find(|p| p.id == id && p.status == ScheduleStatus::Pending)
        else {
            return Ok(false);
        };

        post.status = ScheduleStatus::Posting;
        if let Err(e) = self.persist(&posts).await {
            if let Some(post) = posts.iter_mut().find(|p| p.id == id) {
                post.status = ScheduleStatus::Pending;
            }
            return Err(e);
        }
        Ok(true)
    }

    async fn finish(
        &self,
        id: &str,
        status: ScheduleStatus,
        results: Option<Vec<PostResult>>,
    ) -> Result<()> {
        let mut posts = self.posts.lock().await;
        if let Some(post) = posts.iter_mut().find(|p| p.id == id) {
            post.status = status;
            post.results = results;
        }
        self.persist(&posts).await
    }

    async fn persist(&self, posts: &[ScheduledPost]) -> Result<()> {
        let content = serde_json::to_string(posts).map_err(StorageError::Serialization)?;
        self.local.set(SCHEDULED_POSTS_KEY, &content).await
    }
}

fn pending_not_found(id: &str) -> KingdomError {
    KingdomError::NotFound(format!("pending scheduled post '{}'", id))
}

/// One failed result per distinct target, carrying why the run was refused
fn rejected_results(platforms: &[String], error: &KingdomError) -> Vec<PostResult> {
    let mut results: Vec<PostResult> = Vec::with_capacity(platforms.len());
    for platform in platforms {
        if !results.iter().any(|r| &r.platform == platform) {
            results.push(PostResult::failed(
                platform,
                TargetError::Rejected(error.to_string()),
            ));
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountStore;
    use crate::analytics::MemoryAnalytics;
    use crate::error::PlatformError;
    use crate::notifications::NotificationBus;
    use crate::platforms::mock::MockAdapter;
    use crate::platforms::{AdapterRegistry, PlatformRegistry};
    use crate::store::MemoryStore;
    use crate::types::AccountCredentials;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    /// Reads work, writes fail
    struct ReadOnlyStore;

    #[async_trait]
    impl LocalStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(StorageError::Remote("disk full".to_string()).into())
        }
    }

    fn targets(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn in_minutes(minutes: i64) -> DateTime<Utc> {
        Utc::now() + ChronoDuration::minutes(minutes)
    }

    async fn scheduler() -> Scheduler {
        Scheduler::open(Arc::new(MemoryStore::new())).await.unwrap()
    }

    async fn distributor(adapters: Vec<Arc<MockAdapter>>) -> Distributor {
        let accounts = AccountStore::open(
            Arc::new(PlatformRegistry::builtin()),
            Arc::new(MemoryStore::new()),
        )
        .await
        .unwrap();
        accounts
            .add_account("instagram", AccountCredentials::new("ig_1", "@grace", "token"))
            .await
            .unwrap();
        accounts
            .add_account("facebook", AccountCredentials::new("fb_1", "@grace", "token"))
            .await
            .unwrap();

        let mut registry = AdapterRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        Distributor::new(
            Arc::new(accounts),
            registry,
            Arc::new(LogNotifier),
            Arc::new(MemoryAnalytics::new()),
        )
    }

    #[tokio::test]
    async fn test_schedule_and_list_sorted() {
        let scheduler = scheduler().await;
        let later = scheduler
            .schedule(ContentPayload::text("Later"), targets(&["instagram"]), in_minutes(120))
            .await
            .unwrap();
        let sooner = scheduler
            .schedule(ContentPayload::text("Sooner"), targets(&["facebook"]), in_minutes(30))
            .await
            .unwrap();

        let listed = scheduler.list_scheduled().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, sooner);
        assert_eq!(listed[1].id, later);
        assert!(listed.iter().all(|p| p.status == ScheduleStatus::Pending));
    }

    #[tokio::test]
    async fn test_schedule_rejects_past_time() {
        let scheduler = scheduler().await;
        let result = scheduler
            .schedule(ContentPayload::text("Hello"), targets(&["instagram"]), in_minutes(-1))
            .await;
        assert!(matches!(
            result,
            Err(KingdomError::Validation(ValidationError::InvalidTime(_)))
        ));
        assert!(scheduler.list_scheduled().await.is_empty());
    }

    #[tokio::test]
    async fn test_schedule_rejects_empty_input() {
        let scheduler = scheduler().await;
        let empty_text = scheduler
            .schedule(ContentPayload::text(""), targets(&["instagram"]), in_minutes(5))
            .await;
        assert!(matches!(
            empty_text,
            Err(KingdomError::Validation(ValidationError::EmptyContent))
        ));

        let no_targets = scheduler
            .schedule(ContentPayload::text("Hello"), vec![], in_minutes(5))
            .await;
        assert!(matches!(
            no_targets,
            Err(KingdomError::Validation(ValidationError::NoTargets))
        ));
    }

    #[tokio::test]
    async fn test_schedule_confirmation_notification() {
        let bus = NotificationBus::new(8);
        let mut receiver = bus.subscribe();
        let analytics = Arc::new(MemoryAnalytics::new());
        let scheduler = scheduler()
            .await
            .with_notifier(Arc::new(bus.clone()))
            .with_analytics(analytics.clone());

        let id = scheduler
            .schedule(ContentPayload::text("Hello"), targets(&["instagram"]), in_minutes(10))
            .await
            .unwrap();

        let notification = receiver.recv().await.unwrap();
        assert_eq!(notification.title, "Post scheduled");
        assert_eq!(notification.data["scheduled_post_id"], id.as_str());
        assert_eq!(analytics.events_named("post_scheduled").len(), 1);
    }

    #[tokio::test]
    async fn test_schedule_write_failure_keeps_nothing() {
        let scheduler = Scheduler::open(Arc::new(ReadOnlyStore)).await.unwrap();
        let result = scheduler
            .schedule(ContentPayload::text("Hello"), targets(&["instagram"]), in_minutes(10))
            .await;
        assert!(matches!(result, Err(KingdomError::Storage(_))));
        assert!(scheduler.list_scheduled().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_removes_post() {
        let scheduler = scheduler().await;
        let id = scheduler
            .schedule(ContentPayload::text("Hello"), targets(&["instagram"]), in_minutes(10))
            .await
            .unwrap();

        scheduler.cancel(&id).await.unwrap();
        assert!(scheduler.get(&id).await.is_none());
        assert!(matches!(
            scheduler.cancel(&id).await,
            Err(KingdomError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_unknown_id() {
        let scheduler = scheduler().await;
        assert!(matches!(
            scheduler.cancel("no-such-post").await,
            Err(KingdomError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reschedule() {
        let scheduler = scheduler().await;
        let id = scheduler
            .schedule(ContentPayload::text("Hello"), targets(&["instagram"]), in_minutes(10))
            .await
            .unwrap();

        let new_time = in_minutes(90);
        let updated = scheduler.reschedule(&id, new_time).await.unwrap();
        assert_eq!(updated.scheduled_time, new_time);
        assert_eq!(scheduler.get(&id).await.unwrap().scheduled_time, new_time);

        assert!(matches!(
            scheduler.reschedule(&id, in_minutes(-5)).await,
            Err(KingdomError::Validation(ValidationError::InvalidTime(_)))
        ));
        assert!(matches!(
            scheduler.reschedule("missing", in_minutes(5)).await,
            Err(KingdomError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_schedule_from_str() {
        let scheduler = scheduler().await;
        let id = scheduler
            .schedule_from_str(ContentPayload::text("Hello"), targets(&["instagram"]), "2h")
            .await
            .unwrap();

        let post = scheduler.get(&id).await.unwrap();
        let minutes = (post.scheduled_time - Utc::now()).num_minutes();
        assert!((118..=120).contains(&minutes), "got {}", minutes);

        let invalid = scheduler
            .schedule_from_str(ContentPayload::text("Hello"), targets(&["instagram"]), "whenever")
            .await;
        assert!(matches!(
            invalid,
            Err(KingdomError::Validation(ValidationError::InvalidSchedule(_)))
        ));
    }

    #[tokio::test]
    async fn test_random_schedule_follows_latest_pending() {
        let scheduler = scheduler().await;
        let anchor = in_minutes(600);
        scheduler
            .schedule(ContentPayload::text("First"), targets(&["instagram"]), anchor)
            .await
            .unwrap();

        let id = scheduler
            .schedule_from_str(
                ContentPayload::text("Second"),
                targets(&["instagram"]),
                "random:10m-20m",
            )
            .await
            .unwrap();

        let second = scheduler.get(&id).await.unwrap().scheduled_time;
        let gap = (second - anchor).num_minutes();
        assert!((10..=20).contains(&gap), "got {}", gap);
    }

    #[tokio::test]
    async fn test_run_due_completes_and_leaves_future_pending() {
        let scheduler = scheduler().await;
        let instagram = Arc::new(MockAdapter::success("instagram"));
        let distributor = distributor(vec![instagram.clone()]).await;

        let due_id = scheduler
            .schedule(ContentPayload::text("Due"), targets(&["instagram"]), in_minutes(5))
            .await
            .unwrap();
        let future_id = scheduler
            .schedule(ContentPayload::text("Future"), targets(&["instagram"]), in_minutes(60))
            .await
            .unwrap();

        let outcomes = scheduler
            .run_due(&distributor, in_minutes(10))
            .await
            .unwrap();

        assert_eq!(outcomes, vec![(due_id.clone(), ScheduleStatus::Completed)]);
        let done = scheduler.get(&due_id).await.unwrap();
        assert_eq!(done.status, ScheduleStatus::Completed);
        assert!(done.results.unwrap()[0].success);
        assert_eq!(
            scheduler.get(&future_id).await.unwrap().status,
            ScheduleStatus::Pending
        );
        assert_eq!(instagram.post_call_count(), 1);

        // Already executed posts are not run again
        let again = scheduler.run_due(&distributor, in_minutes(10)).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(instagram.post_call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_due_partial_success_completes() {
        let scheduler = scheduler().await;
        let distributor = distributor(vec![
            Arc::new(MockAdapter::success("instagram")),
            Arc::new(MockAdapter::failing_with(
                "facebook",
                PlatformError::RateLimit("slow down".to_string()),
            )),
        ])
        .await;

        let id = scheduler
            .schedule(
                ContentPayload::text("Hello"),
                targets(&["instagram", "facebook"]),
                in_minutes(1),
            )
            .await
            .unwrap();

        scheduler.run_due(&distributor, in_minutes(2)).await.unwrap();
        let post = scheduler.get(&id).await.unwrap();
        assert_eq!(post.status, ScheduleStatus::Completed);
        assert_eq!(post.results.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_due_all_failed() {
        let scheduler = scheduler().await;
        let distributor = distributor(vec![Arc::new(MockAdapter::post_failure(
            "instagram",
            "server error",
        ))])
        .await;

        let id = scheduler
            .schedule(ContentPayload::text("Hello"), targets(&["instagram"]), in_minutes(1))
            .await
            .unwrap();

        let outcomes = scheduler.run_due(&distributor, in_minutes(2)).await.unwrap();
        assert_eq!(outcomes, vec![(id.clone(), ScheduleStatus::Failed)]);
        assert_eq!(scheduler.stats().await.failed, 1);

        // Finished posts cannot be cancelled
        assert!(matches!(
            scheduler.cancel(&id).await,
            Err(KingdomError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_due_rejected_content_records_results() {
        let local = Arc::new(MemoryStore::new());
        let stored = ScheduledPost::new(
            ContentPayload::text("   "),
            targets(&["instagram", "facebook", "instagram"]),
            in_minutes(-1),
        );
        local
            .set(
                SCHEDULED_POSTS_KEY,
                &serde_json::to_string(&vec![stored.clone()]).unwrap(),
            )
            .await
            .unwrap();

        let scheduler = Scheduler::open(local).await.unwrap();
        let instagram = Arc::new(MockAdapter::success("instagram"));
        let distributor = distributor(vec![instagram.clone()]).await;

        let outcomes = scheduler.run_due(&distributor, Utc::now()).await.unwrap();
        assert_eq!(outcomes, vec![(stored.id.clone(), ScheduleStatus::Failed)]);
        assert_eq!(instagram.post_call_count(), 0);

        let post = scheduler.get(&stored.id).await.unwrap();
        let results = post.results.unwrap();
        let platforms: Vec<&str> = results.iter().map(|r| r.platform.as_str()).collect();
        assert_eq!(platforms, vec!["instagram", "facebook"]);
        assert!(results.iter().all(|r| !r.success));
        assert!(matches!(
            results[0].error,
            Some(TargetError::Rejected(ref m)) if m.contains("empty")
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let scheduler = scheduler().await;
        let distributor = distributor(vec![Arc::new(MockAdapter::success("instagram"))]).await;

        for minutes in [1, 2, 60] {
            scheduler
                .schedule(
                    ContentPayload::text("Hello"),
                    targets(&["instagram"]),
                    in_minutes(minutes),
                )
                .await
                .unwrap();
        }
        scheduler.run_due(&distributor, in_minutes(5)).await.unwrap();

        let stats = scheduler.stats().await;
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.total(), 3);
    }

    #[tokio::test]
    async fn test_schedule_survives_reopen() {
        let local = Arc::new(MemoryStore::new());
        let scheduler = Scheduler::open(local.clone()).await.unwrap();
        let id = scheduler
            .schedule(ContentPayload::text("Hello"), targets(&["instagram"]), in_minutes(10))
            .await
            .unwrap();

        let reopened = Scheduler::open(local).await.unwrap();
        let post = reopened.get(&id).await.unwrap();
        assert_eq!(post.content.text, "Hello");
        assert_eq!(post.status, ScheduleStatus::Pending);
    }

    #[tokio::test]
    async fn test_corrupted_schedule_starts_empty() {
        let local = Arc::new(MemoryStore::new());
        local.set(SCHEDULED_POSTS_KEY, "[{ broken").await.unwrap();
        let scheduler = Scheduler::open(local).await.unwrap();
        assert!(scheduler.list_scheduled().await.is_empty());
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let scheduler = scheduler().await;
        let distributor = distributor(vec![]).await;
        let shutdown = Arc::new(AtomicBool::new(true));

        tokio::time::timeout(
            Duration::from_secs(2),
            scheduler.run_worker(&distributor, Duration::from_secs(60), shutdown),
        )
        .await
        .expect("worker should exit when shutdown is already requested");
    }

    #[tokio::test]
    async fn test_worker_processes_due_posts() {
        let local = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(Scheduler::open(local).await.unwrap());
        let instagram = Arc::new(MockAdapter::success("instagram"));
        let distributor = Arc::new(distributor(vec![instagram.clone()]).await);

        let id = scheduler
            .schedule(
                ContentPayload::text("Hello"),
                targets(&["instagram"]),
                Utc::now() + ChronoDuration::milliseconds(200),
            )
            .await
            .unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = {
            let scheduler = scheduler.clone();
            let distributor = distributor.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                scheduler
                    .run_worker(&distributor, Duration::from_millis(100), shutdown)
                    .await;
            })
        };

        tokio::time::sleep(Duration::from_millis(600)).await;
        shutdown.store(true, Ordering::SeqCst);
        worker.await.unwrap();

        assert_eq!(
            scheduler.get(&id).await.unwrap().status,
            ScheduleStatus::Completed
        );
        assert_eq!(instagram.post_call_count(), 1);
    }
}
