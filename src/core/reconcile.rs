use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::discord::messages;
use crate::discord::reminders::ReminderService;
use crate::discord::webhook::{Notification, Notifier};
use crate::storage::Database;
use crate::storage::types::{ChannelRecord, VideoRecord, VideoStatus};
use crate::util::time;
use crate::youtube::feed::{FeedEntry, FeedSource};
use crate::youtube::{VideoInfo, VideoResolver};

/// The single highest-priority change observed for a tracked video in
/// one reconciliation. Branches are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Status,
    Schedule,
    Title,
    None,
}

/// Compares feed-reported activity against stored state, applies the
/// minimal correct update, and emits at most one notification per
/// real-world change. Holds no state of its own; every invocation is
/// idempotent given the same store snapshot.
pub struct ReconcileEngine {
    db: Database,
    resolver: Arc<dyn VideoResolver>,
    feed: Arc<dyn FeedSource>,
    notifier: Arc<dyn Notifier>,
    reminders: Arc<ReminderService>,
    display_tz: Tz,
}

impl ReconcileEngine {
    pub fn new(
        db: Database,
        resolver: Arc<dyn VideoResolver>,
        feed: Arc<dyn FeedSource>,
        notifier: Arc<dyn Notifier>,
        reminders: Arc<ReminderService>,
        display_tz: Tz,
    ) -> Self {
        Self {
            db,
            resolver,
            feed,
            notifier,
            reminders,
            display_tz,
        }
    }

    /// Pull the channel's recent feed entries and reconcile each one.
    /// A single entry's failure never aborts the rest of the batch.
    pub async fn reconcile_channel(&self, channel: &ChannelRecord) -> Result<()> {
        let entries = self.feed.fetch_feed(&channel.channel_id).await?;
        for entry in entries {
            if let Err(e) = self.reconcile_entry(channel, &entry).await {
                error!(
                    "Failed to reconcile {} from channel {}: {}",
                    entry.video_id, channel.channel_id, e
                );
            }
        }
        Ok(())
    }

    async fn reconcile_entry(&self, channel: &ChannelRecord, entry: &FeedEntry) -> Result<()> {
        match self.db.get_video(&entry.video_id).await? {
            None => self.register_new_video(channel, entry).await,
            Some(stored) => self.update_known_video(channel, entry, stored).await,
        }
    }

    /// First sighting: resolve, insert, announce the current status.
    /// Resolver failure skips the entry entirely so no partial row is
    /// ever written.
    async fn register_new_video(&self, channel: &ChannelRecord, entry: &FeedEntry) -> Result<()> {
        let info = match self.resolver.resolve_video(&entry.video_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Skipping new video {}: {}", entry.video_id, e);
                return Ok(());
            }
        };

        let record = VideoRecord {
            video_id: entry.video_id.clone(),
            title: entry.title.clone(),
            published: entry.published.clone(),
            updated: entry.updated.clone(),
            channel_id: channel.channel_id.clone(),
            status: info.status,
            scheduled_start_time: info.scheduled_start_time.clone(),
            actual_start_time: info.actual_start_time.clone(),
            actual_end_time: info.actual_end_time.clone(),
            duration: Some(info.duration.clone()),
        };
        self.db.insert_video(&record).await?;

        let description = messages::description_for(&info, self.display_tz);
        self.send_notification(channel, &entry.video_id, description)
            .await;
        Ok(())
    }

    async fn update_known_video(
        &self,
        channel: &ChannelRecord,
        entry: &FeedEntry,
        stored: VideoRecord,
    ) -> Result<()> {
        // Dedup gate: the feed has not observed any change since the
        // last reconciliation.
        if time::same_instant(&stored.updated, &entry.updated) {
            return Ok(());
        }

        // Terminal rows only need their bookkeeping timestamp moved
        // forward; their state cannot change any more.
        if !stored.status.is_pending() {
            return self
                .db
                .touch_video_updated(&entry.video_id, &entry.updated)
                .await;
        }

        let info = match self.resolver.resolve_video(&entry.video_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Leaving {} unchanged, resolve failed: {}", entry.video_id, e);
                return Ok(());
            }
        };

        let change = classify_change(&stored, &info);

        let record = VideoRecord {
            video_id: entry.video_id.clone(),
            title: info.title.clone(),
            published: entry.published.clone(),
            updated: entry.updated.clone(),
            channel_id: stored.channel_id.clone(),
            status: info.status,
            scheduled_start_time: info.scheduled_start_time.clone(),
            actual_start_time: info.actual_start_time.clone(),
            actual_end_time: info.actual_end_time.clone(),
            duration: Some(info.duration.clone()),
        };
        self.db.update_video(&record).await?;

        match change {
            Change::Status => {
                let description = messages::description_for(&info, self.display_tz);
                self.send_notification(channel, &entry.video_id, description)
                    .await;
            }
            Change::Schedule => {
                let description = messages::schedule_change_description(
                    info.scheduled_start_time.as_deref(),
                    self.display_tz,
                );
                self.send_notification(channel, &entry.video_id, description)
                    .await;
                if let Some(new_start) = info.scheduled_start_time.as_deref() {
                    if let Err(e) = self
                        .reminders
                        .handle_schedule_change(&entry.video_id, new_start)
                        .await
                    {
                        error!("Reminder propagation failed for {}: {}", entry.video_id, e);
                    }
                }
            }
            Change::Title => {
                let description = messages::title_change_description(&stored.title, &info.title);
                self.send_notification(channel, &entry.video_id, description)
                    .await;
            }
            Change::None => {
                info!(
                    "No semantic change for {} (updated {} -> {})",
                    entry.video_id, stored.updated, entry.updated
                );
            }
        }
        Ok(())
    }

    /// Re-resolve every upcoming video whose scheduled start has
    /// passed, fanning the API calls out concurrently. Returns how
    /// many rows were changed.
    pub async fn refresh_overdue_statuses(&self) -> Result<usize> {
        let overdue = self.db.get_overdue_upcoming(Utc::now()).await?;
        if overdue.is_empty() {
            return Ok(0);
        }
        info!("Re-checking {} overdue upcoming video(s)", overdue.len());

        let mut tasks = JoinSet::new();
        for stored in overdue {
            let resolver = Arc::clone(&self.resolver);
            tasks.spawn(async move {
                let resolved = resolver.resolve_video(&stored.video_id).await;
                (stored, resolved)
            });
        }

        let mut changed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (stored, resolved) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Status refresh task failed: {}", e);
                    continue;
                }
            };
            match resolved {
                Ok(info) => match self.apply_refresh(&stored, &info).await {
                    Ok(true) => changed += 1,
                    Ok(false) => {}
                    Err(e) => error!("Status refresh for {} failed: {}", stored.video_id, e),
                },
                Err(e) => warn!("Leaving {} unchanged, resolve failed: {}", stored.video_id, e),
            }
        }
        Ok(changed)
    }

    /// One overdue video against its re-resolved state. A status move
    /// gets the full update-and-notify treatment; a start time that
    /// quietly slipped while staying upcoming is updated silently.
    async fn apply_refresh(&self, stored: &VideoRecord, info: &VideoInfo) -> Result<bool> {
        if info.status != VideoStatus::Upcoming {
            self.db.update_video(&refreshed_record(stored, info)).await?;
            info!(
                "Video {} moved on from upcoming to {}",
                stored.video_id, info.status
            );

            match self.db.get_channel(&stored.channel_id).await? {
                Some(channel) => {
                    let description = messages::description_for(info, self.display_tz);
                    self.send_notification(&channel, &stored.video_id, description)
                        .await;
                }
                None => warn!(
                    "No channel config for {}; skipping notification for {}",
                    stored.channel_id, stored.video_id
                ),
            }
            return Ok(true);
        }

        if let (Some(old), Some(new)) = (
            stored.scheduled_start_time.as_deref(),
            info.scheduled_start_time.as_deref(),
        ) {
            if !time::same_instant(old, new) {
                self.db.update_video(&refreshed_record(stored, info)).await?;
                info!("Scheduled start for {} slipped to {}", stored.video_id, new);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn send_notification(&self, channel: &ChannelRecord, video_id: &str, description: String) {
        if channel.discord_webhook_url.is_empty() {
            warn!(
                "Channel {} has no webhook URL; dropping notification for {}",
                channel.channel_id, video_id
            );
            return;
        }
        let notification = Notification {
            channel_name: channel.channel_name.clone(),
            video_id: video_id.to_string(),
            description,
            icon_url: channel.channel_icon_url.clone(),
        };
        if let Err(e) = self
            .notifier
            .notify(&channel.discord_webhook_url, &notification)
            .await
        {
            error!("Notification for {} failed: {}", video_id, e);
        }
    }
}

/// Status transition dominates; a schedule shift only counts while the
/// video stays upcoming; a title change only counts when nothing else
/// moved.
fn classify_change(stored: &VideoRecord, info: &VideoInfo) -> Change {
    if stored.status != info.status {
        return Change::Status;
    }
    if stored.status == VideoStatus::Upcoming
        && schedule_shifted(
            stored.scheduled_start_time.as_deref(),
            info.scheduled_start_time.as_deref(),
        )
    {
        return Change::Schedule;
    }
    if stored.title != info.title {
        return Change::Title;
    }
    Change::None
}

fn schedule_shifted(stored: Option<&str>, resolved: Option<&str>) -> bool {
    match (stored, resolved) {
        (Some(a), Some(b)) => !time::same_instant(a, b),
        (None, None) => false,
        _ => true,
    }
}

/// Refreshed row for an overdue video: resolved state, but the feed
/// bookkeeping columns and channel stay as stored.
fn refreshed_record(stored: &VideoRecord, info: &VideoInfo) -> VideoRecord {
    VideoRecord {
        video_id: stored.video_id.clone(),
        title: info.title.clone(),
        published: stored.published.clone(),
        updated: stored.updated.clone(),
        channel_id: stored.channel_id.clone(),
        status: info.status,
        scheduled_start_time: info.scheduled_start_time.clone(),
        actual_start_time: info.actual_start_time.clone(),
        actual_end_time: info.actual_end_time.clone(),
        duration: Some(info.duration.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::reminders::DirectMessenger;
    use crate::storage::test_database;
    use crate::youtube::ResolveError;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct StubResolver {
        videos: Mutex<HashMap<String, VideoInfo>>,
        calls: Mutex<usize>,
    }

    impl StubResolver {
        async fn set(&self, info: VideoInfo) {
            self.videos.lock().await.insert(info.video_id.clone(), info);
        }

        async fn call_count(&self) -> usize {
            *self.calls.lock().await
        }
    }

    #[async_trait]
    impl VideoResolver for StubResolver {
        async fn resolve_video(&self, video_id: &str) -> Result<VideoInfo, ResolveError> {
            *self.calls.lock().await += 1;
            self.videos
                .lock()
                .await
                .get(video_id)
                .cloned()
                .ok_or(ResolveError::NotFound)
        }

        async fn fetch_channel_icon(
            &self,
            _channel_id: &str,
        ) -> Result<Option<String>, ResolveError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct StubFeed {
        entries: Mutex<Vec<FeedEntry>>,
    }

    #[async_trait]
    impl FeedSource for StubFeed {
        async fn fetch_feed(&self, _channel_id: &str) -> Result<Vec<FeedEntry>> {
            Ok(self.entries.lock().await.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, Notification)>>,
    }

    impl RecordingNotifier {
        async fn descriptions(&self) -> Vec<String> {
            self.sent
                .lock()
                .await
                .iter()
                .map(|(_, n)| n.description.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, webhook_url: &str, notification: &Notification) -> Result<()> {
            self.sent
                .lock()
                .await
                .push((webhook_url.to_string(), notification.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl DirectMessenger for RecordingMessenger {
        async fn send_dm(&self, user_id: &str, content: &str) -> Result<()> {
            self.sent
                .lock()
                .await
                .push((user_id.to_string(), content.to_string()));
            Ok(())
        }
    }

    struct Harness {
        db: Database,
        resolver: Arc<StubResolver>,
        feed: Arc<StubFeed>,
        notifier: Arc<RecordingNotifier>,
        messenger: Arc<RecordingMessenger>,
        engine: ReconcileEngine,
        channel: ChannelRecord,
    }

    fn harness() -> Harness {
        let db = test_database();
        let resolver = Arc::new(StubResolver::default());
        let feed = Arc::new(StubFeed::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let reminders = Arc::new(ReminderService::new(
            db.clone(),
            messenger.clone(),
            5,
            chrono_tz::UTC,
        ));
        let engine = ReconcileEngine::new(
            db.clone(),
            resolver.clone(),
            feed.clone(),
            notifier.clone(),
            reminders,
            chrono_tz::UTC,
        );
        let channel = ChannelRecord {
            channel_id: "ch1".to_string(),
            channel_name: "Example Channel".to_string(),
            channel_icon_url: "https://example.com/icon.png".to_string(),
            discord_webhook_url: "https://discord.test/webhook".to_string(),
            interval_minutes: 10,
            is_active: true,
        };
        Harness {
            db,
            resolver,
            feed,
            notifier,
            messenger,
            engine,
            channel,
        }
    }

    fn entry(video_id: &str, title: &str, updated: &str) -> FeedEntry {
        FeedEntry {
            video_id: video_id.to_string(),
            title: title.to_string(),
            published: "2024-06-01T00:00:00Z".to_string(),
            updated: updated.to_string(),
        }
    }

    fn upcoming_info(video_id: &str, scheduled: &str) -> VideoInfo {
        VideoInfo {
            video_id: video_id.to_string(),
            title: "a stream".to_string(),
            status: VideoStatus::Upcoming,
            scheduled_start_time: Some(scheduled.to_string()),
            actual_start_time: None,
            actual_end_time: None,
            duration: "00:00:00".to_string(),
        }
    }

    fn live_info(video_id: &str, started: &str) -> VideoInfo {
        VideoInfo {
            video_id: video_id.to_string(),
            title: "a stream".to_string(),
            status: VideoStatus::Live,
            scheduled_start_time: Some("2024-06-01T10:00:00Z".to_string()),
            actual_start_time: Some(started.to_string()),
            actual_end_time: None,
            duration: "00:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn first_sighting_inserts_and_notifies_once() {
        let h = harness();
        h.resolver
            .set(upcoming_info("abc123", "2024-06-01T10:00:00Z"))
            .await;

        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T01:00:00Z"))
            .await
            .unwrap();

        let stored = h.db.get_video("abc123").await.unwrap().unwrap();
        assert_eq!(stored.status, VideoStatus::Upcoming);
        assert_eq!(stored.channel_id, "ch1");
        assert_eq!(stored.updated, "2024-06-01T01:00:00Z");

        let descriptions = h.notifier.descriptions().await;
        assert_eq!(descriptions, vec!["06/01 10:00から配信予定！".to_string()]);
    }

    #[tokio::test]
    async fn unchanged_feed_entry_is_a_no_op() {
        let h = harness();
        h.resolver
            .set(upcoming_info("abc123", "2024-06-01T10:00:00Z"))
            .await;
        let e = entry("abc123", "a stream", "2024-06-01T01:00:00Z");

        h.engine.reconcile_entry(&h.channel, &e).await.unwrap();
        h.engine.reconcile_entry(&h.channel, &e).await.unwrap();
        h.engine.reconcile_entry(&h.channel, &e).await.unwrap();

        // One resolve for the first sighting; the dedup gate stops the
        // rest before any API call.
        assert_eq!(h.resolver.call_count().await, 1);
        assert_eq!(h.notifier.descriptions().await.len(), 1);
    }

    #[tokio::test]
    async fn dedup_gate_tolerates_offset_spelling_differences() {
        let h = harness();
        h.resolver
            .set(upcoming_info("abc123", "2024-06-01T10:00:00Z"))
            .await;
        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T01:00:00Z"))
            .await
            .unwrap();

        h.engine
            .reconcile_entry(
                &h.channel,
                &entry("abc123", "a stream", "2024-06-01T10:00:00+09:00"),
            )
            .await
            .unwrap();

        assert_eq!(h.resolver.call_count().await, 1);
    }

    #[tokio::test]
    async fn unresolvable_new_entry_is_skipped() {
        let h = harness();

        h.engine
            .reconcile_entry(&h.channel, &entry("ghost", "gone", "2024-06-01T01:00:00Z"))
            .await
            .unwrap();

        assert!(h.db.get_video("ghost").await.unwrap().is_none());
        assert!(h.notifier.descriptions().await.is_empty());
    }

    #[tokio::test]
    async fn status_transition_notifies_with_the_new_status_template() {
        let h = harness();
        h.resolver
            .set(upcoming_info("abc123", "2024-06-01T10:00:00Z"))
            .await;
        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T01:00:00Z"))
            .await
            .unwrap();

        h.resolver
            .set(live_info("abc123", "2024-06-01T10:05:00Z"))
            .await;
        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T10:06:00Z"))
            .await
            .unwrap();

        let stored = h.db.get_video("abc123").await.unwrap().unwrap();
        assert_eq!(stored.status, VideoStatus::Live);
        assert_eq!(stored.actual_start_time.as_deref(), Some("2024-06-01T10:05:00Z"));

        let descriptions = h.notifier.descriptions().await;
        assert_eq!(descriptions.len(), 2);
        assert_eq!(descriptions[1], "10:05から配信中！");
        // A status transition never triggers reminder propagation.
        assert!(h.messenger.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn schedule_shift_annotates_and_propagates_to_reminders() {
        let h = harness();
        h.resolver
            .set(upcoming_info("abc123", "2024-06-01T10:00:00Z"))
            .await;
        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T01:00:00Z"))
            .await
            .unwrap();

        h.db.add_reminder(
            "user1",
            "abc123",
            "[06/01 10:00から配信予定！](https://www.youtube.com/watch?v=abc123)",
            "2024-06-01T09:55:00Z",
        )
        .await
        .unwrap();

        h.resolver
            .set(upcoming_info("abc123", "2024-06-01T10:30:00Z"))
            .await;
        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T02:00:00Z"))
            .await
            .unwrap();

        let stored = h.db.get_video("abc123").await.unwrap().unwrap();
        assert_eq!(
            stored.scheduled_start_time.as_deref(),
            Some("2024-06-01T10:30:00Z")
        );

        let descriptions = h.notifier.descriptions().await;
        assert_eq!(descriptions[1], "配信予定が 06/01 10:30 に変更されました。");

        let reminder = h
            .db
            .find_pending_reminder("user1", "abc123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reminder.reminder_time, "2024-06-01T10:25:00Z");
        assert_eq!(
            reminder.message_content,
            "[06/01 10:30から配信予定！](https://www.youtube.com/watch?v=abc123)"
        );

        let dms = h.messenger.sent.lock().await;
        assert_eq!(dms.len(), 1);
        assert_eq!(dms[0].0, "user1");
    }

    #[tokio::test]
    async fn title_change_annotates_without_reminder_propagation() {
        let h = harness();
        h.resolver
            .set(upcoming_info("abc123", "2024-06-01T10:00:00Z"))
            .await;
        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T01:00:00Z"))
            .await
            .unwrap();

        let mut renamed = upcoming_info("abc123", "2024-06-01T10:00:00Z");
        renamed.title = "b stream".to_string();
        h.resolver.set(renamed).await;
        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T02:00:00Z"))
            .await
            .unwrap();

        let stored = h.db.get_video("abc123").await.unwrap().unwrap();
        assert_eq!(stored.title, "b stream");

        let descriptions = h.notifier.descriptions().await;
        assert_eq!(
            descriptions[1],
            "タイトルが a stream から b stream に更新されました。"
        );
        assert!(h.messenger.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn no_semantic_change_still_advances_the_updated_column() {
        let h = harness();
        h.resolver
            .set(upcoming_info("abc123", "2024-06-01T10:00:00Z"))
            .await;
        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T01:00:00Z"))
            .await
            .unwrap();

        h.engine
            .reconcile_entry(&h.channel, &entry("abc123", "a stream", "2024-06-01T02:00:00Z"))
            .await
            .unwrap();

        let stored = h.db.get_video("abc123").await.unwrap().unwrap();
        assert_eq!(stored.updated, "2024-06-01T02:00:00Z");
        assert_eq!(h.notifier.descriptions().await.len(), 1);
    }

    #[tokio::test]
    async fn terminal_rows_are_touched_without_resolving() {
        let h = harness();
        let record = VideoRecord {
            video_id: "done01".to_string(),
            title: "finished stream".to_string(),
            published: "2024-06-01T00:00:00Z".to_string(),
            updated: "2024-06-01T01:00:00Z".to_string(),
            channel_id: "ch1".to_string(),
            status: VideoStatus::Archive,
            scheduled_start_time: Some("2024-06-01T10:00:00Z".to_string()),
            actual_start_time: Some("2024-06-01T10:05:00Z".to_string()),
            actual_end_time: Some("2024-06-01T12:00:00Z".to_string()),
            duration: Some("01:55:00".to_string()),
        };
        h.db.insert_video(&record).await.unwrap();

        h.engine
            .reconcile_entry(
                &h.channel,
                &entry("done01", "finished stream", "2024-06-01T13:00:00Z"),
            )
            .await
            .unwrap();

        assert_eq!(h.resolver.call_count().await, 0);
        assert!(h.notifier.descriptions().await.is_empty());

        let stored = h.db.get_video("done01").await.unwrap().unwrap();
        assert_eq!(stored.updated, "2024-06-01T13:00:00Z");
        assert_eq!(stored.status, VideoStatus::Archive);
        assert_eq!(stored.title, "finished stream");
    }

    #[tokio::test]
    async fn channel_batch_continues_past_unresolvable_entries() {
        let h = harness();
        h.resolver
            .set(upcoming_info("good01", "2024-06-01T10:00:00Z"))
            .await;
        *h.feed.entries.lock().await = vec![
            entry("ghost", "gone", "2024-06-01T01:00:00Z"),
            entry("good01", "a stream", "2024-06-01T01:00:00Z"),
        ];

        h.engine.reconcile_channel(&h.channel).await.unwrap();

        assert!(h.db.get_video("ghost").await.unwrap().is_none());
        assert!(h.db.get_video("good01").await.unwrap().is_some());
        assert_eq!(h.notifier.descriptions().await.len(), 1);
    }

    #[tokio::test]
    async fn overdue_refresh_moves_a_started_stream_to_live() {
        let h = harness();
        h.db.upsert_channel(&h.channel).await.unwrap();

        let overdue_start = time::to_utc_string(Utc::now() - Duration::minutes(10));
        let record = VideoRecord {
            video_id: "late01".to_string(),
            title: "a stream".to_string(),
            published: "2024-06-01T00:00:00Z".to_string(),
            updated: "2024-06-01T01:00:00Z".to_string(),
            channel_id: "ch1".to_string(),
            status: VideoStatus::Upcoming,
            scheduled_start_time: Some(overdue_start.clone()),
            actual_start_time: None,
            actual_end_time: None,
            duration: Some("00:00:00".to_string()),
        };
        h.db.insert_video(&record).await.unwrap();
        h.resolver
            .set(live_info("late01", "2024-06-01T10:05:00Z"))
            .await;

        let changed = h.engine.refresh_overdue_statuses().await.unwrap();
        assert_eq!(changed, 1);

        let stored = h.db.get_video("late01").await.unwrap().unwrap();
        assert_eq!(stored.status, VideoStatus::Live);
        // Feed bookkeeping columns survive a refresh untouched.
        assert_eq!(stored.published, "2024-06-01T00:00:00Z");
        assert_eq!(stored.updated, "2024-06-01T01:00:00Z");

        let descriptions = h.notifier.descriptions().await;
        assert_eq!(descriptions, vec!["10:05から配信中！".to_string()]);
    }

    #[tokio::test]
    async fn overdue_refresh_applies_a_quiet_slip_without_notifying() {
        let h = harness();
        h.db.upsert_channel(&h.channel).await.unwrap();

        let overdue_start = time::to_utc_string(Utc::now() - Duration::minutes(10));
        let new_start = time::to_utc_string(Utc::now() + Duration::hours(1));
        let record = VideoRecord {
            video_id: "slip01".to_string(),
            title: "a stream".to_string(),
            published: "2024-06-01T00:00:00Z".to_string(),
            updated: "2024-06-01T01:00:00Z".to_string(),
            channel_id: "ch1".to_string(),
            status: VideoStatus::Upcoming,
            scheduled_start_time: Some(overdue_start),
            actual_start_time: None,
            actual_end_time: None,
            duration: Some("00:00:00".to_string()),
        };
        h.db.insert_video(&record).await.unwrap();
        h.resolver.set(upcoming_info("slip01", &new_start)).await;

        let changed = h.engine.refresh_overdue_statuses().await.unwrap();
        assert_eq!(changed, 1);

        let stored = h.db.get_video("slip01").await.unwrap().unwrap();
        assert_eq!(stored.status, VideoStatus::Upcoming);
        assert_eq!(stored.scheduled_start_time.as_deref(), Some(new_start.as_str()));
        assert!(h.notifier.descriptions().await.is_empty());
    }

    #[tokio::test]
    async fn overdue_refresh_leaves_unresolved_rows_alone() {
        let h = harness();
        let overdue_start = time::to_utc_string(Utc::now() - Duration::minutes(10));
        let record = VideoRecord {
            video_id: "stuck1".to_string(),
            title: "a stream".to_string(),
            published: "2024-06-01T00:00:00Z".to_string(),
            updated: "2024-06-01T01:00:00Z".to_string(),
            channel_id: "ch1".to_string(),
            status: VideoStatus::Upcoming,
            scheduled_start_time: Some(overdue_start.clone()),
            actual_start_time: None,
            actual_end_time: None,
            duration: Some("00:00:00".to_string()),
        };
        h.db.insert_video(&record).await.unwrap();

        let changed = h.engine.refresh_overdue_statuses().await.unwrap();
        assert_eq!(changed, 0);

        let stored = h.db.get_video("stuck1").await.unwrap().unwrap();
        assert_eq!(stored.status, VideoStatus::Upcoming);
        assert_eq!(stored.scheduled_start_time.as_deref(), Some(overdue_start.as_str()));
    }

    #[tokio::test]
    async fn missing_webhook_url_drops_the_notification() {
        let h = harness();
        h.resolver
            .set(upcoming_info("abc123", "2024-06-01T10:00:00Z"))
            .await;
        let mut channel = h.channel.clone();
        channel.discord_webhook_url = String::new();

        h.engine
            .reconcile_entry(&channel, &entry("abc123", "a stream", "2024-06-01T01:00:00Z"))
            .await
            .unwrap();

        // The row is still written; only delivery is skipped.
        assert!(h.db.get_video("abc123").await.unwrap().is_some());
        assert!(h.notifier.descriptions().await.is_empty());
    }
}
