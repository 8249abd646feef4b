use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serenity::all::UserId;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::discord::messages;
use crate::storage::Database;
use crate::storage::types::ReminderRecord;
use crate::util::time;

/// Direct-message delivery seam. The production implementation goes
/// through the Discord REST API; tests record what would be sent.
#[async_trait]
pub trait DirectMessenger: Send + Sync {
    async fn send_dm(&self, user_id: &str, content: &str) -> Result<()>;
}

pub struct SerenityMessenger {
    http: Arc<serenity::http::Http>,
}

impl SerenityMessenger {
    pub fn new(http: Arc<serenity::http::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DirectMessenger for SerenityMessenger {
    async fn send_dm(&self, user_id: &str, content: &str) -> Result<()> {
        let id: u64 = user_id.parse()?;
        let channel = UserId::new(id).create_dm_channel(&self.http).await?;
        channel.say(&self.http, content).await?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered(i64),
    AlreadyExists,
    TooSoon,
}

/// Owns the reminder lifecycle: registration, one-shot timers, and the
/// rewrite-and-notify path when a stream's start time moves.
pub struct ReminderService {
    db: Database,
    messenger: Arc<dyn DirectMessenger>,
    lead_minutes: i64,
    display_tz: Tz,
}

impl ReminderService {
    pub fn new(
        db: Database,
        messenger: Arc<dyn DirectMessenger>,
        lead_minutes: i64,
        display_tz: Tz,
    ) -> Self {
        Self {
            db,
            messenger,
            lead_minutes,
            display_tz,
        }
    }

    /// Register a reminder firing `lead_minutes` before the target
    /// start. Imminent or past targets are dropped without a row;
    /// an existing undelivered (user, video) pair is left untouched.
    pub async fn register_reminder(
        &self,
        user_id: &str,
        video_id: &str,
        message_content: &str,
        target_start: DateTime<Utc>,
    ) -> Result<RegisterOutcome> {
        let reminder_time = target_start - Duration::minutes(self.lead_minutes);
        if reminder_time <= Utc::now() {
            return Ok(RegisterOutcome::TooSoon);
        }
        if self
            .db
            .find_pending_reminder(user_id, video_id)
            .await?
            .is_some()
        {
            return Ok(RegisterOutcome::AlreadyExists);
        }

        let id = self
            .db
            .add_reminder(
                user_id,
                video_id,
                message_content,
                &time::to_utc_string(reminder_time),
            )
            .await?;
        info!(
            "Reminder {} registered for user {} on video {}",
            id, user_id, video_id
        );
        Ok(RegisterOutcome::Registered(id))
    }

    /// Move every undelivered reminder for a video to the new start
    /// time and tell each owner. One owner's failure does not stop the
    /// rest.
    pub async fn handle_schedule_change(&self, video_id: &str, new_start: &str) -> Result<()> {
        let reminders = self.db.get_reminders_for_video(video_id).await?;
        if reminders.is_empty() {
            return Ok(());
        }

        let new_reminder_time = match time::parse_rfc3339(new_start) {
            Some(start) => time::to_utc_string(start - Duration::minutes(self.lead_minutes)),
            None => {
                warn!(
                    "Schedule change for {} carries an unparseable start time: \"{}\"",
                    video_id, new_start
                );
                return Ok(());
            }
        };

        for reminder in reminders {
            let updated_content = messages::rewrite_schedule_text(
                &reminder.message_content,
                new_start,
                self.display_tz,
            );
            if let Err(e) = self
                .apply_schedule_change(&reminder, &new_reminder_time, &updated_content)
                .await
            {
                error!(
                    "Failed to move reminder {} for user {}: {}",
                    reminder.id, reminder.user_id, e
                );
            }
        }
        Ok(())
    }

    async fn apply_schedule_change(
        &self,
        reminder: &ReminderRecord,
        new_reminder_time: &str,
        updated_content: &str,
    ) -> Result<()> {
        self.db
            .update_reminder_schedule(reminder.id, new_reminder_time, updated_content)
            .await?;
        self.messenger
            .send_dm(
                &reminder.user_id,
                &messages::schedule_change_dm(self.lead_minutes, updated_content),
            )
            .await?;
        info!("Reminder {} moved to {}", reminder.id, new_reminder_time);
        Ok(())
    }

    /// Arm a one-shot timer. The executed flag is set only after the
    /// DM goes out, so a failed delivery stays eligible for the
    /// restart rescan. Past-due times fire immediately.
    pub fn arm_timer(&self, reminder: ReminderRecord) {
        let Some(fire_at) = time::parse_rfc3339(&reminder.reminder_time) else {
            warn!(
                "Reminder {} has an unparseable time: \"{}\"",
                reminder.id, reminder.reminder_time
            );
            return;
        };
        let db = self.db.clone();
        let messenger = Arc::clone(&self.messenger);
        let lead_minutes = self.lead_minutes;

        tokio::spawn(async move {
            let wait = (fire_at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            let content = messages::reminder_dm(lead_minutes, &reminder.message_content);
            match messenger.send_dm(&reminder.user_id, &content).await {
                Ok(()) => match db.mark_reminder_executed(reminder.id).await {
                    Ok(_) => info!(
                        "Reminder {} delivered to user {}",
                        reminder.id, reminder.user_id
                    ),
                    Err(e) => error!(
                        "Reminder {} delivered but could not be flagged: {}",
                        reminder.id, e
                    ),
                },
                Err(e) => error!("Reminder {} delivery failed: {}", reminder.id, e),
            }
        });
    }

    /// One sweep over the reminder table: arm every unarmed reminder
    /// due within the lookahead window, then flag it scheduled. This
    /// is the only writer that flips `scheduled`, so each reminder
    /// gets at most one timer.
    pub async fn schedule_due_reminders(&self, lookahead_minutes: i64) -> Result<usize> {
        let due = self
            .db
            .get_unscheduled_reminders_due(Utc::now(), lookahead_minutes)
            .await?;
        let count = due.len();
        for reminder in due {
            let id = reminder.id;
            self.arm_timer(reminder);
            self.db.mark_reminder_scheduled(id).await?;
        }
        if count > 0 {
            info!("Armed {} reminder(s)", count);
        }
        Ok(count)
    }

    /// Re-arm timers lost to a process restart: rows flagged scheduled
    /// but not executed, due within the recheck window. Past-due rows
    /// are skipped and flags stay as they are.
    pub async fn rearm_pending(&self, recheck_minutes: i64) -> Result<usize> {
        let now = Utc::now();
        let pending = self.db.get_armed_undelivered(now, recheck_minutes).await?;
        let mut rearmed = 0usize;
        for reminder in pending {
            match time::parse_rfc3339(&reminder.reminder_time) {
                Some(fire_at) if fire_at > now => {
                    self.arm_timer(reminder);
                    rearmed += 1;
                }
                _ => {
                    info!(
                        "Skipping past reminder {} ({})",
                        reminder.id, reminder.reminder_time
                    );
                }
            }
        }
        if rearmed > 0 {
            info!("Re-armed {} reminder(s) after restart", rearmed);
        }
        Ok(rearmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_database;
    use chrono::TimeZone;
    use tokio::sync::Mutex;

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

    fn service(db: Database) -> (ReminderService, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::default());
        let svc = ReminderService::new(db, messenger.clone(), 5, chrono_tz::UTC);
        (svc, messenger)
    }

    #[tokio::test]
    async fn registers_a_future_reminder_with_lead_subtracted() {
        let db = test_database();
        let (svc, _) = service(db.clone());
        let target = Utc::now() + Duration::hours(2);

        let outcome = svc
            .register_reminder("user1", "vid01", "[06/01 10:00から配信予定！](url)", target)
            .await
            .unwrap();
        let id = match outcome {
            RegisterOutcome::Registered(id) => id,
            other => panic!("unexpected outcome: {:?}", other),
        };

        let stored = svc
            .db
            .find_pending_reminder("user1", "vid01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(
            stored.reminder_time,
            time::to_utc_string(target - Duration::minutes(5))
        );
        assert!(!stored.scheduled);
        assert!(!stored.executed);
    }

    #[tokio::test]
    async fn second_registration_for_same_pair_is_rejected() {
        let db = test_database();
        let (svc, _) = service(db.clone());
        let target = Utc::now() + Duration::hours(2);

        svc.register_reminder("user1", "vid01", "msg", target)
            .await
            .unwrap();
        let outcome = svc
            .register_reminder("user1", "vid01", "msg", target)
            .await
            .unwrap();
        assert_eq!(outcome, RegisterOutcome::AlreadyExists);

        let all = db.get_reminders_for_user("user1").await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn imminent_target_is_never_persisted() {
        let db = test_database();
        let (svc, _) = service(db.clone());

        // Inside the 5 minute lead window.
        let outcome = svc
            .register_reminder("user1", "vid01", "msg", Utc::now() + Duration::minutes(3))
            .await
            .unwrap();
        assert_eq!(outcome, RegisterOutcome::TooSoon);

        // Already started.
        let outcome = svc
            .register_reminder("user1", "vid01", "msg", Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(outcome, RegisterOutcome::TooSoon);

        assert!(db.get_reminders_for_user("user1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn schedule_change_rewrites_time_and_text_and_notifies_owner() {
        let db = test_database();
        let (svc, messenger) = service(db.clone());
        let target = Utc.with_ymd_and_hms(2099, 6, 1, 10, 0, 0).unwrap();

        svc.register_reminder(
            "user1",
            "vid01",
            "[06/01 10:00から配信予定！](https://www.youtube.com/watch?v=vid01)",
            target,
        )
        .await
        .unwrap();

        svc.handle_schedule_change("vid01", "2099-06-02T20:30:00Z")
            .await
            .unwrap();

        let stored = db
            .find_pending_reminder("user1", "vid01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.reminder_time, "2099-06-02T20:25:00Z");
        assert_eq!(
            stored.message_content,
            "[06/02 20:30から配信予定！](https://www.youtube.com/watch?v=vid01)"
        );

        let sent = messenger.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "user1");
        assert!(sent[0].1.contains("リマインダー更新通知"));
        assert!(sent[0].1.contains("06/02 20:30から配信予定！"));
    }

    #[tokio::test]
    async fn schedule_change_without_reminders_sends_nothing() {
        let db = test_database();
        let (svc, messenger) = service(db);

        svc.handle_schedule_change("vid01", "2099-06-02T20:30:00Z")
            .await
            .unwrap();
        assert!(messenger.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn due_sweep_flips_only_the_scheduled_flag() {
        let db = test_database();
        let (svc, _) = service(db.clone());

        // Due inside the lookahead window but far enough out that the
        // timer will not fire during the test.
        let reminder_time = time::to_utc_string(Utc::now() + Duration::minutes(8));
        db.add_reminder("user1", "vid01", "msg", &reminder_time)
            .await
            .unwrap();

        let armed = svc.schedule_due_reminders(10).await.unwrap();
        assert_eq!(armed, 1);

        let stored = db
            .find_pending_reminder("user1", "vid01")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.scheduled);
        assert!(!stored.executed);

        // A second sweep no longer selects the row.
        assert_eq!(svc.schedule_due_reminders(10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_ignores_reminders_outside_the_window() {
        let db = test_database();
        let (svc, _) = service(db.clone());

        let far = time::to_utc_string(Utc::now() + Duration::hours(4));
        db.add_reminder("user1", "vid01", "msg", &far).await.unwrap();

        assert_eq!(svc.schedule_due_reminders(10).await.unwrap(), 0);
        let stored = db
            .find_pending_reminder("user1", "vid01")
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.scheduled);
    }

    #[tokio::test]
    async fn armed_timer_delivers_and_flags_executed() {
        let db = test_database();
        let (svc, messenger) = service(db.clone());

        // Past-due time fires immediately.
        let past = time::to_utc_string(Utc::now() - Duration::seconds(1));
        let id = db.add_reminder("user1", "vid01", "msg", &past).await.unwrap();
        db.mark_reminder_scheduled(id).await.unwrap();

        let stored = db
            .find_pending_reminder("user1", "vid01")
            .await
            .unwrap()
            .unwrap();
        svc.arm_timer(stored);

        // Give the spawned timer a moment to run.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let sent = messenger.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "🔔 5分後に配信が始まるよ！\nmsg");
        drop(sent);

        assert!(db.find_pending_reminder("user1", "vid01").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restart_rescan_rearms_without_touching_flags() {
        let db = test_database();
        let (svc, _) = service(db.clone());

        let soon = time::to_utc_string(Utc::now() + Duration::minutes(8));
        let id = db.add_reminder("user1", "vid01", "msg", &soon).await.unwrap();
        db.mark_reminder_scheduled(id).await.unwrap();

        let rearmed = svc.rearm_pending(10).await.unwrap();
        assert_eq!(rearmed, 1);

        let stored = db
            .find_pending_reminder("user1", "vid01")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.scheduled);
        assert!(!stored.executed);
    }
}
