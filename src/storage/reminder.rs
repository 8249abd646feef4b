use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use super::Database;
use super::types::ReminderRecord;
use crate::util::time::to_utc_string;

fn map_reminder_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReminderRecord> {
    Ok(ReminderRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        video_id: row.get(2)?,
        message_content: row.get(3)?,
        reminder_time: row.get(4)?,
        scheduled: row.get::<_, i32>(5)? != 0,
        executed: row.get::<_, i32>(6)? != 0,
    })
}

impl Database {
    pub async fn add_reminder(
        &self,
        user_id: &str,
        video_id: &str,
        message_content: &str,
        reminder_time: &str,
    ) -> Result<i64> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO reminder (user_id, video_id, message_content, reminder_time, scheduled, executed)
             VALUES (?1, ?2, ?3, ?4, 0, 0)",
            params![user_id, video_id, message_content, reminder_time],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// A not-yet-delivered reminder the user already holds for this video.
    pub async fn find_pending_reminder(
        &self,
        user_id: &str,
        video_id: &str,
    ) -> Result<Option<ReminderRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, video_id, message_content, reminder_time, scheduled, executed
             FROM reminder
             WHERE user_id = ?1 AND video_id = ?2 AND executed = 0",
        )?;

        let mut rows = stmt.query_map(params![user_id, video_id], map_reminder_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn get_reminders_for_video(&self, video_id: &str) -> Result<Vec<ReminderRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, video_id, message_content, reminder_time, scheduled, executed
             FROM reminder
             WHERE video_id = ?1 AND executed = 0",
        )?;

        let rows = stmt.query_map(params![video_id], map_reminder_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn get_reminders_for_user(&self, user_id: &str) -> Result<Vec<ReminderRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, video_id, message_content, reminder_time, scheduled, executed
             FROM reminder
             WHERE user_id = ?1 AND executed = 0
             ORDER BY reminder_time ASC",
        )?;

        let rows = stmt.query_map(params![user_id], map_reminder_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Unarmed reminders due within `(now, now + lookahead_minutes]`.
    pub async fn get_unscheduled_reminders_due(
        &self,
        now: DateTime<Utc>,
        lookahead_minutes: i64,
    ) -> Result<Vec<ReminderRecord>> {
        let lower = to_utc_string(now);
        let upper = to_utc_string(now + Duration::minutes(lookahead_minutes));
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, video_id, message_content, reminder_time, scheduled, executed
             FROM reminder
             WHERE scheduled = 0 AND executed = 0
               AND reminder_time BETWEEN ?1 AND ?2
             ORDER BY reminder_time ASC",
        )?;

        let rows = stmt.query_map(params![lower, upper], map_reminder_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Reminders that were armed before a restart and still await delivery.
    pub async fn get_armed_undelivered(
        &self,
        now: DateTime<Utc>,
        recheck_minutes: i64,
    ) -> Result<Vec<ReminderRecord>> {
        let lower = to_utc_string(now);
        let upper = to_utc_string(now + Duration::minutes(recheck_minutes));
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, video_id, message_content, reminder_time, scheduled, executed
             FROM reminder
             WHERE scheduled = 1 AND executed = 0
               AND reminder_time BETWEEN ?1 AND ?2
             ORDER BY reminder_time ASC",
        )?;

        let rows = stmt.query_map(params![lower, upper], map_reminder_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn mark_reminder_scheduled(&self, reminder_id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let rows_updated = db.execute(
            "UPDATE reminder SET scheduled = 1 WHERE id = ?1",
            params![reminder_id],
        )?;
        Ok(rows_updated > 0)
    }

    pub async fn mark_reminder_executed(&self, reminder_id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let rows_updated = db.execute(
            "UPDATE reminder SET executed = 1 WHERE id = ?1",
            params![reminder_id],
        )?;
        Ok(rows_updated > 0)
    }

    /// Rewrite a reminder after its stream moved: new fire time, new text.
    pub async fn update_reminder_schedule(
        &self,
        reminder_id: i64,
        reminder_time: &str,
        message_content: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE reminder SET reminder_time = ?1, message_content = ?2 WHERE id = ?3",
            params![reminder_time, message_content, reminder_id],
        )?;
        Ok(())
    }
}
