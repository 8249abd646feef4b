use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use tracing::{info, warn};

use super::Database;
use super::types::{SweptVideo, VideoRecord};
use crate::util::time::to_utc_string;

fn map_video_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VideoRecord> {
    let status: String = row.get(5)?;
    let status = status.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(VideoRecord {
        video_id: row.get(0)?,
        title: row.get(1)?,
        published: row.get(2)?,
        updated: row.get(3)?,
        channel_id: row.get(4)?,
        status,
        scheduled_start_time: row.get(6)?,
        actual_start_time: row.get(7)?,
        actual_end_time: row.get(8)?,
        duration: row.get(9)?,
    })
}

impl Database {
    pub async fn video_exists(&self, video_id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT 1 FROM video_data WHERE video_id = ?1")?;
        Ok(stmt.exists(params![video_id])?)
    }

    pub async fn get_video(&self, video_id: &str) -> Result<Option<VideoRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT video_id, title, published, updated, channel_id, status,
                    scheduled_start_time, actual_start_time, actual_end_time, duration
             FROM video_data WHERE video_id = ?1",
        )?;

        let mut rows = stmt.query_map(params![video_id], map_video_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn insert_video(&self, record: &VideoRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO video_data (video_id, title, published, updated, channel_id, status,
                                     scheduled_start_time, actual_start_time, actual_end_time, duration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.video_id,
                record.title,
                record.published,
                record.updated,
                record.channel_id,
                record.status.as_str(),
                record.scheduled_start_time,
                record.actual_start_time,
                record.actual_end_time,
                record.duration,
            ],
        )?;
        info!(
            "Registered new video: {} ({})",
            record.title, record.video_id
        );
        Ok(())
    }

    /// Full-row replace keyed on video_id.
    pub async fn update_video(&self, record: &VideoRecord) -> Result<()> {
        let db = self.db.lock().await;
        let rows_updated = db.execute(
            "UPDATE video_data
             SET title = ?2, published = ?3, updated = ?4, channel_id = ?5, status = ?6,
                 scheduled_start_time = ?7, actual_start_time = ?8, actual_end_time = ?9, duration = ?10
             WHERE video_id = ?1",
            params![
                record.video_id,
                record.title,
                record.published,
                record.updated,
                record.channel_id,
                record.status.as_str(),
                record.scheduled_start_time,
                record.actual_start_time,
                record.actual_end_time,
                record.duration,
            ],
        )?;
        if rows_updated == 0 {
            warn!("No video row found to update: {}", record.video_id);
        }
        Ok(())
    }

    /// Refresh only the `updated` timestamp of a terminal-status row.
    pub async fn touch_video_updated(&self, video_id: &str, updated: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE video_data SET updated = ?1 WHERE video_id = ?2",
            params![updated, video_id],
        )?;
        Ok(())
    }

    pub async fn get_live_videos(&self) -> Result<Vec<VideoRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT video_id, title, published, updated, channel_id, status,
                    scheduled_start_time, actual_start_time, actual_end_time, duration
             FROM video_data WHERE status = 'live'
             ORDER BY actual_start_time ASC",
        )?;

        let rows = stmt.query_map([], map_video_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Upcoming videos whose start lies in `(now, now + within_minutes]`.
    pub async fn get_upcoming_videos(
        &self,
        now: DateTime<Utc>,
        within_minutes: i64,
    ) -> Result<Vec<VideoRecord>> {
        let lower = to_utc_string(now);
        let upper = to_utc_string(now + Duration::minutes(within_minutes));
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT video_id, title, published, updated, channel_id, status,
                    scheduled_start_time, actual_start_time, actual_end_time, duration
             FROM video_data
             WHERE status = 'upcoming'
               AND scheduled_start_time > ?1
               AND scheduled_start_time <= ?2
             ORDER BY scheduled_start_time ASC",
        )?;

        let rows = stmt.query_map(params![lower, upper], map_video_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Upcoming videos whose scheduled start has already passed.
    pub async fn get_overdue_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<VideoRecord>> {
        let bound = to_utc_string(now);
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT video_id, title, published, updated, channel_id, status,
                    scheduled_start_time, actual_start_time, actual_end_time, duration
             FROM video_data
             WHERE status = 'upcoming' AND scheduled_start_time <= ?1",
        )?;

        let rows = stmt.query_map(params![bound], map_video_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Delete stale upcoming/live rows in one transaction and return what
    /// was removed. Upcoming rows age by scheduled start, live rows by
    /// actual start.
    pub async fn sweep_stale_videos(&self, cutoff: DateTime<Utc>) -> Result<Vec<SweptVideo>> {
        let cutoff = to_utc_string(cutoff);
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;

        let mut swept = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT video_id, title, status FROM video_data
                 WHERE (status = 'upcoming' AND scheduled_start_time < ?1)
                    OR (status = 'live' AND actual_start_time < ?1)",
            )?;
            let rows = stmt.query_map(params![cutoff], |row| {
                let status: String = row.get(2)?;
                let status = status.parse().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(SweptVideo {
                    video_id: row.get(0)?,
                    title: row.get(1)?,
                    status,
                })
            })?;
            for row in rows {
                swept.push(row?);
            }
        }

        tx.execute(
            "DELETE FROM video_data WHERE status = 'upcoming' AND scheduled_start_time < ?1",
            params![cutoff],
        )?;
        tx.execute(
            "DELETE FROM video_data WHERE status = 'live' AND actual_start_time < ?1",
            params![cutoff],
        )?;
        tx.commit()?;

        Ok(swept)
    }
}
