use anyhow::Result;
use rusqlite::params;

use super::Database;
use super::types::ChannelRecord;

fn map_channel_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelRecord> {
    Ok(ChannelRecord {
        channel_id: row.get(0)?,
        channel_name: row.get(1)?,
        channel_icon_url: row.get(2)?,
        discord_webhook_url: row.get(3)?,
        interval_minutes: row.get(4)?,
        is_active: row.get::<_, i32>(5)? != 0,
    })
}

impl Database {
    pub async fn upsert_channel(&self, channel: &ChannelRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO channels
                (channel_id, channel_name, channel_icon_url, discord_webhook_url, interval_minutes, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                channel.channel_id,
                channel.channel_name,
                channel.channel_icon_url,
                channel.discord_webhook_url,
                channel.interval_minutes,
                channel.is_active as i32,
            ],
        )?;
        Ok(())
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT channel_id, channel_name, channel_icon_url, discord_webhook_url, interval_minutes, is_active
             FROM channels WHERE channel_id = ?1",
        )?;

        let mut rows = stmt.query_map(params![channel_id], map_channel_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn get_all_channels(&self) -> Result<Vec<ChannelRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT channel_id, channel_name, channel_icon_url, discord_webhook_url, interval_minutes, is_active
             FROM channels ORDER BY channel_name ASC",
        )?;

        let rows = stmt.query_map([], map_channel_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn get_active_channels_with_interval(
        &self,
        interval_minutes: u32,
    ) -> Result<Vec<ChannelRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT channel_id, channel_name, channel_icon_url, discord_webhook_url, interval_minutes, is_active
             FROM channels WHERE is_active = 1 AND interval_minutes = ?1
             ORDER BY channel_name ASC",
        )?;

        let rows = stmt.query_map(params![interval_minutes], map_channel_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Distinct poll cadences among active channels; one cron job is built
    /// per entry at daemon startup.
    pub async fn get_active_intervals(&self) -> Result<Vec<u32>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT DISTINCT interval_minutes FROM channels WHERE is_active = 1
             ORDER BY interval_minutes ASC",
        )?;

        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn remove_channel(&self, channel_id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows_deleted = db.execute(
            "DELETE FROM channels WHERE channel_id = ?1",
            params![channel_id],
        )?;
        Ok(rows_deleted > 0)
    }

    pub async fn set_channel_active(&self, channel_id: &str, active: bool) -> Result<bool> {
        let db = self.db.lock().await;
        let rows_updated = db.execute(
            "UPDATE channels SET is_active = ?1 WHERE channel_id = ?2",
            params![active as i32, channel_id],
        )?;
        Ok(rows_updated > 0)
    }

    pub async fn update_channel_icon(&self, channel_id: &str, icon_url: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows_updated = db.execute(
            "UPDATE channels SET channel_icon_url = ?1 WHERE channel_id = ?2",
            params![icon_url, channel_id],
        )?;
        Ok(rows_updated > 0)
    }
}
