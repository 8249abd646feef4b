mod channels;
mod reminder;
pub mod types;
mod video;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handle to the SQLite database. Cheap to clone; all clones share one
/// connection behind an async mutex.
#[derive(Clone)]
pub struct Database {
    db: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)?;
        Self::create_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    fn create_schema(db: &Connection) -> Result<()> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS video_data (
                video_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                published TEXT NOT NULL,
                updated TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                status TEXT NOT NULL,
                scheduled_start_time TEXT,
                actual_start_time TEXT,
                actual_end_time TEXT,
                duration TEXT
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS reminder (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                video_id TEXT NOT NULL,
                message_content TEXT NOT NULL,
                reminder_time TEXT NOT NULL,
                scheduled INTEGER NOT NULL DEFAULT 0,
                executed INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS channels (
                channel_id TEXT PRIMARY KEY,
                channel_name TEXT NOT NULL,
                channel_icon_url TEXT NOT NULL DEFAULT '',
                discord_webhook_url TEXT NOT NULL,
                interval_minutes INTEGER NOT NULL DEFAULT 10,
                is_active INTEGER NOT NULL DEFAULT 1
            )",
            [],
        )?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_video_data_status ON video_data(status)",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_reminder_pending ON reminder(scheduled, executed, reminder_time)",
            [],
        )?;

        Ok(())
    }
}

/// Create an in-memory Database for testing. Avoids filesystem side-effects.
#[cfg(test)]
pub fn test_database() -> Database {
    let db = Connection::open_in_memory().expect("in-memory db");
    Database::create_schema(&db).expect("create schema");
    Database {
        db: Arc::new(Mutex::new(db)),
    }
}
