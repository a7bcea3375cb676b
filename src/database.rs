use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row, params};

use crate::{
    errors::DatabaseError,
    migrations::run_migrations,
    types::{DownloadRecord, DownloadStatus, Settings},
};

#[derive(Clone)]
pub struct Database {
    pub(crate) connection: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let connection = Connection::open(path)?;
        Self::init(connection)
    }

    /// In-memory store, used by tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let connection = Connection::open_in_memory()?;
        Self::init(connection)
    }

    fn init(mut connection: Connection) -> Result<Self, DatabaseError> {
        connection.execute("PRAGMA foreign_keys = ON", [])?;
        run_migrations(&mut connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<DownloadRecord> {
        let status: String = row.get(2)?;
        let progress: i64 = row.get(3)?;
        Ok(DownloadRecord {
            episode_id: row.get(0)?,
            podcast_id: row.get(1)?,
            status: DownloadStatus::parse(&status).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    Box::new(DatabaseError::generic_error(format!(
                        "unknown download status '{}'",
                        status
                    ))),
                )
            })?,
            progress_percentage: progress.clamp(0, 100) as u8,
            file_size: row.get::<_, Option<i64>>(4)?.map(|size| size as u64),
            error_message: row.get(5)?,
            started_at: row.get(6)?,
            completed_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    const RECORD_COLUMNS: &'static str = "episode_id, podcast_id, status, progress_percentage, \
         file_size, error_message, started_at, completed_at, updated_at";

    pub fn get_downloads(&self) -> Result<Vec<DownloadRecord>, DatabaseError> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM downloads ORDER BY started_at",
            Self::RECORD_COLUMNS
        ))?;

        let records: Vec<DownloadRecord> = stmt
            .query_map([], Self::row_to_record)?
            .filter_map(Result::ok)
            .collect();

        Ok(records)
    }

    pub fn get_download(&self, episode_id: &str) -> Result<Option<DownloadRecord>, DatabaseError> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM downloads WHERE episode_id = ?",
            Self::RECORD_COLUMNS
        ))?;

        let mut rows = stmt.query_map([episode_id], Self::row_to_record)?;
        match rows.next() {
            Some(record) => Ok(Some(record?)),
            None => Ok(None),
        }
    }

    /// Starts a fresh download cycle for the episode. A leftover terminal row
    /// (failed or deleted) is rewritten in place; the episode id stays unique.
    pub fn insert_download(&self, record: &DownloadRecord) -> Result<(), DatabaseError> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?;

        conn.execute(
            "INSERT OR REPLACE INTO downloads
             (episode_id, podcast_id, status, progress_percentage, file_size,
              error_message, started_at, completed_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.episode_id,
                record.podcast_id,
                record.status.as_str(),
                record.progress_percentage as i64,
                record.file_size.map(|size| size as i64),
                record.error_message,
                record.started_at,
                record.completed_at,
                record.updated_at,
            ],
        )?;

        Ok(())
    }

    pub fn update_download_status(
        &self,
        episode_id: &str,
        status: DownloadStatus,
        error_message: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?;

        let now = chrono::Utc::now().timestamp();
        let changed = conn.execute(
            "UPDATE downloads SET status = ?, error_message = ?, updated_at = ? WHERE episode_id = ?",
            params![status.as_str(), error_message, now, episode_id],
        )?;

        if changed == 0 {
            return Err(DatabaseError::not_found(format!(
                "download record for episode {}",
                episode_id
            )));
        }

        Ok(())
    }

    pub fn update_download_progress(
        &self,
        episode_id: &str,
        progress_percentage: u8,
    ) -> Result<(), DatabaseError> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "UPDATE downloads SET progress_percentage = ?, updated_at = ? WHERE episode_id = ?",
            params![progress_percentage.min(100) as i64, now, episode_id],
        )?;

        Ok(())
    }

    pub fn mark_download_completed(
        &self,
        episode_id: &str,
        file_size: u64,
    ) -> Result<(), DatabaseError> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "UPDATE downloads
             SET status = ?, progress_percentage = 100, file_size = ?,
                 error_message = NULL, completed_at = ?, updated_at = ?
             WHERE episode_id = ?",
            params![
                DownloadStatus::Completed.as_str(),
                file_size as i64,
                now,
                now,
                episode_id,
            ],
        )?;

        Ok(())
    }

    pub fn get_settings(&self) -> Result<Settings, DatabaseError> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?;

        let mut settings = Settings::default();

        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let settings_iter = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for setting in settings_iter.flatten() {
            match setting.0.as_str() {
                "default_volume" => settings.default_volume = setting.1.parse().unwrap_or(0.5),
                "skip_backward_seconds" => {
                    settings.skip_backward_seconds = setting.1.parse().unwrap_or(15)
                }
                "skip_forward_seconds" => {
                    settings.skip_forward_seconds = setting.1.parse().unwrap_or(15)
                }
                _ => {}
            }
        }

        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), DatabaseError> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)?;

        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('default_volume', ?)",
            [settings.default_volume.to_string()],
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('skip_backward_seconds', ?)",
            [settings.skip_backward_seconds.to_string()],
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('skip_forward_seconds', ?)",
            [settings.skip_forward_seconds.to_string()],
        )?;

        Ok(())
    }
}
