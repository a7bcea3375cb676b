use crate::errors::DatabaseError;
use crate::migrations::versions::Migration;
use rusqlite::Transaction;

pub struct InitialMigration;

impl Migration for InitialMigration {
    fn name(&self) -> &'static str {
        "Initial Migration"
    }

    fn up(&self, transaction: &Transaction) -> Result<(), DatabaseError> {
        // Create Settings Table
        transaction.execute(
            "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
            [],
        )?;

        // Create Downloads Table
        transaction.execute(
            "CREATE TABLE IF NOT EXISTS downloads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                episode_id TEXT NOT NULL UNIQUE,
                podcast_id TEXT,
                status TEXT NOT NULL,
                progress_percentage INTEGER NOT NULL DEFAULT 0,
                file_size INTEGER,
                error_message TEXT,
                started_at INTEGER NOT NULL,
                completed_at INTEGER,
                updated_at INTEGER NOT NULL
        )",
            [],
        )?;

        transaction.execute(
            "CREATE INDEX IF NOT EXISTS idx_downloads_status ON downloads(status)",
            [],
        )?;

        Ok(())
    }

    fn down(&self, transaction: &Transaction) -> Result<(), DatabaseError> {
        transaction.execute("DROP TABLE IF EXISTS downloads", [])?;
        transaction.execute("DROP TABLE IF EXISTS settings", [])?;
        Ok(())
    }
}
