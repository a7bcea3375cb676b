use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::blob_cache::BlobCache;
use crate::database::Database;
use crate::errors::{DatabaseError, DownloadError};
use crate::types::{DownloadRecord, DownloadStatus, Episode};

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub episode_id: String,
    pub percent: u8,
}

pub type ProgressObserver = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// How a `start_download` request resolved. A request that collapses into an
/// existing cycle is a successful no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Completed,
    AlreadyInFlight,
    AlreadyDownloaded,
}

/// Per-episode download lifecycle: `pending → downloading → completed|failed`,
/// `completed → deleted`. Fetches the remote audio once, reports progress to
/// in-memory observers and the persisted record, and lands the assembled
/// bytes in the blob cache keyed by episode id.
///
/// Downloads for different episodes may run concurrently; requests for the
/// same episode are single-flight.
pub struct DownloadPipeline {
    database: Database,
    cache: BlobCache,
    client: reqwest::Client,
    records: Arc<Mutex<HashMap<String, DownloadRecord>>>,
    observers: Arc<Mutex<Vec<ProgressObserver>>>,
}

impl DownloadPipeline {
    /// Loads the persisted records into the in-memory mirror. Records left
    /// `pending`/`downloading` by a process that died mid-stream are swept to
    /// `failed` here; without the sweep the single-flight guard would wedge
    /// those episodes forever.
    pub fn new(database: Database, cache: BlobCache) -> Result<Self, DatabaseError> {
        let mut records = HashMap::new();

        for mut record in database.get_downloads()? {
            if record.status.is_in_flight() {
                let message = "interrupted before completion";
                database.update_download_status(
                    &record.episode_id,
                    DownloadStatus::Failed,
                    Some(message),
                )?;
                record.status = DownloadStatus::Failed;
                record.error_message = Some(message.to_string());
                log::warn!(
                    "download for episode {} was interrupted by shutdown, marked failed",
                    record.episode_id
                );
            }
            records.insert(record.episode_id.clone(), record);
        }

        Ok(Self {
            database,
            cache,
            client: reqwest::Client::new(),
            records: Arc::new(Mutex::new(records)),
            observers: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Registers an observer invoked on every progress percentage change.
    pub fn subscribe(&self, observer: ProgressObserver) {
        self.observers.lock().unwrap().push(observer);
    }

    /// Fetches `episode.audio_url` into the blob cache, driving the record
    /// through its lifecycle. Runs the transfer to completion; callers wanting
    /// parallel downloads of different episodes spawn this per episode.
    pub async fn start_download(&self, episode: &Episode) -> Result<StartOutcome, DownloadError> {
        // Guard and pending-insert happen under one lock with no await point
        // in between, so two interleaved requests cannot both pass.
        {
            let mut records = self.records.lock().unwrap();
            if let Some(existing) = records.get(&episode.id) {
                match existing.status {
                    DownloadStatus::Completed => {
                        log::debug!("episode {} already downloaded", episode.id);
                        return Ok(StartOutcome::AlreadyDownloaded);
                    }
                    DownloadStatus::Pending | DownloadStatus::Downloading => {
                        log::debug!("episode {} already has a transfer in flight", episode.id);
                        return Ok(StartOutcome::AlreadyInFlight);
                    }
                    // Failed and deleted records start a fresh cycle.
                    DownloadStatus::Failed | DownloadStatus::Deleted => {}
                }
            }

            let record = DownloadRecord::new(episode);
            self.database.insert_download(&record)?;
            records.insert(episode.id.clone(), record);
        }

        match self.transfer(episode).await {
            Ok(file_size) => {
                let now = chrono::Utc::now().timestamp();
                let mut records = self.records.lock().unwrap();
                if let Some(record) = records.get_mut(&episode.id) {
                    record.status = DownloadStatus::Completed;
                    record.progress_percentage = 100;
                    record.file_size = Some(file_size);
                    record.error_message = None;
                    record.completed_at = Some(now);
                    record.updated_at = now;
                }
                log::info!("episode {} downloaded ({} bytes)", episode.id, file_size);
                Ok(StartOutcome::Completed)
            }
            Err(err) => {
                let message = err.to_string();
                log::error!("download for episode {} failed: {}", episode.id, message);
                self.set_status(&episode.id, DownloadStatus::Failed, Some(&message));
                Err(err)
            }
        }
    }

    async fn transfer(&self, episode: &Episode) -> Result<u64, DownloadError> {
        url::Url::parse(&episode.audio_url)
            .map_err(|_| DownloadError::InvalidUrl(episode.audio_url.clone()))?;

        self.set_status(&episode.id, DownloadStatus::Downloading, None);

        let response = self.client.get(&episode.audio_url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Network(format!(
                "audio source answered {}",
                response.status()
            )));
        }

        let total_bytes = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(DownloadError::from));

        let bytes = accumulate_stream(stream, total_bytes, |percent| {
            self.publish_progress(&episode.id, percent)
        })
        .await?;

        // Assemble-then-single-write: the whole episode is held in memory and
        // landed in one put, so a completed record always references a blob
        // that was fully written.
        self.cache.put(&episode.id, &bytes)?;

        let file_size = bytes.len() as u64;
        self.database.mark_download_completed(&episode.id, file_size)?;

        Ok(file_size)
    }

    fn publish_progress(&self, episode_id: &str, percent: u8) {
        {
            let mut records = self.records.lock().unwrap();
            if let Some(record) = records.get_mut(episode_id) {
                record.progress_percentage = percent;
            }
        }

        // Persisted at the percentage-change rate, not per chunk. A store
        // hiccup here only costs resumable progress display, not the transfer.
        if let Err(err) = self.database.update_download_progress(episode_id, percent) {
            log::warn!("could not persist progress for {}: {}", episode_id, err);
        }

        let observers: Vec<ProgressObserver> = self.observers.lock().unwrap().clone();
        let update = ProgressUpdate {
            episode_id: episode_id.to_string(),
            percent,
        };
        for observer in observers {
            observer(update.clone());
        }
    }

    fn set_status(&self, episode_id: &str, status: DownloadStatus, error_message: Option<&str>) {
        if let Err(err) = self
            .database
            .update_download_status(episode_id, status, error_message)
        {
            log::warn!("could not persist status for {}: {}", episode_id, err);
        }

        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(episode_id) {
            record.status = status;
            record.error_message = error_message.map(str::to_string);
        }
    }

    /// Marks the record deleted and purges the blob. The record row is kept
    /// for audit; a blob that is already gone counts as purged.
    pub fn delete_download(&self, episode_id: &str) -> Result<(), DownloadError> {
        let known = self.records.lock().unwrap().contains_key(episode_id);
        if known {
            self.set_status(episode_id, DownloadStatus::Deleted, None);
        }
        self.cache.remove(episode_id)?;
        Ok(())
    }

    /// Some iff the blob actually exists locally, regardless of what the
    /// record claims. A `completed` record whose blob was evicted (cleared
    /// cache dir) answers None here; callers fall back to streaming.
    pub fn local_episode_path(&self, episode_id: &str) -> Option<PathBuf> {
        self.cache.path(episode_id)
    }

    /// True iff the record's status is exactly `completed`. Answers from the
    /// record alone and may disagree with `local_episode_path` when the blob
    /// has been evicted.
    pub fn is_episode_downloaded(&self, episode_id: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .get(episode_id)
            .map(|record| record.status == DownloadStatus::Completed)
            .unwrap_or(false)
    }

    pub fn record(&self, episode_id: &str) -> Option<DownloadRecord> {
        self.records.lock().unwrap().get(episode_id).cloned()
    }

    pub fn records(&self) -> Vec<DownloadRecord> {
        let mut records: Vec<DownloadRecord> =
            self.records.lock().unwrap().values().cloned().collect();
        records.sort_by_key(|record| record.started_at);
        records
    }
}

/// Drains a chunk stream into memory, reporting integer progress after each
/// chunk when the total size is known. Progress is only reported when the
/// floored percentage actually moves; with an unknown total it stays silent
/// until the caller marks completion.
pub(crate) async fn accumulate_stream<S>(
    mut stream: S,
    total_bytes: Option<u64>,
    mut on_progress: impl FnMut(u8),
) -> Result<Vec<u8>, DownloadError>
where
    S: Stream<Item = Result<Bytes, DownloadError>> + Unpin,
{
    let mut buffer: Vec<u8> = match total_bytes {
        Some(total) => Vec::with_capacity(total as usize),
        None => Vec::new(),
    };
    let mut last_percent: Option<u8> = None;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.extend_from_slice(&chunk);

        if let Some(total) = total_bytes {
            if total > 0 {
                let percent = ((buffer.len() as u64).saturating_mul(100) / total).min(100) as u8;
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    on_progress(percent);
                }
            }
        }
    }

    Ok(buffer)
}
