pub mod audio_output;
pub mod blob_cache;
pub mod database;
pub mod downloads;
pub mod errors;
pub mod migrations;
pub mod playback;
pub mod types;

pub use audio_output::AudioOutput;
pub use blob_cache::BlobCache;
pub use database::Database;
pub use downloads::{DownloadPipeline, ProgressObserver, ProgressUpdate, StartOutcome};
pub use errors::{DatabaseError, DownloadError};
pub use playback::PlaybackController;
pub use types::{DownloadRecord, DownloadStatus, Episode, Settings};
