use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub audio_url: String,
    pub image_url: Option<String>,
    pub podcast_id: Option<String>,
    pub podcast_name: Option<String>,
    pub duration: Option<i64>, // Duration in seconds
}

impl Episode {
    pub fn format_duration(&self) -> String {
        match self.duration {
            Some(secs) if secs >= 3600 => {
                format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
            }
            Some(secs) if secs >= 60 => format!("{}m {:02}s", secs / 60, secs % 60),
            Some(secs) => format!("{}s", secs),
            None => "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
    Deleted,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "downloading" => Some(Self::Downloading),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// A record in a non-terminal state still owns the transfer for its
    /// episode; a second download request must collapse into it.
    pub fn is_in_flight(&self) -> bool {
        match self {
            Self::Pending | Self::Downloading => true,
            Self::Completed | Self::Failed | Self::Deleted => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub episode_id: String,
    pub podcast_id: Option<String>,
    pub status: DownloadStatus,
    pub progress_percentage: u8,
    pub file_size: Option<u64>,
    pub error_message: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
}

impl DownloadRecord {
    pub fn new(episode: &Episode) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            episode_id: episode.id.clone(),
            podcast_id: episode.podcast_id.clone(),
            status: DownloadStatus::Pending,
            progress_percentage: 0,
            file_size: None,
            error_message: None,
            started_at: now,
            completed_at: None,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub default_volume: f32,
    pub skip_backward_seconds: i32,
    pub skip_forward_seconds: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            skip_backward_seconds: 15,
            skip_forward_seconds: 15,
        }
    }
}
