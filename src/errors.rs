use std::fmt;
use std::io;

#[derive(Debug, Clone)]
pub enum DatabaseError {
    GenericError(String),
    MigrationError(String),
    NotFound(String),
    LockPoisoned,
}

impl DatabaseError {
    pub fn generic_error(message: impl Into<String>) -> Self {
        Self::GenericError(message.into())
    }

    pub fn migration_error(message: impl Into<String>) -> Self {
        Self::MigrationError(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenericError(msg) => write!(f, "Database error: {}", msg),
            Self::NotFound(entity) => write!(f, "Not found: {}", entity),
            Self::MigrationError(issue) => write!(f, "Migration error: {}", issue),
            Self::LockPoisoned => write!(f, "Database lock poisoned"),
        }
    }
}

impl std::error::Error for DatabaseError {}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::generic_error(err.to_string())
    }
}

/// Failures of the download pipeline. Every variant ends up captured on the
/// episode's record as a `failed` status plus message; none of them crosses
/// the library boundary as a panic.
#[derive(Debug)]
pub enum DownloadError {
    Network(String),
    Io(io::Error),
    Store(DatabaseError),
    InvalidUrl(String),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Store(err) => write!(f, "Record store error: {}", err),
            Self::InvalidUrl(url) => write!(f, "Invalid audio URL: {}", url),
        }
    }
}

impl std::error::Error for DownloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Network(err.to_string())
    }
}

impl From<io::Error> for DownloadError {
    fn from(err: io::Error) -> Self {
        DownloadError::Io(err)
    }
}

impl From<DatabaseError> for DownloadError {
    fn from(err: DatabaseError) -> Self {
        DownloadError::Store(err)
    }
}
