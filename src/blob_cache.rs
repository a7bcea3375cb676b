use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Keyed binary store for downloaded episode audio. Lives on the local
/// filesystem with a lifecycle independent of the download records: clearing
/// it never touches the record store, so a `completed` record may point at a
/// blob that no longer exists and callers must treat that as "unavailable".
#[derive(Clone)]
pub struct BlobCache {
    cache_dir: PathBuf,
}

impl BlobCache {
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .map(|dir| dir.join("astrocast").join("audio"))
            .unwrap_or_else(|| PathBuf::from("./cache/audio"));
        Self::at(cache_dir)
    }

    pub fn at(cache_dir: PathBuf) -> Self {
        std::fs::create_dir_all(&cache_dir).ok();
        Self { cache_dir }
    }

    fn blob_path(&self, episode_id: &str) -> PathBuf {
        let key = format!("{:x}", md5::compute(episode_id.as_bytes()));
        self.cache_dir.join(format!("episode_{}.bin", key))
    }

    pub fn put(&self, episode_id: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.blob_path(episode_id);
        let mut file = File::create(&path)?;
        file.write_all(bytes)?;
        Ok(path)
    }

    /// Some only when the blob is actually present on disk.
    pub fn path(&self, episode_id: &str) -> Option<PathBuf> {
        let path = self.blob_path(episode_id);
        if path.exists() { Some(path) } else { None }
    }

    pub fn contains(&self, episode_id: &str) -> bool {
        self.blob_path(episode_id).exists()
    }

    /// Removing a blob that is already gone counts as removed.
    pub fn remove(&self, episode_id: &str) -> std::io::Result<()> {
        let path = self.blob_path(episode_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn clear(&self) -> std::io::Result<()> {
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

impl Default for BlobCache {
    fn default() -> Self {
        Self::new()
    }
}
