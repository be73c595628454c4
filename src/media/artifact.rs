//! Temporary on-disk audio files owned by a single pipeline run.
//!
//! A `TemporaryArtifact` deletes its file when dropped, so every exit path of a
//! run (early return, error, panic unwinding) releases it. Live artifacts are
//! also tracked in a shared `ArtifactRegistry` so a process-level shutdown
//! handler can remove files belonging to runs that never got to unwind.

use chrono::Local;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use crate::error::ArtifactError;

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactRole {
    /// The validated bytes as received
    Original,
    /// The encoder output submitted for transcription
    Encoded,
}

impl ArtifactRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Encoded => "encoded",
        }
    }
}

/// Per-run name stem: a millisecond timestamp plus a random suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}",
            Local::now().format("%Y%m%dT%H%M%S%3f"),
            &suffix[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Paths of artifacts that have been created and not yet released.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    live: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, path: &Path) {
        self.entries().insert(path.to_path_buf());
    }

    fn unregister(&self, path: &Path) {
        self.entries().remove(path);
    }

    fn contains(&self, path: &Path) -> bool {
        self.entries().contains(path)
    }

    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    /// Deletes every registered file. Used on shutdown.
    ///
    /// Returns the number of files removed.
    pub fn purge(&self) -> usize {
        let paths: Vec<PathBuf> = self.entries().drain().collect();
        let mut removed = 0;
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove artifact {}: {e}", path.display()),
            }
        }
        if removed > 0 {
            tracing::info!("Purged {removed} in-flight artifact(s)");
        }
        removed
    }
}

/// A file that is removed when this value is dropped.
#[derive(Debug)]
pub struct TemporaryArtifact {
    path: PathBuf,
    role: ArtifactRole,
    registry: ArtifactRegistry,
}

impl TemporaryArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the artifact's current contents.
    ///
    /// # Errors
    /// Returns `ArtifactError::Read` if the file is missing or unreadable.
    pub async fn read(&self) -> Result<Vec<u8>, ArtifactError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| ArtifactError::Read {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for TemporaryArtifact {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed {} artifact {}", self.role.as_str(), self.path.display()),
            // Reserved outputs may never have been written.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove {} artifact {}: {e}",
                self.role.as_str(),
                self.path.display()
            ),
        }
        self.registry.unregister(&self.path);
    }
}

/// Creates uniquely named artifacts inside one temp directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    prefix: String,
    registry: ArtifactRegistry,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, registry: ArtifactRegistry) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            registry,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Creates the temp directory if needed.
    ///
    /// # Errors
    /// Returns `ArtifactError::Directory` if the directory cannot be created.
    pub async fn ensure_dir(&self) -> Result<(), ArtifactError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ArtifactError::Directory {
                path: self.dir.clone(),
                source,
            })
    }

    fn path_for(&self, run: &RunId, role: ArtifactRole, extension: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_{}.{}",
            self.prefix,
            run,
            role.as_str(),
            extension
        ))
    }

    /// Claims a path for a file someone else will write, such as encoder output.
    ///
    /// The returned guard removes the file if it ever appears.
    pub fn reserve(&self, run: &RunId, role: ArtifactRole, extension: &str) -> TemporaryArtifact {
        let path = self.path_for(run, role, extension);
        self.registry.register(&path);
        TemporaryArtifact {
            path,
            role,
            registry: self.registry.clone(),
        }
    }

    /// Writes `bytes` to a new artifact.
    ///
    /// # Errors
    /// Returns `ArtifactError::Write` if the file cannot be written. Any
    /// partially written file is removed before returning.
    pub async fn persist(
        &self,
        run: &RunId,
        role: ArtifactRole,
        extension: &str,
        bytes: &[u8],
    ) -> Result<TemporaryArtifact, ArtifactError> {
        let artifact = self.reserve(run, role, extension);
        tokio::fs::write(artifact.path(), bytes)
            .await
            .map_err(|source| ArtifactError::Write {
                path: artifact.path().to_path_buf(),
                source,
            })?;
        tracing::debug!(
            "Saved {} artifact {} ({} bytes)",
            role.as_str(),
            artifact.path().display(),
            bytes.len()
        );
        Ok(artifact)
    }

    /// Removes leftovers from earlier processes.
    ///
    /// Only files carrying this store's prefix, older than `max_age` and not
    /// owned by a live run are deleted. Returns the number of files removed.
    ///
    /// # Errors
    /// - If the temp directory cannot be read
    pub fn sweep_stale(&self, max_age: Duration) -> io::Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let stem = format!("{}_", self.prefix);
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();

            let matches_prefix = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&stem));
            if !matches_prefix || self.registry.contains(&path) {
                continue;
            }

            let Ok(metadata) = entry.metadata() else { continue };
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    tracing::info!("Removed stale artifact: {}", path.display());
                }
                Err(e) => tracing::warn!("Failed to remove stale artifact {}: {e}", path.display()),
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_artifact_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ArtifactRegistry::new();
        let store = ArtifactStore::new(dir.path(), "test", registry.clone());
        let run = RunId::new();

        let artifact = store
            .persist(&run, ArtifactRole::Original, "ogg", b"OggS")
            .await
            .unwrap();
        assert!(artifact.path().exists());
        assert_eq!(artifact.read().await.unwrap(), b"OggS");
        assert_eq!(registry.live_count(), 1);

        let path = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists());
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn test_reserved_path_without_file_drops_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "test", ArtifactRegistry::new());

        let reserved = store.reserve(&RunId::new(), ArtifactRole::Encoded, "mp3");
        assert!(!reserved.path().exists());
        assert!(reserved.read().await.is_err());
        drop(reserved);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn test_names_include_prefix_run_and_role() {
        let store = ArtifactStore::new("/tmp/vox", "audio-transcribe", ArtifactRegistry::new());
        let run = RunId::new();
        let artifact = store.reserve(&run, ArtifactRole::Encoded, "mp3");
        let name = artifact.path().file_name().unwrap().to_str().unwrap().to_string();

        assert!(name.starts_with("audio-transcribe_"));
        assert!(name.contains(run.as_str()));
        assert!(name.ends_with("_encoded.mp3"));
    }

    #[test]
    fn test_run_ids_are_distinct() {
        let first = RunId::new();
        let second = RunId::new();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_purge_removes_live_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ArtifactRegistry::new();
        let store = ArtifactStore::new(dir.path(), "test", registry.clone());
        let run = RunId::new();

        let original = store
            .persist(&run, ArtifactRole::Original, "ogg", b"a")
            .await
            .unwrap();
        let encoded = store
            .persist(&run, ArtifactRole::Encoded, "mp3", b"b")
            .await
            .unwrap();

        assert_eq!(registry.purge(), 2);
        assert_eq!(file_count(dir.path()), 0);

        // Guards dropping afterwards find nothing to delete.
        drop(original);
        drop(encoded);
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_only_touches_stale_prefixed_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ArtifactRegistry::new();
        let store = ArtifactStore::new(dir.path(), "test", registry.clone());

        fs::write(dir.path().join("test_old_original.ogg"), b"x").unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"y").unwrap();
        let live = store
            .persist(&RunId::new(), ArtifactRole::Original, "ogg", b"z")
            .await
            .unwrap();

        assert_eq!(store.sweep_stale(Duration::ZERO).unwrap(), 1);
        assert!(!dir.path().join("test_old_original.ogg").exists());
        assert!(dir.path().join("unrelated.txt").exists());
        assert!(live.path().exists());

        fs::write(dir.path().join("test_fresh_original.ogg"), b"x").unwrap();
        assert_eq!(store.sweep_stale(Duration::from_secs(3600)).unwrap(), 0);
    }
}
