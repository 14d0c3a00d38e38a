//! First-seen incident snapshots on the local filesystem.
//!
//! Layout: `<base>/<assignee>/<key>.json`, pretty-printed. A snapshot is
//! written once and never overwritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use relay_core::traits::SnapshotWriter;
use relay_core::{Incident, SyncError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::SnapshotError;

const UNASSIGNED: &str = "Unassigned";
const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '?', '*', '<', '>', '|', '"'];

/// Replace characters that are unsafe in a path component with `_`.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" => String::new(),
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}

#[derive(Debug, Clone)]
pub struct FileSnapshotWriter {
    base: PathBuf,
}

impl FileSnapshotWriter {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn assignee_dir(&self, assignee: &str) -> PathBuf {
        let name = sanitize_component(assignee);
        let name = if name.is_empty() { UNASSIGNED.to_string() } else { name };
        self.base.join(name)
    }

    pub fn path_for(&self, assignee: &str, key: &str) -> PathBuf {
        self.assignee_dir(assignee)
            .join(format!("{}.json", sanitize_component(key)))
    }

    pub async fn contains(&self, assignee: &str, key: &str) -> bool {
        tokio::fs::try_exists(self.path_for(assignee, key))
            .await
            .unwrap_or(false)
    }

    /// Write the snapshot unless one already exists. Returns whether a new
    /// file was created.
    pub async fn write_new(&self, incident: &Incident) -> Result<bool, SnapshotError> {
        let path = self.path_for(&incident.assignee, &incident.key);
        let io_err = |source| SnapshotError::Io {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }

        let json = serde_json::to_vec_pretty(incident).map_err(|source| SnapshotError::Json {
            path: path.clone(),
            source,
        })?;

        let file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "snapshot already exists");
                return Ok(false);
            }
            Err(e) => return Err(io_err(e)),
        };
        write_or_discard(&path, file, &json).await.map_err(io_err)?;

        debug!(path = %path.display(), "snapshot written");
        Ok(true)
    }

    pub async fn load(&self, assignee: &str, key: &str) -> Result<Option<Incident>, SnapshotError> {
        let path = self.path_for(assignee, key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| SnapshotError::Json { path, source }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SnapshotError::Io { path, source }),
        }
    }

    /// Every readable snapshot under the base directory. Unparsable files
    /// are skipped with a warning.
    pub async fn list_all(&self) -> Result<Vec<Incident>, SnapshotError> {
        let mut incidents = Vec::new();
        let mut dirs = match tokio::fs::read_dir(&self.base).await {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(incidents),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.base.clone(),
                    source,
                })
            }
        };

        let io_err = |path: &Path, source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        };

        while let Some(dir) = dirs.next_entry().await.map_err(|e| io_err(&self.base, e))? {
            let dir_path = dir.path();
            if !dir_path.is_dir() {
                continue;
            }
            let mut files = tokio::fs::read_dir(&dir_path)
                .await
                .map_err(|e| io_err(&dir_path, e))?;
            while let Some(file) = files.next_entry().await.map_err(|e| io_err(&dir_path, e))? {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let bytes = tokio::fs::read(&path).await.map_err(|e| io_err(&path, e))?;
                match serde_json::from_slice::<Incident>(&bytes) {
                    Ok(incident) => incidents.push(incident),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable snapshot"),
                }
            }
        }

        incidents.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(incidents)
    }
}

/// Write `bytes` to a freshly created file, removing the file when the
/// write fails so a truncated snapshot never counts as existing.
async fn write_or_discard<W>(path: &Path, mut writer: W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match writer.write_all(bytes).await {
        Ok(()) => writer.flush().await,
        Err(e) => Err(e),
    };
    drop(writer);

    if let Err(e) = written {
        if let Err(rm) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %rm, "failed to remove partial snapshot");
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl SnapshotWriter for FileSnapshotWriter {
    async fn exists(&self, incident: &Incident) -> bool {
        self.contains(&incident.assignee, &incident.key).await
    }

    async fn save(&self, incident: &Incident) -> Result<(), SyncError> {
        self.write_new(incident).await?;
        Ok(())
    }
}
