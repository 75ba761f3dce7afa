//! On-disk reconciler state for crash recovery.
//!
//! The file holds a single JSON document:
//!
//! ```json
//! { "is_live": true, "stream": { "id": "...", "notification_message_id": "..." } }
//! ```
//!
//! It is rewritten after every tick so a restart during a stream keeps
//! editing the same notification instead of posting a duplicate.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::Result;
use crate::monitor::ReconcilerState;

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved state.
    ///
    /// A missing file means there is nothing to recover. A file that cannot
    /// be read or parsed is ignored with a warning.
    pub async fn load(&self) -> Option<ReconcilerState> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved state");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read saved state");
                return None;
            }
        };

        match serde_json::from_slice::<ReconcilerState>(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable saved state");
                None
            }
        }
    }

    /// Atomically replace the saved state.
    pub async fn save(&self, state: &ReconcilerState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
