use std::path::{Path, PathBuf};
use tracing::warn;

/// Single-line status file overwritten as the scheduled job progresses.
/// Write failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    path: PathBuf,
}

impl Heartbeat {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, status: &str) {
        if let Err(e) = tokio::fs::write(&self.path, status).await {
            warn!("heartbeat write to {} failed: {}", self.path.display(), e);
        }
    }

    /// Last written status, `None` when missing or blank.
    pub async fn read(&self) -> Option<String> {
        let s = tokio::fs::read_to_string(&self.path).await.ok()?;
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    }
}
