use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Raw smartctl output for one drive, with the driver hint that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedProbe {
    pub driver: String,
    pub output: String,
}

/// Per-drive files of cached smartctl output.
#[derive(Debug, Clone)]
pub struct SmartCache {
    dir: PathBuf,
}

impl SmartCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<cache dir>/drivemap/smart`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|p| p.join("drivemap").join("smart"))
    }

    fn path(&self, id: &str) -> PathBuf {
        let file: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self, id: &str) -> Option<CachedProbe> {
        let text = fs::read_to_string(self.path(id)).ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Best-effort write; a failed write only costs a re-probe next time.
    pub fn store(&self, id: &str, probe: &CachedProbe) {
        if fs::create_dir_all(&self.dir).is_err() {
            return;
        }
        if let Ok(text) = serde_json::to_string(probe) {
            if let Err(e) = fs::write(self.path(id), text) {
                tracing::debug!("smart cache write for {} failed: {}", id, e);
            }
        }
    }
}
