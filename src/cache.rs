use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const CACHE_CAPACITY: usize = 120;

/// Identifiers of already handled entries, oldest first. Only the most recent
/// `CACHE_CAPACITY` survive a write.
pub struct RotatingCache {
    path: PathBuf,
    items: Vec<String>,
    dirty: bool,
}

impl RotatingCache {
    pub fn load(path: &Path) -> Result<Self> {
        let items = if path.exists() {
            let raw = fs::read(path)
                .with_context(|| format!("failed to read cache file {}", path.display()))?;
            serde_json::from_slice::<Vec<String>>(&raw).with_context(|| {
                format!(
                    "cache file {} is corrupt, remove it to start over",
                    path.display()
                )
            })?
        } else {
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            items,
            dirty: false,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item == id)
    }

    /// Appends without checking for duplicates; callers test `contains` first.
    pub fn add(&mut self, id: impl Into<String>) {
        self.items.push(id.into());
        self.dirty = true;
    }

    #[cfg(test)]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Writes the tail of the cache if anything was added since the last
    /// flush. Returns whether the file was written.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }

        let start = self.items.len().saturating_sub(CACHE_CAPACITY);
        let payload = serde_json::to_vec(&self.items[start..])?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create cache directory {}", parent.display())
            })?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        fs::write(&tmp, payload)
            .with_context(|| format!("failed to write cache file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace cache file {}", self.path.display()))?;

        self.dirty = false;
        Ok(true)
    }
}
