use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Alternate folders to take a missing file from.
///
/// The list is re-read on every pick so the operator can fix it while the
/// player is waiting.
#[derive(Debug, Clone)]
pub struct RandomList {
    path: PathBuf,
}

impl RandomList {
    pub fn new(path: &Path) -> Self {
        RandomList {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All folders currently listed. Blank lines and `#` comments are skipped.
    pub fn read_folders(&self) -> Result<Vec<PathBuf>> {
        let text = fs::read_to_string(&self.path)?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(PathBuf::from)
            .collect())
    }

    /// Pick one folder at random. `Ok(None)` when the list is empty.
    pub fn pick(&self) -> Result<Option<PathBuf>> {
        let folders = self.read_folders()?;
        if folders.is_empty() {
            return Ok(None);
        }
        let idx = fastrand::usize(..folders.len());
        Ok(folders.into_iter().nth(idx))
    }
}
