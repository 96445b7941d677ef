use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::warn;

/// Filesystem paths created while planning a run.
///
/// The set is handed to the session that requested the plan and is removed
/// exactly by that session. Removal never fails: missing paths are skipped
/// and other errors are logged.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupSet {
    paths: Vec<PathBuf>,
}

impl CleanupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Removes every path in the set. Safe to call repeatedly.
    pub fn remove_all(&self) {
        for path in &self.paths {
            remove_path(path);
        }
    }
}

impl FromIterator<PathBuf> for CleanupSet {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        let mut set = Self::new();
        for path in iter {
            set.push(path);
        }
        set
    }
}

fn remove_path(path: &Path) {
    // symlink_metadata so a link to a directory is unlinked, not followed.
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to stat cleanup path");
            return;
        }
    };

    let result = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => debug!(path = %path.display(), "removed scratch artifact"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove scratch artifact"),
    }
}
