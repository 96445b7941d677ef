use std::path::Path;
use std::path::PathBuf;

use uuid::Uuid;

/// Directory in which planners create per-run artifacts.
///
/// Every allocation is keyed by a fresh v4 uuid so concurrent sessions never
/// collide. The area itself is never removed; only the paths handed out by it
/// end up in cleanup sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchArea {
    root: PathBuf,
}

impl ScratchArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserves a unique stem. Nothing is created on disk.
    pub fn allocate(&self) -> ScratchPath {
        ScratchPath {
            base: self.root.join(Uuid::new_v4().to_string()),
        }
    }
}

impl Default for ScratchArea {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

/// A unique, not-yet-created location inside a [`ScratchArea`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchPath {
    base: PathBuf,
}

impl ScratchPath {
    /// The bare path, used as a binary name or a directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The stem with an extension, e.g. `<root>/<uuid>.py`.
    pub fn with_extension(&self, extension: &str) -> PathBuf {
        self.base.with_extension(extension)
    }
}
