use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Answers existence questions about paths relative to a project root.
pub trait FileProbe: Send + Sync {
    /// Returns true if the relative path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem
#[derive(Debug, Clone)]
pub struct FsProbe {
    root: PathBuf,
}

impl FsProbe {
    /// Creates a probe rooted at `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Project root this probe resolves against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).exists()
    }
}

/// In-memory probe for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryProbe {
    paths: HashSet<PathBuf>,
}

impl MemoryProbe {
    /// Creates an empty probe where nothing exists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a path as existing.
    #[must_use]
    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.insert(path);
        self
    }

    /// Marks a path as existing in place.
    pub fn insert<P: Into<PathBuf>>(&mut self, path: P) {
        self.paths.insert(path.into());
    }
}

impl FileProbe for MemoryProbe {
    fn exists(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}
