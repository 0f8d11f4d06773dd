//! Seed asset loading. Asset contents are opaque to the storage layer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fs, io};
use tracing::debug;

/// Source of seed payloads, addressed by file name (e.g. `symptoms_2.6.json`).
pub trait SeedAssets: Send + Sync {
    fn load(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Assets read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssets {
    dir: PathBuf,
}

impl DirAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SeedAssets for DirAssets {
    fn load(&self, name: &str) -> io::Result<Vec<u8>> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("asset name must be a plain file name: {name:?}"),
            ));
        }
        let path = self.dir.join(name);
        debug!(path = %path.display(), "loading seed asset");
        fs::read(&path)
    }
}

/// Assets held in memory; used by embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), contents.into());
    }
}

impl SeedAssets for MemoryAssets {
    fn load(&self, name: &str) -> io::Result<Vec<u8>> {
        self.entries.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no asset named {name:?}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_assets_refuse_path_traversal() {
        let assets = DirAssets::new(std::env::temp_dir());
        for name in ["../etc/passwd", "a/b.json", ".hidden", ""] {
            let err = assets.load(name).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{name}");
        }
    }

    #[test]
    fn memory_assets_report_missing_entries() {
        let assets = MemoryAssets::new().with("symptoms_2.6.json", "[]");
        assert_eq!(assets.load("symptoms_2.6.json").unwrap(), b"[]");
        assert_eq!(
            assets.load("rules_2.6.json").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}
