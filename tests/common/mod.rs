// Common test utilities shared across acceptance tests
//
// Each test works inside its own TempDir so tests can run in parallel
// without sharing any filesystem state.

use scriptkit::AbsoluteEntry;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An isolated directory tree for cleanup tests
pub struct TestTree {
    temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestTree {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    pub fn create_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn create_dir(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn file(&self, relative: &str) -> AbsoluteEntry {
        AbsoluteEntry::file(self.path(relative))
    }

    pub fn dir(&self, relative: &str) -> AbsoluteEntry {
        AbsoluteEntry::directory(self.path(relative))
    }

    pub fn symlink(&self, relative: &str) -> AbsoluteEntry {
        AbsoluteEntry::symlink(self.path(relative))
    }

    /// Whether the path itself exists, without following symlinks
    pub fn exists(&self, relative: &str) -> bool {
        fs::symlink_metadata(self.path(relative)).is_ok()
    }

    pub fn assert_exists(&self, relative: &str) {
        assert!(self.exists(relative), "Path should exist: {}", relative);
    }

    pub fn assert_missing(&self, relative: &str) {
        assert!(!self.exists(relative), "Path should not exist: {}", relative);
    }
}
