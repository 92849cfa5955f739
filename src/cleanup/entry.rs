/// Filesystem entries handed to the cleanup engine
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What a path was when it was listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

impl EntryKind {
    /// Map the three predicates of a directory-entry descriptor
    ///
    /// A symlink wins over whatever it resolves to. Returns `None` for
    /// entries that are none of the three (sockets, FIFOs, devices).
    pub fn from_predicates(is_file: bool, is_dir: bool, is_symlink: bool) -> Option<Self> {
        if is_symlink {
            Some(EntryKind::Symlink)
        } else if is_dir {
            Some(EntryKind::Directory)
        } else if is_file {
            Some(EntryKind::File)
        } else {
            None
        }
    }

    pub fn from_file_type(file_type: fs::FileType) -> Option<Self> {
        Self::from_predicates(
            file_type.is_file(),
            file_type.is_dir(),
            file_type.is_symlink(),
        )
    }
}

/// An absolute path and its kind
///
/// Construction does not check the path; the cleanup engine rejects a
/// relative one with `CleanupError::RelativePath` before deleting anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbsoluteEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl AbsoluteEntry {
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, EntryKind::File)
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, EntryKind::Directory)
    }

    pub fn symlink(path: impl Into<PathBuf>) -> Self {
        Self::new(path, EntryKind::Symlink)
    }

    /// Classify an existing path without following symlinks
    ///
    /// Returns `Ok(None)` for special files the engine does not delete.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Option<Self>> {
        let path = path.as_ref();
        let metadata = fs::symlink_metadata(path)?;
        Ok(EntryKind::from_file_type(metadata.file_type()).map(|kind| Self::new(path, kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_predicates() {
        assert_eq!(
            EntryKind::from_predicates(true, false, false),
            Some(EntryKind::File)
        );
        assert_eq!(
            EntryKind::from_predicates(false, true, false),
            Some(EntryKind::Directory)
        );
        assert_eq!(
            EntryKind::from_predicates(false, false, true),
            Some(EntryKind::Symlink)
        );
        assert_eq!(EntryKind::from_predicates(false, false, false), None);
    }

    #[test]
    fn test_from_path() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        let dir = temp.path().join("dir");
        fs::write(&file, "x").unwrap();
        fs::create_dir(&dir).unwrap();

        assert_eq!(
            AbsoluteEntry::from_path(&file).unwrap(),
            Some(AbsoluteEntry::file(&file))
        );
        assert_eq!(
            AbsoluteEntry::from_path(&dir).unwrap(),
            Some(AbsoluteEntry::directory(&dir))
        );
        assert!(AbsoluteEntry::from_path(temp.path().join("missing")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_directory_is_symlink() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dir");
        let link = temp.path().join("link");
        fs::create_dir(&dir).unwrap();
        std::os::unix::fs::symlink(&dir, &link).unwrap();

        let entry = AbsoluteEntry::from_path(&link).unwrap().unwrap();
        assert_eq!(entry.kind, EntryKind::Symlink);
    }
}
