// ============================================
// File: crates/s3l-app/src/storage.rs
// ============================================
//! # Per-User File Storage
//!
//! ## Creation Reason
//! Every file operation a client can trigger goes through this module, so
//! the name check and the confinement to the user's base directory live
//! in exactly one place.
//!
//! ## Name Rules
//! A valid name is 1 to 20 characters: a word character (ASCII letter,
//! digit or `_`) followed by up to 19 word characters or `.`, `-`, `+`.
//! Slashes never pass, so a valid name cannot leave the base directory.
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, Result};

/// Longest accepted file name, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Returns `true` if `name` is an acceptable file name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !is_word_char(first) {
        return false;
    }
    let mut len = 1;
    for c in chars {
        len += 1;
        if len > MAX_NAME_LEN || !(is_word_char(c) || matches!(c, '.' | '-' | '+')) {
            return false;
        }
    }
    true
}

const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A user's storage directory.
#[derive(Debug, Clone)]
pub struct UserStorage {
    base: PathBuf,
}

impl UserStorage {
    /// Wraps `base`; the directory is not touched until an operation runs.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    #[must_use]
    /// Directory every name resolves inside.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Maps a client-supplied name to a path inside the base directory.
    ///
    /// # Errors
    /// Returns `Rejected` if the name fails [`is_valid_name`].
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_name(name) {
            return Err(AppError::rejected("path not valid"));
        }
        Ok(self.base.join(name))
    }

    /// Creates `name` or truncates it to zero length.
    ///
    /// # Errors
    /// `Rejected` for a bad name, `Io` if the file cannot be created.
    pub fn create_empty(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        File::create(&path).map_err(|e| AppError::io(format!("creating {}", path.display()), e))?;
        Ok(())
    }

    /// Writes `bytes` at `offset` into an existing file.
    ///
    /// # Errors
    /// `Rejected` for a bad name, `Io` if the file is missing or the write
    /// fails.
    pub fn write_at(&self, name: &str, offset: u64, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(name)?;
        let context = || format!("writing {}", path.display());
        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| AppError::io(context(), e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| AppError::io(context(), e))?;
        file.write_all(bytes).map_err(|e| AppError::io(context(), e))?;
        debug!(file = %name, offset, len = bytes.len(), "Chunk stored");
        Ok(())
    }

    /// Opens `name` for reading, returning the file and its size.
    ///
    /// # Errors
    /// `Rejected` for a bad name or a missing file.
    pub fn open(&self, name: &str) -> Result<(File, u64)> {
        let path = self.resolve(name)?;
        let file = File::open(&path).map_err(|_| AppError::rejected("file not found"))?;
        let meta = file
            .metadata()
            .map_err(|e| AppError::io(format!("inspecting {}", path.display()), e))?;
        if !meta.is_file() {
            return Err(AppError::rejected("file not found"));
        }
        Ok((file, meta.len()))
    }

    /// `true` if `name` is valid and names an existing regular file.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Names of the regular files in the base directory, sorted.
    ///
    /// # Errors
    /// `Io` if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        let context = || format!("listing {}", self.base.display());
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base).map_err(|e| AppError::io(context(), e))? {
            let entry = entry.map_err(|e| AppError::io(context(), e))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Renames `old` to `new`.
    ///
    /// # Errors
    /// `Rejected` for a bad name or if the rename fails.
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let (from, to) = match (self.resolve(old), self.resolve(new)) {
            (Ok(from), Ok(to)) => (from, to),
            _ => return Err(AppError::rejected("invalid path")),
        };
        fs::rename(from, to).map_err(|_| AppError::rejected("can't rename file"))
    }

    /// Deletes `name`.
    ///
    /// # Errors
    /// `Rejected` for a bad name or if removal fails.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        fs::remove_file(path).map_err(|_| AppError::rejected("can't delete file"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["a", "report.pdf", "_x", "a-b+c.d", "9lives", "abcdefghijklmnopqrst"] {
            assert!(is_valid_name(name), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "",
            ".hidden",
            "-dash",
            "../etc",
            "a/b",
            "a b",
            "abcdefghijklmnopqrstu",
            "caf\u{e9}",
            "a\\b",
        ] {
            assert!(!is_valid_name(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_write_at_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UserStorage::new(dir.path());
        storage.create_empty("f.bin").unwrap();
        storage.write_at("f.bin", 4, b"5678").unwrap();
        storage.write_at("f.bin", 0, b"1234").unwrap();

        let (mut file, size) = storage.open("f.bin").unwrap();
        assert_eq!(size, 8);
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "12345678");
    }

    #[test]
    fn test_create_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UserStorage::new(dir.path());
        fs::write(dir.path().join("old.txt"), b"previous content").unwrap();
        storage.create_empty("old.txt").unwrap();
        assert_eq!(storage.open("old.txt").unwrap().1, 0);
    }

    #[test]
    fn test_write_to_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UserStorage::new(dir.path());
        assert!(matches!(
            storage.write_at("nope", 0, b"x"),
            Err(AppError::Io { .. })
        ));
    }

    #[test]
    fn test_list_rename_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UserStorage::new(dir.path());
        storage.create_empty("b").unwrap();
        storage.create_empty("a").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        assert_eq!(storage.list().unwrap(), vec!["a", "b"]);

        storage.rename("a", "c").unwrap();
        assert_eq!(storage.list().unwrap(), vec!["b", "c"]);

        storage.remove("b").unwrap();
        assert_eq!(storage.list().unwrap(), vec!["c"]);
        assert!(!storage.exists("b"));
    }

    #[test]
    fn test_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UserStorage::new(dir.path());
        assert!(storage.resolve("../x").unwrap_err().is_recoverable());
        assert!(matches!(storage.open("ghost"), Err(AppError::Rejected { .. })));
        assert!(matches!(storage.rename("ghost", "other"), Err(AppError::Rejected { .. })));
        assert!(matches!(storage.rename("ok", "bad/"), Err(AppError::Rejected { .. })));
        assert!(matches!(storage.remove("ghost"), Err(AppError::Rejected { .. })));
    }
}
