//! Write-once document directory.
//!
//! Each record becomes `<record_id>.<ext>`. Documents are written through a
//! temporary file in the same directory and moved into place with
//! no-clobber semantics, so a reader never sees a partial file and an
//! existing document is never replaced.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobMatcher};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A document found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub record_id: String,
    pub file_name: String,
}

/// Result of [`DocumentStore::write_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// A document for this id already existed and was left untouched.
    AlreadyExists,
}

pub struct DocumentStore {
    dir: PathBuf,
    extension: String,
    adopt: GlobMatcher,
}

impl DocumentStore {
    /// Open the directory, creating it if necessary.
    ///
    /// `adopt_glob` selects which existing files count as synced documents
    /// when scanning (e.g. `rec*.md`).
    pub fn open(dir: impl Into<PathBuf>, extension: &str, adopt_glob: &str) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory: {}", dir.display()))?;
        let adopt = Glob::new(adopt_glob)
            .with_context(|| format!("Invalid adopt glob: '{}'", adopt_glob))?
            .compile_matcher();

        Ok(Self {
            dir,
            extension: extension.to_string(),
            adopt,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self, record_id: &str) -> String {
        format!("{}.{}", record_id, self.extension)
    }

    pub fn file_exists(&self, file_name: &str) -> bool {
        self.dir.join(file_name).is_file()
    }

    /// List documents whose file name matches the adopt glob.
    pub fn scan(&self) -> Result<Vec<StoredDocument>> {
        let suffix = format!(".{}", self.extension);
        let mut docs = Vec::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !self.adopt.is_match(&file_name) {
                continue;
            }
            if let Some(record_id) = file_name.strip_suffix(&suffix) {
                if !record_id.is_empty() {
                    docs.push(StoredDocument {
                        record_id: record_id.to_string(),
                        file_name: file_name.clone(),
                    });
                }
            }
        }

        docs.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        Ok(docs)
    }

    /// Check that `record_id` maps to a usable file name in this store.
    pub fn check_record_id(&self, record_id: &str) -> Result<()> {
        validate_record_id(record_id)?;
        let name = self.file_name(record_id);
        if name.len() > MAX_FILE_NAME_BYTES {
            bail!(
                "record id '{}' gives a file name of {} bytes (limit {})",
                record_id,
                name.len(),
                MAX_FILE_NAME_BYTES
            );
        }
        Ok(())
    }

    /// Atomically create the document for `record_id`, never overwriting.
    pub fn write_new(&self, record_id: &str, content: &str) -> Result<WriteOutcome> {
        self.check_record_id(record_id)?;
        let target = self.dir.join(self.file_name(record_id));
        if target.exists() {
            return Ok(WriteOutcome::AlreadyExists);
        }

        let mut tmp = tempfile::Builder::new()
            .prefix(".bsync-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {}", self.dir.display()))?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;

        match tmp.persist_noclobber(&target) {
            Ok(_) => Ok(WriteOutcome::Written),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(WriteOutcome::AlreadyExists),
            Err(e) => Err(e.error)
                .with_context(|| format!("Failed to write document: {}", target.display())),
        }
    }
}

/// Longest file name common filesystems accept.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Record ids become file names, so they must not escape the directory.
pub fn validate_record_id(record_id: &str) -> Result<()> {
    if record_id.is_empty()
        || record_id.starts_with('.')
        || record_id.contains(['/', '\\', '\0'])
        || record_id.len() > MAX_FILE_NAME_BYTES
    {
        bail!("record id '{}' is not usable as a file name", record_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> DocumentStore {
        DocumentStore::open(tmp.path().join("memory"), "md", "rec*.md").unwrap()
    }

    #[test]
    fn test_open_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        assert!(s.dir().is_dir());
    }

    #[test]
    fn test_write_new_then_existing() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        assert_eq!(s.write_new("rec1", "first").unwrap(), WriteOutcome::Written);
        assert_eq!(
            s.write_new("rec1", "second").unwrap(),
            WriteOutcome::AlreadyExists
        );
        let content = std::fs::read_to_string(s.dir().join("rec1.md")).unwrap();
        assert_eq!(content, "first");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        s.write_new("rec1", "a").unwrap();
        s.write_new("rec1", "b").unwrap();
        let names: Vec<String> = std::fs::read_dir(s.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["rec1.md".to_string()]);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        assert!(s.write_new("../escape", "x").is_err());
        assert!(s.write_new("a/b", "x").is_err());
        assert!(s.write_new(".hidden", "x").is_err());
    }

    #[test]
    fn test_rejects_overlong_file_names() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        // 252 bytes plus ".md" is exactly the limit.
        let fits = format!("rec{}", "a".repeat(249));
        assert!(s.check_record_id(&fits).is_ok());
        let too_long = format!("rec{}", "a".repeat(250));
        assert!(validate_record_id(&too_long).is_ok());
        assert!(s.check_record_id(&too_long).is_err());
        assert!(s.write_new(&too_long, "x").is_err());
        assert!(validate_record_id(&"r".repeat(300)).is_err());
        assert!(s.scan().unwrap().is_empty());
    }

    #[test]
    fn test_scan_matches_glob_only() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        std::fs::write(s.dir().join("rec2.md"), "").unwrap();
        std::fs::write(s.dir().join("rec1.md"), "").unwrap();
        std::fs::write(s.dir().join("MEMORY.md"), "").unwrap();
        std::fs::write(s.dir().join("rec3.txt"), "").unwrap();
        std::fs::create_dir(s.dir().join("rec4.md")).unwrap();

        let ids: Vec<String> = s.scan().unwrap().into_iter().map(|d| d.record_id).collect();
        assert_eq!(ids, vec!["rec1".to_string(), "rec2".to_string()]);
    }
}
