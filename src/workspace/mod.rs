//! The work area: a root directory with one subdirectory per pipeline stage.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const VIDEOS_DIR: &str = "videos";
pub const AUDIOS_DIR: &str = "audios";
pub const TRIMMED_DIR: &str = "trimmed";
pub const OUTPUT_DIR: &str = "output";

/// Root directory plus the four fixed stage subdirectories
#[derive(Debug, Clone)]
pub struct WorkArea {
    root: PathBuf,
}

impl WorkArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root and every stage directory, tolerating existing ones
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let area = Self::new(root);
        for dir in [area.videos(), area.audios(), area.trimmed(), area.output()] {
            fs_err::create_dir_all(&dir)
                .with_context(|| format!("Failed to create work directory {}", dir.display()))?;
        }
        tracing::debug!("Work area ready at {}", area.root.display());
        Ok(area)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acquired items
    pub fn videos(&self) -> PathBuf {
        self.root.join(VIDEOS_DIR)
    }

    /// Extracted audio tracks
    pub fn audios(&self) -> PathBuf {
        self.root.join(AUDIOS_DIR)
    }

    /// Trimmed audio tracks
    pub fn trimmed(&self) -> PathBuf {
        self.root.join(TRIMMED_DIR)
    }

    /// Composed output and archive
    pub fn output(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }
}

/// Whether a directory holds at least one entry
pub fn is_populated(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    let mut entries = fs_err::read_dir(dir)?;
    Ok(entries.next().is_some())
}

/// Regular files in a directory, sorted by file name
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Regular files whose extension matches `ext` case-insensitively, sorted by file name
pub fn list_files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    Ok(list_files(dir)?
        .into_iter()
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect())
}

/// Remove everything inside a directory, keeping the directory itself
pub fn clear_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs_err::create_dir_all(dir)?;
        return Ok(());
    }
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs_err::remove_dir_all(&path)?;
        } else {
            fs_err::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let area = WorkArea::create(dir.path().join("work")).unwrap();
        WorkArea::create(dir.path().join("work")).unwrap();

        for sub in [area.videos(), area.audios(), area.trimmed(), area.output()] {
            assert!(sub.is_dir());
            assert!(!is_populated(&sub).unwrap());
        }
    }

    #[test]
    fn test_list_files_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.mp3", "C.mp3", "notes.txt"] {
            fs_err::write(dir.path().join(name), b"x").unwrap();
        }
        fs_err::create_dir(dir.path().join("nested.mp3")).unwrap();

        let names: Vec<String> = list_files_with_extension(dir.path(), "mp3")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        // Byte order puts upper case first
        assert_eq!(names, vec!["C.mp3", "a.mp3", "b.mp3"]);
    }

    #[test]
    fn test_clear_dir_keeps_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("one"), b"1").unwrap();
        fs_err::create_dir(dir.path().join("sub")).unwrap();
        clear_dir(dir.path()).unwrap();
        assert!(dir.path().is_dir());
        assert!(!is_populated(dir.path()).unwrap());
    }
}
