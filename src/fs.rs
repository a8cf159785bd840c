use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A document opened for the read-modify-write cycle of one run.
/// The exclusive lock is released when the handle is dropped.
pub trait LockedDocument {
    fn read_content(&mut self) -> Result<String>;

    fn replace_content(&mut self, contents: &str) -> Result<()>;
}

/// Abstraction over file system operations for testing
pub trait FileSystem {
    /// Read file contents as a string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write a file so that readers never observe a partial write
    fn atomic_write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Files inside `dir`, sorted by path so runs are deterministic
    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Vec<PathBuf>>;

    /// Open a document with an exclusive lock held until the handle is dropped
    fn open_locked<'a>(&'a self, path: &Path) -> Result<Box<dyn LockedDocument + 'a>>;
}

/// Real file system implementation using std::fs
#[derive(Debug, Default, Clone)]
pub struct RealFileSystem;

struct LockedFile {
    file: std::fs::File,
    path: PathBuf,
}

impl LockedDocument for LockedFile {
    fn read_content(&mut self) -> Result<String> {
        let mut content = String::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(content)
    }

    /// Swap in a fully written copy. The copy is locked before the rename,
    /// so the document never appears unlocked or half written.
    fn replace_content(&mut self, contents: &str) -> Result<()> {
        let temp = write_beside(&self.path, contents)?;
        temp.as_file().try_lock_exclusive().with_context(|| {
            format!("Failed to lock the new copy of {}", self.path.display())
        })?;
        let file = persist(temp, &self.path)?;
        let previous = std::mem::replace(&mut self.file, file);
        let _ = FileExt::unlock(&previous);
        Ok(())
    }
}

/// Temp file next to `path` holding `contents`, with `path`'s permissions
fn write_beside(path: &Path, contents: &str) -> Result<tempfile::NamedTempFile> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    if let Ok(metadata) = std::fs::metadata(path) {
        std::fs::set_permissions(temp.path(), metadata.permissions())?;
    }
    Ok(temp)
}

fn persist(temp: tempfile::NamedTempFile, path: &Path) -> Result<std::fs::File> {
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }

    fn atomic_write(&self, path: &Path, contents: &str) -> Result<()> {
        persist(write_beside(path, contents)?, path)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
            let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn open_locked<'a>(&'a self, path: &Path) -> Result<Box<dyn LockedDocument + 'a>> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            bail!(
                "{} is locked by another process; only one run may write it at a time",
                path.display()
            );
        }
        Ok(Box::new(LockedFile {
            file,
            path: path.to_path_buf(),
        }))
    }
}

/// In-memory file system for testing
pub mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashSet};

    #[derive(Debug, Default)]
    pub struct InMemoryFileSystem {
        files: RefCell<BTreeMap<PathBuf, String>>,
        locked: RefCell<HashSet<PathBuf>>,
    }

    impl InMemoryFileSystem {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a file to the mock file system
        pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<String>) {
            self.files
                .borrow_mut()
                .insert(path.as_ref().to_path_buf(), contents.into());
        }

        /// Current contents of a file (for verification in tests)
        pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
            self.files.borrow().get(path.as_ref()).cloned()
        }
    }

    struct InMemoryLock<'a> {
        fs: &'a InMemoryFileSystem,
        path: PathBuf,
    }

    impl LockedDocument for InMemoryLock<'_> {
        fn read_content(&mut self) -> Result<String> {
            self.fs.read_to_string(&self.path)
        }

        fn replace_content(&mut self, contents: &str) -> Result<()> {
            self.fs.atomic_write(&self.path, contents)
        }
    }

    impl Drop for InMemoryLock<'_> {
        fn drop(&mut self) {
            self.fs.locked.borrow_mut().remove(&self.path);
        }
    }

    impl FileSystem for InMemoryFileSystem {
        fn read_to_string(&self, path: &Path) -> Result<String> {
            self.files
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("File not found: {}", path.display()))
        }

        fn atomic_write(&self, path: &Path, contents: &str) -> Result<()> {
            self.files
                .borrow_mut()
                .insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.is_file(path) || self.is_dir(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files.borrow().contains_key(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.files
                .borrow()
                .keys()
                .any(|p| p.starts_with(path) && p != path)
        }

        fn list_files(&self, dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
            let files = self.files.borrow();
            let entries = files
                .keys()
                .filter(|p| {
                    if recursive {
                        p.starts_with(dir) && *p != dir
                    } else {
                        p.parent() == Some(dir)
                    }
                })
                .cloned()
                .collect();
            Ok(entries)
        }

        fn open_locked<'a>(&'a self, path: &Path) -> Result<Box<dyn LockedDocument + 'a>> {
            if !self.is_file(path) {
                bail!("File not found: {}", path.display());
            }
            if !self.locked.borrow_mut().insert(path.to_path_buf()) {
                bail!("{} is already locked", path.display());
            }
            Ok(Box::new(InMemoryLock {
                fs: self,
                path: path.to_path_buf(),
            }))
        }
    }
}
