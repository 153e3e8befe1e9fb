//! In-memory [`FileSystem`] with controllable modification times

use crate::fs::{FileStat, FileSystem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct MemoryFile {
    data: Vec<u8>,
    modified_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<PathBuf, MemoryFile>,
    dirs: HashSet<PathBuf>,
    fail_listing: bool,
}

/// Filesystem held entirely in memory
///
/// Useful for exercising freshness and eviction without waiting on the wall
/// clock: modification times can be rewritten with [`MemoryFileSystem::set_modified`].
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    state: Mutex<MemoryState>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the modification time of an existing file
    pub fn set_modified(&self, path: &Path, modified_at: DateTime<Utc>) -> bool {
        match self.state().files.get_mut(path) {
            Some(file) => {
                file.modified_at = modified_at;
                true
            }
            None => false,
        }
    }

    /// Place a file directly, creating its parent directories
    pub fn insert_file(&self, path: &Path, data: Vec<u8>, modified_at: DateTime<Utc>) {
        let mut state = self.state();
        if let Some(parent) = path.parent() {
            add_dir_with_ancestors(&mut state.dirs, parent);
        }
        state
            .files
            .insert(path.to_path_buf(), MemoryFile { data, modified_at });
    }

    /// Make every subsequent `read_dir` fail
    pub fn fail_listing(&self, fail: bool) {
        self.state().fail_listing = fail;
    }

    pub fn file_count(&self) -> usize {
        self.state().files.len()
    }
}

fn add_dir_with_ancestors(dirs: &mut HashSet<PathBuf>, path: &Path) {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        dirs.insert(ancestor.to_path_buf());
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        let state = self.state();
        Ok(state.files.contains_key(path) || state.dirs.contains(path))
    }

    async fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        Ok(self.state().files.get(path).map(|file| FileStat {
            size_bytes: file.data.len() as u64,
            modified_at: file.modified_at,
        }))
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let state = self.state();
        if state.fail_listing {
            return Err(io::Error::other("listing disabled"));
        }
        if !state.dirs.contains(path) {
            return Err(not_found(path));
        }
        Ok(state
            .files
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .collect())
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.state()
            .files
            .get(path)
            .map(|file| file.data.clone())
            .ok_or_else(|| not_found(path))
    }

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !state.dirs.contains(parent) {
                return Err(not_found(parent));
            }
        }
        state.files.insert(
            path.to_path_buf(),
            MemoryFile {
                data: data.to_vec(),
                modified_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state();
        let file = state.files.remove(from).ok_or_else(|| not_found(from))?;
        state.files.insert(to.to_path_buf(), file);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> io::Result<()> {
        self.state().files.remove(path);
        Ok(())
    }

    async fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        add_dir_with_ancestors(&mut self.state().dirs, path);
        Ok(())
    }
}
