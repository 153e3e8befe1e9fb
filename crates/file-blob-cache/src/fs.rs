//! Filesystem capability consumed by the cache
//!
//! The store never calls `tokio::fs` directly so that platforms with their
//! own file APIs (and tests) can substitute an implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;
use tokio::fs;

/// Size and modification time of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// `None` when no file exists at `path`
    async fn stat(&self, path: &Path) -> io::Result<Option<FileStat>>;

    /// Names of the plain files directly inside `path`
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Atomically replace `to` with `from`
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file. A missing file is not an error.
    async fn delete_file(&self, path: &Path) -> io::Result<()>;

    async fn ensure_dir(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    async fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(Some(FileStat {
                size_bytes: meta.len(),
                modified_at: DateTime::<Utc>::from(meta.modified()?),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path).await
    }

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        fs::write(path, data).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to).await
    }

    async fn delete_file(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_delete_missing_file_is_ok() {
        let dir = tempdir().unwrap();
        let fs = TokioFileSystem;

        let result = fs.delete_file(&dir.path().join("never-written.jpg")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_stat_reports_size_and_mtime() {
        let dir = tempdir().unwrap();
        let fs = TokioFileSystem;
        let path = dir.path().join("a.jpg");

        assert!(fs.stat(&path).await.unwrap().is_none());
        fs.write_bytes(&path, b"0123456789").await.unwrap();

        let stat = fs.stat(&path).await.unwrap().unwrap();
        assert_eq!(stat.size_bytes, 10);
        let age = Utc::now() - stat.modified_at;
        assert!(age.num_seconds() < 60);
    }

    #[tokio::test]
    async fn test_read_dir_lists_only_files() {
        let dir = tempdir().unwrap();
        let fs = TokioFileSystem;
        fs.ensure_dir(&dir.path().join("nested")).await.unwrap();
        fs.write_bytes(&dir.path().join("a.jpg"), b"a").await.unwrap();
        fs.write_bytes(&dir.path().join("b.jpg"), b"b").await.unwrap();

        let mut names = fs.read_dir(dir.path()).await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.jpg".to_string(), "b.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_rename_replaces_target() {
        let dir = tempdir().unwrap();
        let fs = TokioFileSystem;
        let target = dir.path().join("a.jpg");
        let temp = dir.path().join(".a.jpg.tmp");
        fs.write_bytes(&target, b"old").await.unwrap();
        fs.write_bytes(&temp, b"new").await.unwrap();

        fs.rename(&temp, &target).await.unwrap();

        assert_eq!(fs.read(&target).await.unwrap(), b"new");
        assert!(!fs.exists(&temp).await.unwrap());
    }
}
