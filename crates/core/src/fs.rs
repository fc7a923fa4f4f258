//! Filesystem accessor
//!
//! The sync engine touches the local disk only through [`FileSystem`], so
//! tests can substitute an implementation that injects failures.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::sync::walker::{self, LocalEntry};

/// Lazy sequence of files found below a root
pub type LocalWalk = Box<dyn Iterator<Item = Result<LocalEntry>> + Send>;

/// Local filesystem operations used by the sync engine
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Create a directory and its parents; succeeds if it already exists
    async fn ensure_dir(&self, path: &Path) -> Result<()>;

    /// Read a whole file
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or truncate a file and write `data` into it
    async fn write(&self, path: &Path, data: Vec<u8>) -> Result<()>;

    /// Whether `path` is an existing directory
    async fn is_dir(&self, path: &Path) -> bool;

    /// Enumerate regular files below `root`
    ///
    /// This is blocking; async callers should drive it from a blocking thread.
    fn walk(&self, root: &Path) -> LocalWalk;
}

/// [`FileSystem`] backed by the real disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl FileSystem for LocalFs {
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn write(&self, path: &Path, data: Vec<u8>) -> Result<()> {
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    fn walk(&self, root: &Path) -> LocalWalk {
        Box::new(walker::walk(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a/b/c");

        LocalFs.ensure_dir(&dir).await.unwrap();
        LocalFs.ensure_dir(&dir).await.unwrap();
        assert!(LocalFs.is_dir(&dir).await);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("note.txt");

        LocalFs.write(&file, b"first".to_vec()).await.unwrap();
        LocalFs.write(&file, b"second".to_vec()).await.unwrap();
        assert_eq!(LocalFs.read(&file).await.unwrap(), b"second");
        assert!(!LocalFs.is_dir(&file).await);
    }

    #[tokio::test]
    async fn test_write_without_parent_fails() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("missing/note.txt");
        assert!(LocalFs.write(&file, b"x".to_vec()).await.is_err());
    }

    #[test]
    fn test_walk_through_trait() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("one"), "1").unwrap();

        let entries: Vec<_> = LocalFs.walk(temp.path()).collect::<Result<_>>().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, Path::new("one"));
    }
}
