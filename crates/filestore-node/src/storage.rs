//! Flat file folder owned by a store node.
//!
//! One regular file per stored object, named by the protocol name
//! verbatim. The folder is reset on startup: the controller's index does
//! not survive restarts, so neither should the node's contents.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io;

/// Handle to the node's storage directory. Cheap to clone; every
/// connection handler gets its own copy.
#[derive(Debug, Clone)]
pub struct FileFolder {
    root: PathBuf,
}

impl FileFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Fresh-start semantics: create the folder if missing, otherwise
    /// delete every regular file in it. Subdirectories are left alone.
    pub async fn reset(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await?;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }

    /// Persist one object's bytes, replacing any previous content.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.path_of(name), bytes).await
    }

    /// Open an object for streaming. `NotFound` when the node does not
    /// hold the file.
    pub async fn open(&self, name: &str) -> io::Result<fs::File> {
        fs::File::open(self.path_of(name)).await
    }

    /// Names of every regular file in the folder, in no particular
    /// order.
    pub async fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Ok(name) = entry.file_name().into_string() {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    /// Delete one object. Returns `false` when the file was not there.
    pub async fn remove(&self, name: &str) -> io::Result<bool> {
        match fs::remove_file(self.path_of(name)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder() -> (FileFolder, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (FileFolder::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn reset_creates_a_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = FileFolder::new(dir.path().join("files"));
        folder.reset().await.unwrap();
        assert!(folder.root().is_dir());
        assert!(folder.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_deletes_leftover_files() {
        let (folder, _dir) = folder();
        folder.write("stale-1", b"x").await.unwrap();
        folder.write("stale-2", b"y").await.unwrap();

        folder.reset().await.unwrap();
        assert!(folder.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_then_list_then_remove() {
        let (folder, _dir) = folder();
        folder.write("a.txt", b"hello").await.unwrap();
        folder.write("b.txt", b"world").await.unwrap();

        let mut names = folder.list().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        assert!(folder.remove("a.txt").await.unwrap());
        assert!(!folder.remove("a.txt").await.unwrap());
        assert_eq!(folder.list().await.unwrap(), vec!["b.txt"]);
    }

    #[tokio::test]
    async fn open_missing_file_is_not_found() {
        let (folder, _dir) = folder();
        let err = folder.open("ghost").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn write_replaces_previous_content() {
        let (folder, _dir) = folder();
        folder.write("f", b"first").await.unwrap();
        folder.write("f", b"second").await.unwrap();

        let content = fs::read(folder.root().join("f")).await.unwrap();
        assert_eq!(content, b"second");
    }
}
