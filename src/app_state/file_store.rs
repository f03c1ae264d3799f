/// In-memory file store, independent of terminal sessions
use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileStoreError {
    #[error("file does not exist: {0}")]
    NotFound(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
}

/// Filename to content map behind a read/write lock.
#[derive(Debug, Clone)]
pub struct FileStore {
    files: Arc<RwLock<BTreeMap<String, String>>>,
}

impl FileStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Store with the two starter files the editor expects.
    pub fn seeded() -> Self {
        let mut files = BTreeMap::new();
        files.insert("main.py".to_string(), "print('Hello, world!')".to_string());
        files.insert("test.py".to_string(), "print('Test file')".to_string());
        Self {
            files: Arc::new(RwLock::new(files)),
        }
    }

    pub async fn list(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }

    pub async fn read(&self, name: &str) -> Result<String, FileStoreError> {
        self.files
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| FileStoreError::NotFound(name.to_string()))
    }

    pub async fn create(&self, name: &str, content: String) -> Result<(), FileStoreError> {
        let mut files = self.files.write().await;
        if files.contains_key(name) {
            return Err(FileStoreError::AlreadyExists(name.to_string()));
        }
        files.insert(name.to_string(), content);
        Ok(())
    }

    pub async fn update(&self, name: &str, content: String) -> Result<(), FileStoreError> {
        let mut files = self.files.write().await;
        let entry = files
            .get_mut(name)
            .ok_or_else(|| FileStoreError::NotFound(name.to_string()))?;
        *entry = content;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), FileStoreError> {
        self.files
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| FileStoreError::NotFound(name.to_string()))
    }

    /// Moves content from `from` to `to`. Both checks happen under one write lock.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), FileStoreError> {
        let mut files = self.files.write().await;
        if !files.contains_key(from) {
            return Err(FileStoreError::NotFound(from.to_string()));
        }
        if files.contains_key(to) {
            return Err(FileStoreError::AlreadyExists(to.to_string()));
        }
        if let Some(content) = files.remove(from) {
            files.insert(to.to_string(), content);
        }
        Ok(())
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_files() {
        let store = FileStore::seeded();
        assert_eq!(store.list().await, vec!["main.py", "test.py"]);
        assert_eq!(store.read("main.py").await.unwrap(), "print('Hello, world!')");
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let store = FileStore::new();
        store.create("a.txt", String::new()).await.unwrap();
        assert_eq!(
            store.create("a.txt", "x".into()).await,
            Err(FileStoreError::AlreadyExists("a.txt".into()))
        );
        store.update("a.txt", "hello".into()).await.unwrap();
        assert_eq!(store.read("a.txt").await.unwrap(), "hello");
        assert_eq!(
            store.update("b.txt", "x".into()).await,
            Err(FileStoreError::NotFound("b.txt".into()))
        );
        store.delete("a.txt").await.unwrap();
        assert!(store.delete("a.txt").await.is_err());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_rename_conflicts() {
        let store = FileStore::seeded();
        assert_eq!(
            store.rename("missing.py", "x.py").await,
            Err(FileStoreError::NotFound("missing.py".into()))
        );
        assert_eq!(
            store.rename("main.py", "test.py").await,
            Err(FileStoreError::AlreadyExists("test.py".into()))
        );
        store.rename("main.py", "app.py").await.unwrap();
        assert_eq!(store.read("app.py").await.unwrap(), "print('Hello, world!')");
        assert!(store.read("main.py").await.is_err());
    }
}
