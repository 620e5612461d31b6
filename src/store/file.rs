//! File-backed store
//!
//! `<root>/<collection>/<id>.json`, one pretty-printed JSON object per
//! document. Listing walks the collection directory and sorts by file name.

use super::{check_key, Document, DocumentStore, Fields, StoreError, StoreResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DOCUMENT_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> StoreResult<PathBuf> {
        if !check_key(collection) {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }
        Ok(self.root.join(collection))
    }

    fn document_path(&self, collection: &str, id: &str) -> StoreResult<PathBuf> {
        if !check_key(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self
            .collection_dir(collection)?
            .join(format!("{}.{}", id, DOCUMENT_EXTENSION)))
    }

    fn document_paths(dir: &Path) -> Vec<(String, PathBuf)> {
        let mut paths: Vec<(String, PathBuf)> = WalkDir::new(dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let path = e.path();
                if path.extension().and_then(|x| x.to_str()) != Some(DOCUMENT_EXTENSION) {
                    return None;
                }
                let id = path.file_stem()?.to_string_lossy().to_string();
                Some((id, path.to_path_buf()))
            })
            .collect();

        paths.sort_by(|a, b| a.0.cmp(&b.0));
        paths
    }
}

async fn read_fields(id: &str, path: &Path) -> StoreResult<Fields> {
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
        id: id.to_string(),
        source,
    })
}

impl DocumentStore for FileStore {
    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let dir = self.collection_dir(collection)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for (id, path) in Self::document_paths(&dir) {
            let fields = read_fields(&id, &path).await?;
            documents.push(Document { id, fields });
        }
        Ok(documents)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Fields>> {
        let path = self.document_path(collection, id)?;
        if !path.exists() {
            return Ok(None);
        }
        read_fields(id, &path).await.map(Some)
    }

    async fn put(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        let path = self.document_path(collection, id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&fields).map_err(|source| StoreError::Corrupt {
            id: id.to_string(),
            source,
        })?;

        // write-then-rename so a crash never leaves half a document
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let path = self.document_path(collection, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self, collection: &str) -> StoreResult<usize> {
        let dir = self.collection_dir(collection)?;
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for (_, path) in Self::document_paths(&dir) {
            tokio::fs::remove_file(&path).await?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_writes_json_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = FileStore::new(dir.path());

        let fields = json!({"Opening Stock (Kg)": 100}).as_object().cloned().unwrap();
        store.put("condenserChemicals1", "PM3601__25Kg_", fields).await.unwrap();

        let path = dir.path().join("condenserChemicals1").join("PM3601__25Kg_.json");
        assert!(path.exists());
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("\"Opening Stock (Kg)\": 100"));
    }

    #[tokio::test]
    async fn test_list_sorted_and_ignores_other_files() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = FileStore::new(dir.path());

        store.put("cw", "b", Fields::new()).await.unwrap();
        store.put("cw", "a", Fields::new()).await.unwrap();
        std::fs::write(dir.path().join("cw").join("readme.txt"), "x").unwrap();

        let ids: Vec<String> = store.list("cw").await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = FileStore::new(dir.path());

        assert!(store.list("nothing").await.unwrap().is_empty());
        assert!(store.get("nothing", "x").await.unwrap().is_none());
        assert_eq!(store.delete_all("nothing").await.unwrap(), 0);
        assert!(!store.delete("nothing", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_document() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = FileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("cw")).unwrap();
        std::fs::write(dir.path().join("cw").join("Sunday.json"), "{ invalid json }").unwrap();

        let err = store.get("cw", "Sunday").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = FileStore::new(dir.path());

        let err = store.put("cw", "../escape", Fields::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(_)));
        let err = store.list("..").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidCollection(_)));
    }
}
