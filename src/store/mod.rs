//! Document store
//!
//! Collections of JSON documents addressed by id. `put` always overwrites
//! the whole document. The store is an explicit handle passed to whoever
//! reads or writes rows.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde_json::{Map, Value};
use thiserror::Error;

/// Body of one stored document
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid document id: {0:?}")]
    InvalidId(String),

    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),

    #[error("corrupt document {id}: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// All documents of a collection, in store order
    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Fields>>;

    /// Creates or fully replaces a document
    async fn put(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Removes a document; returns whether it existed
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Removes every document of a collection; returns how many were removed
    async fn delete_all(&self, collection: &str) -> StoreResult<usize>;
}

impl<T: DocumentStore> DocumentStore for &T {
    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        (**self).list(collection).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Fields>> {
        (**self).get(collection, id).await
    }

    async fn put(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        (**self).put(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        (**self).delete(collection, id).await
    }

    async fn delete_all(&self, collection: &str) -> StoreResult<usize> {
        (**self).delete_all(collection).await
    }
}

/// Ids and collection names double as file names in [`FileStore`]
pub(crate) fn check_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key() {
        assert!(check_key("PM3601__25Kg_"));
        assert!(check_key("technicianInfo"));
        assert!(!check_key(""));
        assert!(!check_key(".."));
        assert!(!check_key("a/b"));
        assert!(!check_key("a\\b"));
    }
}
