pub mod firestore;
pub mod memory;
pub mod models;
pub mod repository;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use repository::{Record, Repository};

/// Collection holding one profile per registered account, keyed by uid.
pub const USERS: &str = "users";
/// Collection holding schedules, keyed by store-assigned ids.
pub const SCHEDULES: &str = "schedules";

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// A document as returned by collection queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Equality filter used by [`DocumentStore::query_docs`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), value: value.into() }
    }
}

/// Errors from the Profile Store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Document store timed out after {0} ms")]
    Timeout(u64),

    #[error("Document store request failed: {0}")]
    Transport(String),

    #[error("Document store returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Document encoding error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Codec(err.to_string())
    }
}

/// Managed document database holding the `users` and `schedules` collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document. With `id` the document is created under that key and
    /// fails with `AlreadyExists` if taken; without, the store assigns one.
    async fn create_doc(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, DatabaseError>;

    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Fields>, DatabaseError>;

    /// Merge `fields` into an existing document; `NotFound` if it is absent.
    async fn update_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<(), DatabaseError>;

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), DatabaseError>;

    /// All documents whose fields equal every filter. No filters lists the collection.
    async fn query_docs(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, DatabaseError>;
}
