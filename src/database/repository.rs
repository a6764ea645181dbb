use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{DatabaseError, DocumentStore, FieldFilter, Fields};

/// A stored document decoded into its model, together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub id: String,
    pub data: T,
}

/// Typed access to one collection of the document store.
pub struct Repository<T> {
    collection: &'static str,
    store: Arc<dyn DocumentStore>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection,
            store: Arc::clone(&self.store),
            _phantom: PhantomData,
        }
    }
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(collection: &'static str, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            collection,
            store,
            _phantom: PhantomData,
        }
    }

    pub async fn insert(&self, id: Option<&str>, data: &T) -> Result<String, DatabaseError> {
        self.store.create_doc(self.collection, id, to_fields(data)?).await
    }

    pub async fn select_one(&self, id: &str) -> Result<Option<Record<T>>, DatabaseError> {
        match self.store.get_doc(self.collection, id).await? {
            Some(fields) => Ok(Some(Record {
                id: id.to_string(),
                data: from_fields(fields)?,
            })),
            None => Ok(None),
        }
    }

    pub async fn select_any(&self, filters: &[FieldFilter]) -> Result<Vec<Record<T>>, DatabaseError> {
        self.store
            .query_docs(self.collection, filters)
            .await?
            .into_iter()
            .map(|doc| {
                Ok(Record {
                    id: doc.id,
                    data: from_fields(doc.fields)?,
                })
            })
            .collect()
    }

    /// Write every field of `data` over the stored document.
    pub async fn save(&self, id: &str, data: &T) -> Result<(), DatabaseError> {
        self.store.update_doc(self.collection, id, to_fields(data)?).await
    }

    pub async fn patch(&self, id: &str, fields: Fields) -> Result<(), DatabaseError> {
        self.store.update_doc(self.collection, id, fields).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), DatabaseError> {
        self.store.delete_doc(self.collection, id).await
    }
}

fn to_fields<T: Serialize>(data: &T) -> Result<Fields, DatabaseError> {
    match serde_json::to_value(data)? {
        Value::Object(fields) => Ok(fields),
        other => Err(DatabaseError::Codec(format!("model did not serialize to an object: {}", other))),
    }
}

fn from_fields<T: DeserializeOwned>(fields: Fields) -> Result<T, DatabaseError> {
    Ok(serde_json::from_value(Value::Object(fields))?)
}
