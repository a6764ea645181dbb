use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{DatabaseError, Document, DocumentStore, FieldFilter, Fields};

type Collection = BTreeMap<String, Fields>;

/// Process-local document store used for development and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_doc(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, DatabaseError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let id = match id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };

        if docs.contains_key(&id) {
            return Err(DatabaseError::AlreadyExists(format!("{}/{}", collection, id)));
        }

        docs.insert(id.clone(), fields);
        debug!("memory store: created {}/{}", collection, id);
        Ok(id)
    }

    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Fields>, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn update_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<(), DatabaseError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| DatabaseError::NotFound(format!("{}/{}", collection, id)))?;

        for (key, value) in fields {
            doc.insert(key, value);
        }
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), DatabaseError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query_docs(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, DatabaseError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, fields)| {
                filters
                    .iter()
                    .all(|filter| fields.get(&filter.field) == Some(&filter.value))
            })
            .map(|(id, fields)| Document { id: id.clone(), fields: fields.clone() })
            .collect())
    }
}
