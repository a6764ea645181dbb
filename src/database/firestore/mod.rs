pub mod value;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error};
use url::Url;

use super::{DatabaseError, Document, DocumentStore, FieldFilter, Fields};
use crate::config::FirebaseConfig;
use value::{decode_document, decode_fields, document_id, encode_fields, encode_value};

/// Profile Store backed by the Firestore REST API.
pub struct FirestoreStore {
    client: Client,
    documents_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl FirestoreStore {
    pub fn new(config: &FirebaseConfig, timeout: Duration) -> Result<Self, DatabaseError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DatabaseError::Transport(e.to_string()))?;

        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            config.firestore_base_url.trim_end_matches('/'),
            config.project_id
        );

        // Fail at startup rather than on the first request
        Url::parse(&documents_url).map_err(|e| DatabaseError::Transport(format!("invalid Firestore URL: {}", e)))?;

        Ok(Self {
            client,
            documents_url,
            api_key: config.api_key.clone(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, DatabaseError> {
        let mut url = Url::parse(&self.documents_url)
            .map_err(|e| DatabaseError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| DatabaseError::Transport("Firestore URL cannot be a base".to_string()))?
            .extend(segments);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, DatabaseError> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DatabaseError::Timeout(self.timeout_ms)
            } else {
                error!("Firestore request failed: {}", e);
                DatabaseError::Transport(e.to_string())
            }
        })
    }

    async fn read_json(&self, response: Response) -> Result<Value, DatabaseError> {
        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                DatabaseError::Timeout(self.timeout_ms)
            } else {
                DatabaseError::Codec(e.to_string())
            }
        })
    }

    async fn backend_error(&self, response: Response, what: &str) -> DatabaseError {
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        let message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("unexpected response")
            .to_string();

        match status {
            StatusCode::NOT_FOUND => DatabaseError::NotFound(what.to_string()),
            StatusCode::CONFLICT => DatabaseError::AlreadyExists(what.to_string()),
            _ => {
                error!("Firestore error on {}: {} {}", what, status, message);
                DatabaseError::Backend { status: status.as_u16(), message }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn create_doc(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> Result<String, DatabaseError> {
        let mut url = self.url(&[collection])?;
        if let Some(id) = id {
            url.query_pairs_mut().append_pair("documentId", id);
        }

        let body = json!({ "fields": encode_fields(&fields) });
        let response = self.send(self.client.post(url).json(&body)).await?;
        if !response.status().is_success() {
            let what = format!("{}/{}", collection, id.unwrap_or("<auto>"));
            return Err(self.backend_error(response, &what).await);
        }

        let created = self.read_json(response).await?;
        let name = created
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| DatabaseError::Codec("created document without name".to_string()))?;

        debug!("Firestore created {}", name);
        Ok(document_id(name).to_string())
    }

    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Fields>, DatabaseError> {
        let url = self.url(&[collection, id])?;
        let response = self.send(self.client.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.backend_error(response, &format!("{}/{}", collection, id)).await);
        }

        let document = self.read_json(response).await?;
        match document.get("fields") {
            Some(fields) => Ok(Some(decode_fields(fields)?)),
            None => Ok(Some(Fields::new())),
        }
    }

    async fn update_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<(), DatabaseError> {
        let mut url = self.url(&[collection, id])?;
        {
            let mut query = url.query_pairs_mut();
            for key in fields.keys() {
                query.append_pair("updateMask.fieldPaths", key);
            }
            query.append_pair("currentDocument.exists", "true");
        }

        let body = json!({ "fields": encode_fields(&fields) });
        let response = self.send(self.client.patch(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(self.backend_error(response, &format!("{}/{}", collection, id)).await);
        }
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), DatabaseError> {
        let url = self.url(&[collection, id])?;
        let response = self.send(self.client.delete(url)).await?;
        if !response.status().is_success() {
            return Err(self.backend_error(response, &format!("{}/{}", collection, id)).await);
        }
        Ok(())
    }

    async fn query_docs(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> Result<Vec<Document>, DatabaseError> {
        let mut url = Url::parse(&format!("{}:runQuery", self.documents_url))
            .map_err(|e| DatabaseError::Transport(e.to_string()))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);

        let body = json!({ "structuredQuery": structured_query(collection, filters) });
        let response = self.send(self.client.post(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(self.backend_error(response, collection).await);
        }

        // runQuery streams one entry per result; entries without a document
        // only carry read metadata.
        let entries = self.read_json(response).await?;
        let Value::Array(entries) = entries else {
            return Err(DatabaseError::Codec("runQuery did not return an array".to_string()));
        };

        entries
            .iter()
            .filter_map(|entry| entry.get("document"))
            .map(decode_document)
            .collect()
    }
}

fn structured_query(collection: &str, filters: &[FieldFilter]) -> Value {
    let mut query = json!({ "from": [{ "collectionId": collection }] });

    let field_filters: Vec<Value> = filters
        .iter()
        .map(|filter| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": filter.field },
                    "op": "EQUAL",
                    "value": encode_value(&filter.value)
                }
            })
        })
        .collect();

    match field_filters.len() {
        0 => {}
        1 => query["where"] = field_filters[0].clone(),
        _ => {
            query["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": field_filters }
            })
        }
    }

    query
}
