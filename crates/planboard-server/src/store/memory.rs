use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::document::{strip_system_fields, validate_queries};
use super::{
    Collection, Document, DocumentStore, FilePreview, FileStore, Query, StoreError, StoredFile,
    Upload,
};

/// Document store kept in process memory. Used when no database is
/// configured and by the test suite.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, HashMap<Uuid, Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, HashMap::len)
    }
}

fn drop_nulls(data: Map<String, Value>) -> Map<String, Value> {
    data.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_documents(
        &self,
        collection: Collection,
        queries: &[Query],
    ) -> Result<Vec<Document>, StoreError> {
        validate_queries(queries)?;

        let collections = self.collections.read().await;
        let mut documents: Vec<Document> = collections
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| queries.iter().all(|q| q.matches(doc)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let order = queries.iter().find_map(|q| match q {
            Query::OrderAsc(field) => Some((field.as_str(), false)),
            Query::OrderDesc(field) => Some((field.as_str(), true)),
            _ => None,
        });
        let (field, descending) = order.unwrap_or(("created_at", false));
        documents.sort_by(|a, b| {
            let ordering = a.compare_by(b, field);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        Ok(documents)
    }

    async fn get_document(&self, collection: Collection, id: Uuid) -> Result<Document, StoreError> {
        self.collections
            .read()
            .await
            .get(&collection)
            .and_then(|docs| docs.get(&id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection.as_str(), id))
    }

    async fn create_document(
        &self,
        collection: Collection,
        id: Uuid,
        data: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                kind: collection.as_str().to_string(),
                id,
            });
        }

        let now = Utc::now();
        let doc = Document {
            id,
            created_at: now,
            updated_at: now,
            data: drop_nulls(strip_system_fields(data)),
        };
        docs.insert(id, doc.clone());
        Ok(doc)
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(&id))
            .ok_or_else(|| StoreError::not_found(collection.as_str(), id))?;

        for (key, value) in strip_system_fields(patch) {
            if value.is_null() {
                doc.data.remove(&key);
            } else {
                doc.data.insert(key, value);
            }
        }
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn delete_document(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .get_mut(&collection)
            .and_then(|docs| docs.remove(&id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(collection.as_str(), id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<(String, Uuid), (StoredFile, Vec<u8>)>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.files.read().await.len()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn create_file(
        &self,
        bucket: &str,
        id: Uuid,
        upload: Upload,
    ) -> Result<StoredFile, StoreError> {
        let mut files = self.files.write().await;
        let key = (bucket.to_string(), id);
        if files.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: format!("file in bucket {}", bucket),
                id,
            });
        }

        let stored = StoredFile {
            id,
            bucket: bucket.to_string(),
            name: upload.file_name,
            content_type: upload.content_type,
            size: upload.bytes.len(),
            created_at: Utc::now(),
        };
        files.insert(key, (stored.clone(), upload.bytes));
        Ok(stored)
    }

    async fn get_file_preview(&self, bucket: &str, id: Uuid) -> Result<FilePreview, StoreError> {
        self.files
            .read()
            .await
            .get(&(bucket.to_string(), id))
            .map(|(stored, bytes)| FilePreview {
                content_type: stored.content_type.clone(),
                bytes: bytes.clone(),
            })
            .ok_or_else(|| StoreError::not_found(format!("file in bucket {}", bucket), id))
    }
}
