use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use uuid::Uuid;

use super::document::{parse_timestamp, strip_system_fields, validate_queries, value_key};
use super::{
    Collection, Document, DocumentStore, FilePreview, FileStore, Query, StoreError, StoredFile,
    Upload,
};
use crate::db::DbPool;

type DocumentRow = (
    Uuid,                  // id
    Json<Value>,           // data
    DateTime<Utc>,         // created_at
    DateTime<Utc>,         // updated_at
);

fn row_to_document(row: DocumentRow) -> Document {
    let data = match row.1 .0 {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Document {
        id: row.0,
        created_at: row.2,
        updated_at: row.3,
        data,
    }
}

fn system_column(field: &str) -> Option<&'static str> {
    match field {
        "id" => Some("id"),
        "created_at" => Some("created_at"),
        "updated_at" => Some("updated_at"),
        _ => None,
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

enum Bind {
    Text(String),
    TextList(Vec<String>),
    Id(Uuid),
    IdList(Vec<Uuid>),
    Timestamp(DateTime<Utc>),
    TimestampList(Vec<DateTime<Utc>>),
}

/// Typed bind for a filter on a system column, so comparisons happen on
/// `uuid` and `timestamptz` values rather than their text rendering.
fn system_bind(column: &str, value: &Value) -> Result<Bind, StoreError> {
    let invalid = || StoreError::InvalidQuery(format!("invalid value for {}: {}", column, value));
    if column == "id" {
        let text = value.as_str().ok_or_else(invalid)?;
        Uuid::parse_str(text).map(Bind::Id).map_err(|_| invalid())
    } else {
        parse_timestamp(value).map(Bind::Timestamp).ok_or_else(invalid)
    }
}

fn system_list_bind(column: &str, values: &[Value]) -> Result<Bind, StoreError> {
    let mut ids = Vec::new();
    let mut timestamps = Vec::new();
    for value in values {
        match system_bind(column, value)? {
            Bind::Id(id) => ids.push(id),
            Bind::Timestamp(ts) => timestamps.push(ts),
            _ => {}
        }
    }
    Ok(if column == "id" {
        Bind::IdList(ids)
    } else {
        Bind::TimestampList(timestamps)
    })
}

/// Stores every collection in one JSONB table keyed by (collection, id).
#[derive(Clone)]
pub struct PgDocumentStore {
    db: DbPool,
}

impl PgDocumentStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list_documents(
        &self,
        collection: Collection,
        queries: &[Query],
    ) -> Result<Vec<Document>, StoreError> {
        validate_queries(queries)?;

        let mut conditions = vec!["collection = $1".to_string()];
        let mut binds = Vec::new();
        let mut param_idx = 2;
        let mut order_clause = "created_at ASC".to_string();
        let mut ordered = false;

        for query in queries {
            match query {
                Query::Equal(field, value) => {
                    if let Some(column) = system_column(field) {
                        conditions.push(format!("{} = ${}", column, param_idx));
                        binds.push(system_bind(column, value)?);
                        param_idx += 1;
                    } else {
                        conditions.push(format!("data->>${} = ${}", param_idx, param_idx + 1));
                        binds.push(Bind::Text(field.clone()));
                        binds.push(Bind::Text(value_key(value)));
                        param_idx += 2;
                    }
                }
                Query::Any(field, values) => {
                    if let Some(column) = system_column(field) {
                        conditions.push(format!("{} = ANY(${})", column, param_idx));
                        binds.push(system_list_bind(column, values)?);
                        param_idx += 1;
                    } else {
                        conditions.push(format!(
                            "data->>${} = ANY(${})",
                            param_idx,
                            param_idx + 1
                        ));
                        binds.push(Bind::Text(field.clone()));
                        binds.push(Bind::TextList(values.iter().map(value_key).collect()));
                        param_idx += 2;
                    }
                }
                Query::Search(field, text) => {
                    conditions.push(format!("data->>${} ILIKE ${}", param_idx, param_idx + 1));
                    binds.push(Bind::Text(field.clone()));
                    binds.push(Bind::Text(format!("%{}%", escape_like(text))));
                    param_idx += 2;
                }
                Query::OrderAsc(field) | Query::OrderDesc(field) if !ordered => {
                    let direction = if matches!(query, Query::OrderDesc(_)) {
                        "DESC"
                    } else {
                        "ASC"
                    };
                    order_clause = match system_column(field) {
                        Some(column) => format!("{} {}", column, direction),
                        None => {
                            binds.push(Bind::Text(field.clone()));
                            param_idx += 1;
                            format!(
                                "data->${} {}, created_at {}",
                                param_idx - 1,
                                direction,
                                direction
                            )
                        }
                    };
                    ordered = true;
                }
                Query::OrderAsc(_) | Query::OrderDesc(_) => {}
            }
        }

        let sql = format!(
            "SELECT id, data, created_at, updated_at FROM documents WHERE {} ORDER BY {}",
            conditions.join(" AND "),
            order_clause
        );

        let mut builder = sqlx::query_as::<_, DocumentRow>(&sql).bind(collection.as_str());
        for bind in binds {
            builder = match bind {
                Bind::Text(value) => builder.bind(value),
                Bind::TextList(values) => builder.bind(values),
                Bind::Id(id) => builder.bind(id),
                Bind::IdList(ids) => builder.bind(ids),
                Bind::Timestamp(ts) => builder.bind(ts),
                Bind::TimestampList(list) => builder.bind(list),
            };
        }

        let rows = builder.fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(row_to_document).collect())
    }

    async fn get_document(&self, collection: Collection, id: Uuid) -> Result<Document, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT id, data, created_at, updated_at FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(row_to_document)
            .ok_or_else(|| StoreError::not_found(collection.as_str(), id))
    }

    async fn create_document(
        &self,
        collection: Collection,
        id: Uuid,
        data: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let now = Utc::now();
        let row: DocumentRow = sqlx::query_as(
            r#"
            INSERT INTO documents (collection, id, data, created_at, updated_at)
            VALUES ($1, $2, jsonb_strip_nulls($3), $4, $4)
            RETURNING id, data, created_at, updated_at
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(Value::Object(strip_system_fields(data))))
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::AlreadyExists {
                    kind: collection.as_str().to_string(),
                    id,
                }
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(row_to_document(row))
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            UPDATE documents
            SET data = jsonb_strip_nulls(data || $3),
                updated_at = $4
            WHERE collection = $1 AND id = $2
            RETURNING id, data, created_at, updated_at
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(Value::Object(strip_system_fields(patch))))
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        row.map(row_to_document)
            .ok_or_else(|| StoreError::not_found(collection.as_str(), id))
    }

    async fn delete_document(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection.as_str(), id));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgFileStore {
    db: DbPool,
}

impl PgFileStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FileStore for PgFileStore {
    async fn create_file(
        &self,
        bucket: &str,
        id: Uuid,
        upload: Upload,
    ) -> Result<StoredFile, StoreError> {
        let now = Utc::now();
        let size = upload.bytes.len();

        sqlx::query(
            r#"
            INSERT INTO files (bucket, id, name, content_type, size, bytes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(bucket)
        .bind(id)
        .bind(&upload.file_name)
        .bind(&upload.content_type)
        .bind(size as i64)
        .bind(&upload.bytes)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::AlreadyExists {
                    kind: format!("file in bucket {}", bucket),
                    id,
                }
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(StoredFile {
            id,
            bucket: bucket.to_string(),
            name: upload.file_name,
            content_type: upload.content_type,
            size,
            created_at: now,
        })
    }

    async fn get_file_preview(&self, bucket: &str, id: Uuid) -> Result<FilePreview, StoreError> {
        let row: Option<(String, Vec<u8>)> =
            sqlx::query_as("SELECT content_type, bytes FROM files WHERE bucket = $1 AND id = $2")
                .bind(bucket)
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        let (content_type, bytes) =
            row.ok_or_else(|| StoreError::not_found(format!("file in bucket {}", bucket), id))?;
        Ok(FilePreview {
            content_type,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_filters_bind_typed_values() {
        let id = Uuid::new_v4();
        assert!(matches!(
            system_bind("id", &Value::String(id.to_string())),
            Ok(Bind::Id(bound)) if bound == id
        ));

        let created = "2026-10-18T09:30:00+02:00";
        assert!(matches!(
            system_bind("created_at", &Value::String(created.to_string())),
            Ok(Bind::Timestamp(ts)) if ts.to_rfc3339() == "2026-10-18T07:30:00+00:00"
        ));

        assert!(system_bind("created_at", &Value::String("yesterday".to_string())).is_err());
        assert!(system_bind("id", &Value::from(7)).is_err());
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
