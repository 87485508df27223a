use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StoreError;

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: Uuid,
    pub bucket: String,
    pub name: String,
    pub content_type: String,
    pub size: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FilePreview {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FilePreview {
    /// Inline `data:` URL embedding the preview, as stored on records.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn create_file(
        &self,
        bucket: &str,
        id: Uuid,
        upload: Upload,
    ) -> Result<StoredFile, StoreError>;

    async fn get_file_preview(&self, bucket: &str, id: Uuid) -> Result<FilePreview, StoreError>;
}
