//! Backend collaborators: a document store holding every record and a file
//! store holding uploaded images. Handlers only talk to the traits; the
//! in-memory and Postgres implementations are picked at startup.

mod document;
mod file;
mod memory;
mod postgres;

pub use document::{document_data, Collection, Document, DocumentStore, FilterValue, Query};
pub use file::{FilePreview, FileStore, StoredFile, Upload};
pub use memory::{MemoryDocumentStore, MemoryFileStore};
pub use postgres::{PgDocumentStore, PgFileStore};

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: Uuid },

    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: String, id: Uuid },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(kind: impl Into<String>, id: Uuid) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id,
        }
    }
}
