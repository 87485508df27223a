mod auth;
mod members;
mod projects;
mod tasks;
mod workspaces;

pub use auth::*;
pub use members::*;
pub use projects::*;
pub use tasks::*;
pub use workspaces::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest name accepted for workspaces, projects and users.
pub const MAX_NAME_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Trims a required name and checks its length.
pub fn validate_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "Required"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            field,
            format!("Must be at most {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(trimmed.to_string())
}

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentList<T> {
    pub documents: Vec<T>,
    pub total: usize,
}

impl<T> DocumentList<T> {
    pub fn new(documents: Vec<T>) -> Self {
        let total = documents.len();
        Self { documents, total }
    }

    pub fn empty() -> Self {
        Self {
            documents: Vec::new(),
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Deleted {
    pub id: Uuid,
}
