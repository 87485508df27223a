//! Generic authorization-scoped CRUD over the document store.
//!
//! Every workspace-owned record type implements [`Resource`]; handlers then
//! run the same pipeline for all of them: load the record, find its
//! workspace, require a membership, perform a single store operation.

use planboard_shared::{api::DocumentList, Member, Project, Task, Workspace};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::access::require_member;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::routes::AppState;
use crate::store::{document_data, Collection, Query};

pub trait Resource: Serialize + DeserializeOwned + Send {
    const COLLECTION: Collection;

    fn id(&self) -> Uuid;

    /// Workspace whose members may access this record.
    fn workspace_id(&self) -> Uuid;
}

impl Resource for Workspace {
    const COLLECTION: Collection = Collection::Workspaces;

    fn id(&self) -> Uuid {
        self.id
    }

    fn workspace_id(&self) -> Uuid {
        self.id
    }
}

impl Resource for Member {
    const COLLECTION: Collection = Collection::Members;

    fn id(&self) -> Uuid {
        self.id
    }

    fn workspace_id(&self) -> Uuid {
        self.workspace_id
    }
}

impl Resource for Project {
    const COLLECTION: Collection = Collection::Projects;

    fn id(&self) -> Uuid {
        self.id
    }

    fn workspace_id(&self) -> Uuid {
        self.workspace_id
    }
}

impl Resource for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn id(&self) -> Uuid {
        self.id
    }

    fn workspace_id(&self) -> Uuid {
        self.workspace_id
    }
}

/// Field changes for an update. Fields left out keep their stored value.
#[derive(Debug, Default)]
pub struct Patch(Map<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &str, value: Value) -> &mut Self {
        self.0.insert(field.to_string(), value);
        self
    }

    pub fn clear(&mut self, field: &str) -> &mut Self {
        self.0.insert(field.to_string(), Value::Null);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub async fn fetch<R: Resource>(state: &AppState, id: Uuid) -> Result<R, AppError> {
    let doc = state.documents.get_document(R::COLLECTION, id).await?;
    Ok(doc.into_model()?)
}

/// Loads a record and requires the caller to be a member of its workspace.
pub async fn fetch_authorized<R: Resource>(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<(R, Member), AppError> {
    let record = fetch::<R>(state, id).await?;
    let member = require_member(state, record.workspace_id(), user.id).await?;
    Ok((record, member))
}

pub async fn list<R: Resource>(
    state: &AppState,
    queries: &[Query],
) -> Result<DocumentList<R>, AppError> {
    let docs = state.documents.list_documents(R::COLLECTION, queries).await?;
    let records = docs
        .into_iter()
        .map(|doc| doc.into_model())
        .collect::<Result<Vec<R>, _>>()?;
    Ok(DocumentList::new(records))
}

/// All records owned by `parent_field = parent_id`, newest first.
pub async fn list_by_parent<R: Resource>(
    state: &AppState,
    parent_field: &str,
    parent_id: Uuid,
) -> Result<DocumentList<R>, AppError> {
    list::<R>(
        state,
        &[
            Query::equal(parent_field, parent_id),
            Query::order_desc("created_at"),
        ],
    )
    .await
}

/// Persists `draft` under a fresh id.
pub async fn create<R: Resource, D: Serialize>(state: &AppState, draft: &D) -> Result<R, AppError> {
    let doc = state
        .documents
        .create_document(R::COLLECTION, Uuid::new_v4(), document_data(draft)?)
        .await?;
    Ok(doc.into_model()?)
}

pub async fn update<R: Resource>(state: &AppState, id: Uuid, patch: Patch) -> Result<R, AppError> {
    let doc = state
        .documents
        .update_document(R::COLLECTION, id, patch.0)
        .await?;
    Ok(doc.into_model()?)
}

pub async fn delete<R: Resource>(state: &AppState, id: Uuid) -> Result<(), AppError> {
    state.documents.delete_document(R::COLLECTION, id).await?;
    Ok(())
}

/// Deletes every record with `parent_field = parent_id`. Not transactional:
/// a failure part way leaves the rest in place.
pub async fn delete_children<R: Resource>(
    state: &AppState,
    parent_field: &str,
    parent_id: Uuid,
) -> Result<usize, AppError> {
    let children = list::<R>(state, &[Query::equal(parent_field, parent_id)]).await?;
    for child in &children.documents {
        delete::<R>(state, child.id()).await?;
    }
    Ok(children.total)
}
