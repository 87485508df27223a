//! Membership checks. A Member record for (user, workspace) is the only
//! thing that grants access to a workspace and everything inside it.

use planboard_shared::Member;
use uuid::Uuid;

use crate::error::AppError;
use crate::routes::AppState;
use crate::store::{Collection, Query};

pub async fn get_member(
    state: &AppState,
    workspace_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Member>, AppError> {
    let docs = state
        .documents
        .list_documents(
            Collection::Members,
            &[
                Query::equal("workspace_id", workspace_id),
                Query::equal("user_id", user_id),
            ],
        )
        .await?;

    match docs.into_iter().next() {
        Some(doc) => Ok(Some(doc.into_model()?)),
        None => Ok(None),
    }
}

pub async fn require_member(
    state: &AppState,
    workspace_id: Uuid,
    user_id: Uuid,
) -> Result<Member, AppError> {
    get_member(state, workspace_id, user_id).await?.ok_or_else(|| {
        tracing::debug!(%workspace_id, %user_id, "Rejected non-member");
        AppError::Unauthorized
    })
}

pub async fn require_admin(
    state: &AppState,
    workspace_id: Uuid,
    user_id: Uuid,
) -> Result<Member, AppError> {
    let member = require_member(state, workspace_id, user_id).await?;
    if !member.role.can_admin() {
        tracing::debug!(%workspace_id, %user_id, "Rejected non-admin");
        return Err(AppError::Forbidden);
    }
    Ok(member)
}
