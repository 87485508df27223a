use axum::extract::{Path, State};
use axum::Extension;
use planboard_shared::{
    api::{Deleted, DocumentList, MemberListParams, UpdateMemberRequest},
    Member, MemberWithUser, User,
};
use uuid::Uuid;

use crate::access::require_member;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::resource::{self, Patch};
use crate::response::ApiResponse;
use crate::routes::AppState;
use crate::store::{Collection, Query, StoreError};

async fn workspace_members(state: &AppState, workspace_id: Uuid) -> Result<Vec<Member>, AppError> {
    let members = resource::list::<Member>(
        state,
        &[
            Query::equal("workspace_id", workspace_id),
            Query::order_asc("created_at"),
        ],
    )
    .await?;
    Ok(members.documents)
}

/// A workspace must keep at least one admin.
fn admin_count(members: &[Member]) -> usize {
    members.iter().filter(|m| m.role.can_admin()).count()
}

/// GET /api/v1/members?workspaceId=
pub async fn list_members(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppQuery(params): AppQuery<MemberListParams>,
) -> Result<ApiResponse<DocumentList<MemberWithUser>>, AppError> {
    let workspace_id = params
        .workspace_id
        .ok_or_else(|| AppError::Validation("Missing workspaceId".to_string()))?;

    require_member(&state, workspace_id, user.id).await?;

    let mut populated = Vec::new();
    for member in workspace_members(&state, workspace_id).await? {
        let doc = match state
            .documents
            .get_document(Collection::Users, member.user_id)
            .await
        {
            Ok(doc) => doc,
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(member_id = %member.id, "Member points at a missing user");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let account: User = doc.into_model()?;
        populated.push(MemberWithUser {
            member,
            name: account.name,
            email: account.email,
        });
    }

    Ok(ApiResponse::ok(DocumentList::new(populated)))
}

/// DELETE /api/v1/members/:id
pub async fn delete_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(member_id): Path<Uuid>,
) -> Result<ApiResponse<Deleted>, AppError> {
    let (target, requester) = resource::fetch_authorized::<Member>(&state, &user, member_id).await?;

    if requester.id != target.id && !requester.role.can_admin() {
        return Err(AppError::Forbidden);
    }

    let members = workspace_members(&state, target.workspace_id).await?;
    if members.len() == 1 {
        return Err(AppError::Validation(
            "Cannot delete the only member".to_string(),
        ));
    }
    if target.role.can_admin() && admin_count(&members) == 1 {
        return Err(AppError::Validation(
            "Cannot remove the last admin".to_string(),
        ));
    }

    resource::delete::<Member>(&state, target.id).await?;

    tracing::info!(%member_id, workspace_id = %target.workspace_id, "Removed member");

    Ok(ApiResponse::ok(Deleted { id: target.id }))
}

/// PATCH /api/v1/members/:id
pub async fn update_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(member_id): Path<Uuid>,
    AppJson(req): AppJson<UpdateMemberRequest>,
) -> Result<ApiResponse<Member>, AppError> {
    let (target, requester) = resource::fetch_authorized::<Member>(&state, &user, member_id).await?;

    if !requester.role.can_admin() {
        return Err(AppError::Forbidden);
    }

    let members = workspace_members(&state, target.workspace_id).await?;
    if members.len() == 1 {
        return Err(AppError::Validation(
            "Cannot downgrade the only member".to_string(),
        ));
    }
    if target.role.can_admin() && !req.role.can_admin() && admin_count(&members) == 1 {
        return Err(AppError::Validation(
            "Cannot downgrade the last admin".to_string(),
        ));
    }

    let mut patch = Patch::new();
    patch.set("role", req.role.as_str().into());
    let member = resource::update::<Member>(&state, target.id, patch).await?;

    tracing::info!(%member_id, role = member.role.as_str(), "Updated member role");

    Ok(ApiResponse::ok(member))
}
