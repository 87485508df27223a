use axum::extract::{multipart::MultipartRejection, Multipart, Path, State};
use axum::Extension;
use planboard_shared::{
    api::{Deleted, DocumentList, JoinWorkspaceRequest},
    Member, MemberRole, Project, Task, Workspace, WorkspaceInfo,
};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;
use uuid::Uuid;

use crate::access::{get_member, require_admin, require_member};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::resource::{self, Patch};
use crate::response::ApiResponse;
use crate::routes::AppState;
use crate::store::Query;
use crate::upload::{apply_image, initial_image_url, warn_orphaned_image, FormData};

pub const INVITE_CODE_LEN: usize = 10;

pub fn generate_invite_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(char::from)
        .collect()
}

/// GET /api/v1/workspaces
pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<DocumentList<Workspace>>, AppError> {
    let members =
        resource::list::<Member>(&state, &[Query::equal("user_id", user.id)]).await?;

    if members.total == 0 {
        return Ok(ApiResponse::ok(DocumentList::empty()));
    }

    let workspace_ids: Vec<Uuid> = members.documents.iter().map(|m| m.workspace_id).collect();
    let workspaces = resource::list::<Workspace>(
        &state,
        &[
            Query::order_desc("created_at"),
            Query::any("id", workspace_ids),
        ],
    )
    .await?;

    Ok(ApiResponse::ok(workspaces))
}

/// GET /api/v1/workspaces/:id
pub async fn get_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> Result<ApiResponse<Workspace>, AppError> {
    require_member(&state, workspace_id, user.id).await?;
    let workspace = resource::fetch::<Workspace>(&state, workspace_id).await?;
    Ok(ApiResponse::ok(workspace))
}

/// GET /api/v1/workspaces/:id/info
///
/// Name only, for users looking at an invite before they are members.
pub async fn get_workspace_info(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> Result<ApiResponse<WorkspaceInfo>, AppError> {
    let workspace = resource::fetch::<Workspace>(&state, workspace_id).await?;
    Ok(ApiResponse::ok(WorkspaceInfo {
        name: workspace.name,
    }))
}

/// POST /api/v1/workspaces
pub async fn create_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<Workspace>, AppError> {
    let mut form = FormData::read(multipart?).await?;
    let name = form.required_name("name")?;
    let image = form.image(&state.config)?;

    let image_url = initial_image_url(&state, image).await?;
    let uploaded = image_url.is_some();

    let workspace: Workspace = resource::create::<Workspace, _>(
        &state,
        &json!({
            "name": name,
            "image_url": image_url,
            "invite_code": generate_invite_code(),
            "user_id": user.id,
        }),
    )
    .await
    .map_err(|e| {
        warn_orphaned_image(uploaded, &e);
        e
    })?;

    resource::create::<Member, _>(
        &state,
        &json!({
            "workspace_id": workspace.id,
            "user_id": user.id,
            "role": MemberRole::Admin,
        }),
    )
    .await?;

    tracing::info!(workspace_id = %workspace.id, user_id = %user.id, "Created workspace");

    Ok(ApiResponse::created(workspace))
}

/// PATCH /api/v1/workspaces/:id
pub async fn update_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<Workspace>, AppError> {
    let mut form = FormData::read(multipart?).await?;
    let name = form.optional_name("name")?;
    let image = form.image(&state.config)?;

    require_admin(&state, workspace_id, user.id).await?;

    let mut patch = Patch::new();
    if let Some(name) = name {
        patch.set("name", name.into());
    }
    let uploaded = apply_image(&state, &mut patch, image).await?;

    let workspace = resource::update::<Workspace>(&state, workspace_id, patch)
        .await
        .map_err(|e| {
            warn_orphaned_image(uploaded, &e);
            e
        })?;

    Ok(ApiResponse::ok(workspace))
}

/// DELETE /api/v1/workspaces/:id
pub async fn delete_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> Result<ApiResponse<Deleted>, AppError> {
    require_admin(&state, workspace_id, user.id).await?;

    resource::delete::<Workspace>(&state, workspace_id).await?;

    // A partial failure below leaves orphaned children, never a workspace
    // without members.
    let tasks = resource::delete_children::<Task>(&state, "workspace_id", workspace_id).await?;
    let projects =
        resource::delete_children::<Project>(&state, "workspace_id", workspace_id).await?;
    let members =
        resource::delete_children::<Member>(&state, "workspace_id", workspace_id).await?;

    tracing::info!(
        %workspace_id,
        tasks,
        projects,
        members,
        "Deleted workspace"
    );

    Ok(ApiResponse::ok(Deleted { id: workspace_id }))
}

/// POST /api/v1/workspaces/:id/reset-invite-code
pub async fn reset_invite_code(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> Result<ApiResponse<Workspace>, AppError> {
    require_admin(&state, workspace_id, user.id).await?;

    let mut patch = Patch::new();
    patch.set("invite_code", generate_invite_code().into());
    let workspace = resource::update::<Workspace>(&state, workspace_id, patch).await?;

    Ok(ApiResponse::ok(workspace))
}

/// POST /api/v1/workspaces/:id/join
pub async fn join_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
    AppJson(req): AppJson<JoinWorkspaceRequest>,
) -> Result<ApiResponse<Workspace>, AppError> {
    if get_member(&state, workspace_id, user.id).await?.is_some() {
        return Err(AppError::Validation("Already a member".to_string()));
    }

    let workspace = resource::fetch::<Workspace>(&state, workspace_id).await?;
    if workspace.invite_code != req.code.trim() {
        return Err(AppError::Validation("Invalid invite code".to_string()));
    }

    resource::create::<Member, _>(
        &state,
        &json!({
            "workspace_id": workspace_id,
            "user_id": user.id,
            "role": MemberRole::Member,
        }),
    )
    .await?;

    tracing::info!(%workspace_id, user_id = %user.id, "User joined workspace");

    Ok(ApiResponse::ok(workspace))
}
