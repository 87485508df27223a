use axum::extract::{multipart::MultipartRejection, Multipart, Path, State};
use axum::Extension;
use planboard_shared::{
    api::{Deleted, DocumentList, ProjectListParams},
    Project, Task,
};
use serde_json::json;
use uuid::Uuid;

use crate::access::require_member;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::extract::AppQuery;
use crate::resource::{self, Patch};
use crate::response::ApiResponse;
use crate::routes::AppState;
use crate::upload::{apply_image, initial_image_url, warn_orphaned_image, FormData};

/// GET /api/v1/projects?workspaceId=
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppQuery(params): AppQuery<ProjectListParams>,
) -> Result<ApiResponse<DocumentList<Project>>, AppError> {
    let workspace_id = params
        .workspace_id
        .ok_or_else(|| AppError::Validation("Missing workspaceId".to_string()))?;

    require_member(&state, workspace_id, user.id).await?;

    let projects = resource::list_by_parent::<Project>(&state, "workspace_id", workspace_id).await?;
    Ok(ApiResponse::ok(projects))
}

/// GET /api/v1/projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
) -> Result<ApiResponse<Project>, AppError> {
    let (project, _) = resource::fetch_authorized::<Project>(&state, &user, project_id).await?;
    Ok(ApiResponse::ok(project))
}

/// POST /api/v1/projects
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<Project>, AppError> {
    let mut form = FormData::read(multipart?).await?;
    let workspace_id = form.required_id("workspaceId")?;
    let name = form.required_name("name")?;
    let image = form.image(&state.config)?;

    require_member(&state, workspace_id, user.id).await?;

    let image_url = initial_image_url(&state, image).await?;
    let uploaded = image_url.is_some();

    let project: Project = resource::create::<Project, _>(
        &state,
        &json!({
            "workspace_id": workspace_id,
            "name": name,
            "image_url": image_url,
        }),
    )
    .await
    .map_err(|e| {
        warn_orphaned_image(uploaded, &e);
        e
    })?;

    tracing::info!(project_id = %project.id, %workspace_id, "Created project");

    Ok(ApiResponse::created(project))
}

/// PATCH /api/v1/projects/:id
pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<Project>, AppError> {
    let mut form = FormData::read(multipart?).await?;
    let name = form.optional_name("name")?;
    let image = form.image(&state.config)?;

    resource::fetch_authorized::<Project>(&state, &user, project_id).await?;

    let mut patch = Patch::new();
    if let Some(name) = name {
        patch.set("name", name.into());
    }
    let uploaded = apply_image(&state, &mut patch, image).await?;

    let project = resource::update::<Project>(&state, project_id, patch)
        .await
        .map_err(|e| {
            warn_orphaned_image(uploaded, &e);
            e
        })?;

    Ok(ApiResponse::ok(project))
}

/// DELETE /api/v1/projects/:id
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
) -> Result<ApiResponse<Deleted>, AppError> {
    let (project, _) = resource::fetch_authorized::<Project>(&state, &user, project_id).await?;

    resource::delete::<Project>(&state, project.id).await?;
    let tasks = resource::delete_children::<Task>(&state, "project_id", project.id).await?;

    tracing::info!(%project_id, tasks, "Deleted project");

    Ok(ApiResponse::ok(Deleted { id: project.id }))
}
