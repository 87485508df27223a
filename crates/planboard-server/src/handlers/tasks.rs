use std::collections::{HashMap, HashSet};

use axum::extract::{Path, State};
use axum::Extension;
use planboard_shared::{
    api::{
        BulkUpdateTasksRequest, CreateTaskRequest, Deleted, DocumentList, TaskListParams,
        UpdateTaskRequest,
    },
    Project, Task, TaskStatus, TaskWithRelations, User,
};
use serde_json::json;
use uuid::Uuid;

use crate::access::{get_member, require_member};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::resource::{self, Patch};
use crate::response::ApiResponse;
use crate::routes::AppState;
use crate::store::{Collection, Query, StoreError};

/// Gap left between neighbouring positions in a status column.
pub const POSITION_STEP: i64 = 1000;

/// Project lookup that reports a foreign or missing project as bad input.
async fn verify_project(
    state: &AppState,
    project_id: Uuid,
    workspace_id: Uuid,
) -> Result<(), AppError> {
    let project = match resource::fetch::<Project>(state, project_id).await {
        Ok(project) => project,
        Err(AppError::Store(StoreError::NotFound { .. })) => return Err(invalid_project()),
        Err(e) => return Err(e),
    };
    if project.workspace_id != workspace_id {
        return Err(invalid_project());
    }
    Ok(())
}

fn invalid_project() -> AppError {
    AppError::Validation("Project does not belong to this workspace".to_string())
}

async fn verify_assignee(
    state: &AppState,
    assignee_id: Uuid,
    workspace_id: Uuid,
) -> Result<(), AppError> {
    if get_member(state, workspace_id, assignee_id).await?.is_none() {
        return Err(AppError::Validation(
            "Assignee is not a member of this workspace".to_string(),
        ));
    }
    Ok(())
}

/// Next free position at the bottom of a status column.
async fn next_position(
    state: &AppState,
    workspace_id: Uuid,
    status: TaskStatus,
) -> Result<i64, AppError> {
    let tasks = resource::list::<Task>(
        state,
        &[
            Query::equal("workspace_id", workspace_id),
            Query::equal("status", status),
            Query::order_desc("position"),
        ],
    )
    .await?;

    match tasks.documents.first() {
        None => Ok(POSITION_STEP),
        Some(last) => last
            .position
            .checked_add(POSITION_STEP)
            .ok_or_else(|| AppError::Validation("Status column is full".to_string())),
    }
}

/// Attaches project and assignee names to tasks.
async fn populate(state: &AppState, tasks: Vec<Task>) -> Result<Vec<TaskWithRelations>, AppError> {
    let project_ids: HashSet<Uuid> = tasks.iter().map(|t| t.project_id).collect();
    let assignee_ids: HashSet<Uuid> = tasks.iter().map(|t| t.assignee_id).collect();

    let projects: HashMap<Uuid, String> = if project_ids.is_empty() {
        HashMap::new()
    } else {
        resource::list::<Project>(state, &[Query::any("id", project_ids)])
            .await?
            .documents
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect()
    };

    let assignees: HashMap<Uuid, String> = if assignee_ids.is_empty() {
        HashMap::new()
    } else {
        let docs = state
            .documents
            .list_documents(Collection::Users, &[Query::any("id", assignee_ids)])
            .await?;
        let mut names = HashMap::new();
        for doc in docs {
            let account: User = doc.into_model()?;
            names.insert(account.id, account.name);
        }
        names
    };

    Ok(tasks
        .into_iter()
        .map(|task| TaskWithRelations {
            project_name: projects.get(&task.project_id).cloned(),
            assignee_name: assignees.get(&task.assignee_id).cloned(),
            task,
        })
        .collect())
}

/// GET /api/v1/tasks?workspaceId=&projectId=&assigneeId=&status=&search=&dueDate=
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppQuery(params): AppQuery<TaskListParams>,
) -> Result<ApiResponse<DocumentList<TaskWithRelations>>, AppError> {
    let workspace_id = params
        .workspace_id
        .ok_or_else(|| AppError::Validation("Missing workspaceId".to_string()))?;

    require_member(&state, workspace_id, user.id).await?;

    let mut queries = vec![
        Query::equal("workspace_id", workspace_id),
        Query::order_desc("created_at"),
    ];
    if let Some(project_id) = params.project_id {
        queries.push(Query::equal("project_id", project_id));
    }
    if let Some(assignee_id) = params.assignee_id {
        queries.push(Query::equal("assignee_id", assignee_id));
    }
    if let Some(status) = params.status {
        queries.push(Query::equal("status", status));
    }
    if let Some(due_date) = params.due_date {
        queries.push(Query::equal("due_date", due_date));
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        queries.push(Query::search("title", search));
    }

    let tasks = resource::list::<Task>(&state, &queries).await?;
    let populated = populate(&state, tasks.documents).await?;

    Ok(ApiResponse::ok(DocumentList::new(populated)))
}

/// GET /api/v1/tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
) -> Result<ApiResponse<TaskWithRelations>, AppError> {
    let (task, _) = resource::fetch_authorized::<Task>(&state, &user, task_id).await?;
    let populated = populate(&state, vec![task])
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(populated))
}

/// POST /api/v1/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(req): AppJson<CreateTaskRequest>,
) -> Result<ApiResponse<Task>, AppError> {
    let req = req.validate()?;

    require_member(&state, req.workspace_id, user.id).await?;
    verify_project(&state, req.project_id, req.workspace_id).await?;
    verify_assignee(&state, req.assignee_id, req.workspace_id).await?;

    let position = next_position(&state, req.workspace_id, req.status).await?;

    let task: Task = resource::create::<Task, _>(
        &state,
        &json!({
            "workspace_id": req.workspace_id,
            "project_id": req.project_id,
            "assignee_id": req.assignee_id,
            "title": req.title,
            "status": req.status,
            "description": req.description,
            "due_date": req.due_date,
            "position": position,
        }),
    )
    .await?;

    tracing::info!(
        task_id = %task.id,
        workspace_id = %task.workspace_id,
        status = task.status.as_str(),
        "Created task"
    );

    Ok(ApiResponse::created(task))
}

/// PATCH /api/v1/tasks/:id
pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
    AppJson(req): AppJson<UpdateTaskRequest>,
) -> Result<ApiResponse<Task>, AppError> {
    let req = req.validate()?;

    let (existing, _) = resource::fetch_authorized::<Task>(&state, &user, task_id).await?;

    let mut patch = Patch::new();
    if let Some(title) = req.title {
        patch.set("title", title.into());
    }
    if let Some(status) = req.status {
        patch.set("status", json!(status));
    }
    if let Some(project_id) = req.project_id {
        verify_project(&state, project_id, existing.workspace_id).await?;
        patch.set("project_id", json!(project_id));
    }
    if let Some(assignee_id) = req.assignee_id {
        verify_assignee(&state, assignee_id, existing.workspace_id).await?;
        patch.set("assignee_id", json!(assignee_id));
    }
    match req.description {
        Some(description) if description.trim().is_empty() => {
            patch.clear("description");
        }
        Some(description) => {
            patch.set("description", description.into());
        }
        None => {}
    }
    match req.due_date {
        Some(Some(due_date)) => {
            patch.set("due_date", json!(due_date));
        }
        Some(None) => {
            patch.clear("due_date");
        }
        None => {}
    }
    if let Some(position) = req.position {
        patch.set("position", position.into());
    }
    if patch.is_empty() {
        return Ok(ApiResponse::ok(existing));
    }

    let task = resource::update::<Task>(&state, task_id, patch).await?;
    Ok(ApiResponse::ok(task))
}

/// DELETE /api/v1/tasks/:id
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
) -> Result<ApiResponse<Deleted>, AppError> {
    let (task, _) = resource::fetch_authorized::<Task>(&state, &user, task_id).await?;

    resource::delete::<Task>(&state, task.id).await?;

    tracing::info!(%task_id, "Deleted task");

    Ok(ApiResponse::ok(Deleted { id: task.id }))
}

/// POST /api/v1/tasks/bulk-update
///
/// Kanban drag and drop: moves several tasks of one workspace at once.
pub async fn bulk_update_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(req): AppJson<BulkUpdateTasksRequest>,
) -> Result<ApiResponse<Vec<Task>>, AppError> {
    let req = req.validate()?;

    let mut workspace_ids = HashSet::new();
    for change in &req.tasks {
        let task = resource::fetch::<Task>(&state, change.id).await?;
        workspace_ids.insert(task.workspace_id);
    }

    if workspace_ids.len() != 1 {
        return Err(AppError::Validation(
            "All tasks must belong to the same workspace".to_string(),
        ));
    }
    if let Some(workspace_id) = workspace_ids.into_iter().next() {
        require_member(&state, workspace_id, user.id).await?;
    }

    let mut updated = Vec::with_capacity(req.tasks.len());
    for change in req.tasks {
        let mut patch = Patch::new();
        patch
            .set("status", json!(change.status))
            .set("position", change.position.into());
        updated.push(resource::update::<Task>(&state, change.id, patch).await?);
    }

    Ok(ApiResponse::ok(updated))
}
