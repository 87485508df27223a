use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::auth::session_middleware;
use crate::db::{create_pool, ensure_schema};
use crate::handlers::{
    auth as auth_handlers, members as member_handlers, projects as project_handlers,
    tasks as task_handlers, workspaces as workspace_handlers,
};
use crate::store::{
    DocumentStore, FileStore, MemoryDocumentStore, MemoryFileStore, PgDocumentStore, PgFileStore,
};
use crate::Config;

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub files: Arc<dyn FileStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        files: Arc<dyn FileStore>,
        config: Config,
    ) -> Self {
        Self {
            documents,
            files,
            config,
        }
    }

    /// Connects to Postgres when a database is configured, otherwise keeps
    /// everything in memory.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        match &config.database_url {
            Some(url) => {
                let pool = create_pool(url).await?;
                ensure_schema(&pool).await?;
                tracing::info!("Using Postgres document and file stores");
                Ok(Self::new(
                    Arc::new(PgDocumentStore::new(pool.clone())),
                    Arc::new(PgFileStore::new(pool)),
                    config,
                ))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, data is kept in memory only");
                Ok(Self::new(
                    Arc::new(MemoryDocumentStore::new()),
                    Arc::new(MemoryFileStore::new()),
                    config,
                ))
            }
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    // Multipart overhead on top of the largest accepted image
    let body_limit = state.config.max_image_bytes + 64 * 1024;

    // Public auth routes (no middleware)
    let public_auth_routes = Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login));

    // Protected auth routes (need a session)
    let protected_auth_routes = Router::new()
        .route("/logout", post(auth_handlers::logout))
        .route("/current", get(auth_handlers::current))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    let auth_routes = Router::new()
        .merge(public_auth_routes)
        .merge(protected_auth_routes);

    let workspace_routes = Router::new()
        .route(
            "/",
            get(workspace_handlers::list_workspaces).post(workspace_handlers::create_workspace),
        )
        .route(
            "/:id",
            get(workspace_handlers::get_workspace)
                .patch(workspace_handlers::update_workspace)
                .delete(workspace_handlers::delete_workspace),
        )
        .route("/:id/info", get(workspace_handlers::get_workspace_info))
        .route(
            "/:id/reset-invite-code",
            post(workspace_handlers::reset_invite_code),
        )
        .route("/:id/join", post(workspace_handlers::join_workspace));

    let project_routes = Router::new()
        .route(
            "/",
            get(project_handlers::list_projects).post(project_handlers::create_project),
        )
        .route(
            "/:id",
            get(project_handlers::get_project)
                .patch(project_handlers::update_project)
                .delete(project_handlers::delete_project),
        );

    let member_routes = Router::new()
        .route("/", get(member_handlers::list_members))
        .route(
            "/:id",
            patch(member_handlers::update_member)
                .delete(member_handlers::delete_member),
        );

    let task_routes = Router::new()
        .route(
            "/",
            get(task_handlers::list_tasks).post(task_handlers::create_task),
        )
        .route("/bulk-update", post(task_handlers::bulk_update_tasks))
        .route(
            "/:id",
            get(task_handlers::get_task)
                .patch(task_handlers::update_task)
                .delete(task_handlers::delete_task),
        );

    // Protected routes with session middleware
    let protected_routes = Router::new()
        .nest("/workspaces", workspace_routes)
        .nest("/projects", project_routes)
        .nest("/members", member_routes)
        .nest("/tasks", task_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1", protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
