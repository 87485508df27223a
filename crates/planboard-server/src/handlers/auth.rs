use axum::{extract::State, http::header, response::IntoResponse, Extension};
use chrono::{DateTime, Utc};
use planboard_shared::{
    api::{normalize_email, LoginRequest, RegisterRequest},
    User,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{
    clear_session_cookie, create_session_token, hash_password, session_cookie, verify_password,
    AuthUser,
};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::response::ApiResponse;
use crate::routes::AppState;
use crate::store::{document_data, Collection, Query};

/// Stored user document. Only the [`User`] view ever leaves the server.
#[derive(Debug, Serialize, Deserialize)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            name: record.name,
            email: record.email,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

async fn find_by_email(state: &AppState, email: &str) -> Result<Option<UserRecord>, AppError> {
    let docs = state
        .documents
        .list_documents(Collection::Users, &[Query::equal("email", email)])
        .await?;

    match docs.into_iter().next() {
        Some(doc) => Ok(Some(doc.into_model()?)),
        None => Ok(None),
    }
}

fn issue_session(state: &AppState, user: &User) -> Result<String, AppError> {
    let token = create_session_token(user, &state.config)?;
    Ok(session_cookie(&state.config, &token))
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let req = req.validate()?;

    if find_by_email(&state, &req.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let doc = state
        .documents
        .create_document(
            Collection::Users,
            Uuid::new_v4(),
            document_data(&json!({
                "name": req.name,
                "email": req.email,
                "password_hash": password_hash,
            }))?,
        )
        .await?;
    let user: User = doc.into_model::<UserRecord>()?.into();

    tracing::info!(user_id = %user.id, "Registered user");

    let cookie = issue_session(&state, &user)?;
    Ok(([(header::SET_COOKIE, cookie)], ApiResponse::created(user)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = normalize_email(&req.email).map_err(|_| AppError::Unauthorized)?;
    let record = find_by_email(&state, &email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&req.password, &record.password_hash)? {
        tracing::debug!(user_id = %record.id, "Wrong password");
        return Err(AppError::Unauthorized);
    }

    let user: User = record.into();
    let cookie = issue_session(&state, &user)?;
    Ok(([(header::SET_COOKIE, cookie)], ApiResponse::ok(user)))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> impl IntoResponse {
    tracing::debug!(user_id = %user.id, "Logged out");
    (
        [(header::SET_COOKIE, clear_session_cookie(&state.config))],
        ApiResponse::ok(json!({ "success": true })),
    )
}

/// GET /api/v1/auth/current
pub async fn current(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<User>, AppError> {
    let doc = state
        .documents
        .get_document(Collection::Users, user.id)
        .await?;
    let record: UserRecord = doc.into_model()?;
    Ok(ApiResponse::ok(record.into()))
}
