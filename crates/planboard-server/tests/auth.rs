mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{MultipartForm, Session, TestApp};
use chrono::Utc;
use planboard_server::{auth::create_session_token, store::Collection, Config};
use planboard_shared::User;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn register_starts_a_session() {
    let app = TestApp::new();
    let session = app.register("Ada", "Ada@Example.com").await;

    let response = app.get("/api/v1/auth/current", Some(&session)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["name"], "Ada");
    assert_eq!(response.data()["email"], "ada@example.com");
    assert!(response.data().get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new();
    app.register("Ada", "ada@example.com").await;

    let response = app
        .json(
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({ "name": "Other", "email": "ADA@example.com", "password": "another pass" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(app.count(Collection::Users).await, 1);
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new();
    let response = app
        .json(
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({ "name": "Ada", "email": "ada@example.com", "password": "short" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.error().unwrap().starts_with("password"));

    let response = app
        .json(Method::POST, "/api/v1/auth/register", None, json!({ "name": "Ada" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.error().is_some());
    assert_eq!(app.count(Collection::Users).await, 0);
}

#[tokio::test]
async fn login_checks_password() {
    let app = TestApp::new();
    app.register("Ada", "ada@example.com").await;

    let response = app
        .json(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": "wrong password" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.set_cookie.is_none());

    let response = app
        .json(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .set_cookie
        .unwrap()
        .starts_with("planboard-session="));
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let app = TestApp::new();
    let session = app.register("Ada", "ada@example.com").await;

    let response = app
        .json(Method::POST, "/api/v1/auth/logout", Some(&session), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.set_cookie.unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = TestApp::new();
    let owner = app.register("Ada", "ada@example.com").await;
    let workspace = app.create_workspace(&owner, "Acme").await;
    let workspace_id = workspace["id"].as_str().unwrap();
    let project = app.create_project(&owner, workspace_id, "Demo").await;
    let project_id = project["id"].as_str().unwrap();

    let projects_before = app.count(Collection::Projects).await;
    let workspaces_before = app.count(Collection::Workspaces).await;

    let responses = vec![
        app.get("/api/v1/auth/current", None).await,
        app.get("/api/v1/workspaces", None).await,
        app.get(&format!("/api/v1/projects?workspaceId={}", workspace_id), None)
            .await,
        app.form(
            Method::POST,
            "/api/v1/projects",
            None,
            &MultipartForm::new()
                .text("workspaceId", workspace_id)
                .text("name", "Sneaky"),
        )
        .await,
        app.form(
            Method::POST,
            "/api/v1/workspaces",
            None,
            &MultipartForm::new().text("name", "Sneaky"),
        )
        .await,
        app.delete(&format!("/api/v1/projects/{}", project_id), None)
            .await,
        app.delete(&format!("/api/v1/workspaces/{}", workspace_id), None)
            .await,
    ];

    for response in responses {
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error(), Some("Unauthorized"));
    }
    assert_eq!(app.count(Collection::Projects).await, projects_before);
    assert_eq!(app.count(Collection::Workspaces).await, workspaces_before);
}

#[tokio::test]
async fn forged_and_expired_tokens_are_rejected() {
    let app = TestApp::new();
    let now = Utc::now();
    let stranger = User {
        id: Uuid::new_v4(),
        name: "X".to_string(),
        email: "x@y.z".to_string(),
        created_at: now,
        updated_at: now,
    };

    let forged = create_session_token(&stranger, &Config::in_memory("other-secret")).unwrap();
    let mut stale = app.config.clone();
    stale.session_expires_in = -3600;
    let expired = create_session_token(&stranger, &stale).unwrap();

    for token in [forged, expired] {
        let session = Session {
            cookie: format!("planboard-session={}", token),
            user_id: Uuid::nil(),
        };
        let response = app.get("/api/v1/workspaces", Some(&session)).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn bearer_token_is_accepted() {
    let app = TestApp::new();
    let session = app.register("Ada", "ada@example.com").await;
    let token = session
        .cookie
        .strip_prefix("planboard-session=")
        .unwrap()
        .to_string();

    let request = Request::builder()
        .uri("/api/v1/auth/current")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["id"], session.user_id.to_string());
}
