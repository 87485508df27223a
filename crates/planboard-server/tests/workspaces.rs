mod common;

use axum::http::{Method, StatusCode};
use common::{MultipartForm, TestApp};
use planboard_server::store::Collection;
use serde_json::json;

#[tokio::test]
async fn creator_becomes_admin_member() {
    let app = TestApp::new();
    let owner = app.register("Ada", "ada@example.com").await;

    let workspace = app.create_workspace(&owner, "  Acme  ").await;
    assert_eq!(workspace["name"], "Acme");
    assert_eq!(workspace["user_id"], owner.user_id.to_string());
    assert_eq!(workspace["invite_code"].as_str().unwrap().len(), 10);
    assert!(workspace.get("image_url").is_none());

    let path = format!(
        "/api/v1/members?workspaceId={}",
        workspace["id"].as_str().unwrap()
    );
    let members = app.get(&path, Some(&owner)).await;
    assert_eq!(members.status, StatusCode::OK);
    assert_eq!(members.data()["total"], 1);
    assert_eq!(members.data()["documents"][0]["role"], "admin");
    assert_eq!(members.data()["documents"][0]["name"], "Ada");
}

#[tokio::test]
async fn create_requires_a_name() {
    let app = TestApp::new();
    let owner = app.register("Ada", "ada@example.com").await;

    let response = app
        .form(
            Method::POST,
            "/api/v1/workspaces",
            Some(&owner),
            &MultipartForm::new().text("name", "   "),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error(), Some("name: Required"));
    assert_eq!(app.count(Collection::Workspaces).await, 0);
    assert_eq!(app.count(Collection::Members).await, 0);
}

#[tokio::test]
async fn list_shows_only_member_workspaces_newest_first() {
    let app = TestApp::new();
    let ada = app.register("Ada", "ada@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;

    let empty = app.get("/api/v1/workspaces", Some(&ada)).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.data()["total"], 0);

    let first = app.create_workspace(&ada, "First").await;
    let second = app.create_workspace(&ada, "Second").await;
    app.create_workspace(&bob, "Bob's").await;

    let listed = app.get("/api/v1/workspaces", Some(&ada)).await;
    assert_eq!(listed.data()["total"], 2);
    assert_eq!(listed.data()["documents"][0]["id"], second["id"]);
    assert_eq!(listed.data()["documents"][1]["id"], first["id"]);
}

#[tokio::test]
async fn non_members_cannot_read_or_edit() {
    let app = TestApp::new();
    let ada = app.register("Ada", "ada@example.com").await;
    let eve = app.register("Eve", "eve@example.com").await;
    let workspace = app.create_workspace(&ada, "Acme").await;
    let path = format!("/api/v1/workspaces/{}", workspace["id"].as_str().unwrap());

    let response = app.get(&path, Some(&eve)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error(), Some("Unauthorized"));

    let response = app
        .form(
            Method::PATCH,
            &path,
            Some(&eve),
            &MultipartForm::new().text("name", "Hijacked"),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.delete(&path, Some(&eve)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get(&path, Some(&ada)).await;
    assert_eq!(response.data()["name"], "Acme");
}

#[tokio::test]
async fn info_is_visible_before_joining() {
    let app = TestApp::new();
    let ada = app.register("Ada", "ada@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    let workspace = app.create_workspace(&ada, "Acme").await;

    let path = format!(
        "/api/v1/workspaces/{}/info",
        workspace["id"].as_str().unwrap()
    );
    let response = app.get(&path, Some(&bob)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data(), &json!({ "name": "Acme" }));
}

#[tokio::test]
async fn join_with_invite_code() {
    let app = TestApp::new();
    let ada = app.register("Ada", "ada@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    let workspace = app.create_workspace(&ada, "Acme").await;
    let path = format!(
        "/api/v1/workspaces/{}/join",
        workspace["id"].as_str().unwrap()
    );

    let wrong = app
        .json(Method::POST, &path, Some(&bob), json!({ "code": "nope" }))
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.error(), Some("Invalid invite code"));
    assert_eq!(app.count(Collection::Members).await, 1);

    let joined = app
        .json(
            Method::POST,
            &path,
            Some(&bob),
            json!({ "code": workspace["invite_code"] }),
        )
        .await;
    assert_eq!(joined.status, StatusCode::OK);
    assert_eq!(joined.data()["id"], workspace["id"]);

    let again = app
        .json(
            Method::POST,
            &path,
            Some(&bob),
            json!({ "code": workspace["invite_code"] }),
        )
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.error(), Some("Already a member"));
    assert_eq!(app.count(Collection::Members).await, 2);

    let listed = app.get("/api/v1/workspaces", Some(&bob)).await;
    assert_eq!(listed.data()["total"], 1);
}

#[tokio::test]
async fn admin_only_operations() {
    let app = TestApp::new();
    let ada = app.register("Ada", "ada@example.com").await;
    let workspace = app.create_workspace(&ada, "Acme").await;
    let bob = app.join(&workspace, "Bob", "bob@example.com").await;
    let id = workspace["id"].as_str().unwrap();

    let reset_path = format!("/api/v1/workspaces/{}/reset-invite-code", id);
    let response = app.json(Method::POST, &reset_path, Some(&bob), json!({})).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let update_path = format!("/api/v1/workspaces/{}", id);
    let response = app
        .form(
            Method::PATCH,
            &update_path,
            Some(&bob),
            &MultipartForm::new().text("name", "Renamed"),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.delete(&update_path, Some(&bob)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(app.count(Collection::Workspaces).await, 1);

    let response = app.json(Method::POST, &reset_path, Some(&ada), json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_ne!(response.data()["invite_code"], workspace["invite_code"]);
}

#[tokio::test]
async fn update_renames_and_handles_image() {
    let app = TestApp::new();
    let ada = app.register("Ada", "ada@example.com").await;
    let workspace = app.create_workspace(&ada, "Acme").await;
    let path = format!("/api/v1/workspaces/{}", workspace["id"].as_str().unwrap());

    let response = app
        .form(
            Method::PATCH,
            &path,
            Some(&ada),
            &MultipartForm::new()
                .text("name", "Acme Corp")
                .file("image", "logo.png", "image/png", b"png-bytes"),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.data()["name"], "Acme Corp");
    assert_eq!(
        response.data()["image_url"],
        "data:image/png;base64,cG5nLWJ5dGVz"
    );
    assert_eq!(response.data()["invite_code"], workspace["invite_code"]);

    let response = app
        .form(
            Method::PATCH,
            &path,
            Some(&ada),
            &MultipartForm::new().text("image", ""),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["name"], "Acme Corp");
    assert!(response.data().get("image_url").is_none());
}

#[tokio::test]
async fn delete_removes_workspace_and_children() {
    let app = TestApp::new();
    let ada = app.register("Ada", "ada@example.com").await;
    let workspace = app.create_workspace(&ada, "Acme").await;
    let other = app.create_workspace(&ada, "Other").await;
    let id = workspace["id"].as_str().unwrap();
    app.join(&workspace, "Bob", "bob@example.com").await;
    app.create_project(&ada, id, "Demo").await;
    app.create_project(&ada, other["id"].as_str().unwrap(), "Kept")
        .await;

    let path = format!("/api/v1/workspaces/{}", id);
    let response = app.delete(&path, Some(&ada)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data(), &json!({ "id": id }));

    assert_eq!(app.count(Collection::Workspaces).await, 1);
    assert_eq!(app.count(Collection::Projects).await, 1);
    // Only Ada's membership of the other workspace is left.
    assert_eq!(app.count(Collection::Members).await, 1);

    let response = app.get(&path, Some(&ada)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
