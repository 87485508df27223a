#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use planboard_server::{
    create_router,
    store::{Collection, MemoryDocumentStore, MemoryFileStore},
    AppState, Config,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const BOUNDARY: &str = "planboard-test-boundary";

pub struct Session {
    pub cookie: String,
    pub user_id: Uuid,
}

pub struct TestApp {
    pub router: Router,
    pub documents: Arc<MemoryDocumentStore>,
    pub files: Arc<MemoryFileStore>,
    pub config: Config,
}

pub struct Response {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub body: Value,
}

impl Response {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error(&self) -> Option<&str> {
        self.body["error"].as_str()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let documents = Arc::new(MemoryDocumentStore::new());
        let files = Arc::new(MemoryFileStore::new());
        let config = Config::in_memory("test-secret");
        let state = AppState::new(documents.clone(), files.clone(), config.clone());

        Self {
            router: create_router(state),
            documents,
            files,
            config,
        }
    }

    pub async fn count(&self, collection: Collection) -> usize {
        self.documents.count(collection).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        Response {
            status,
            set_cookie,
            body,
        }
    }

    fn builder(method: Method, path: &str, session: Option<&Session>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(path);
        match session {
            Some(session) => builder.header(header::COOKIE, &session.cookie),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str, session: Option<&Session>) -> Response {
        let request = Self::builder(Method::GET, path, session)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, path: &str, session: Option<&Session>) -> Response {
        let request = Self::builder(Method::DELETE, path, session)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn json(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        body: Value,
    ) -> Response {
        let request = Self::builder(method, path, session)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn form(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        form: &MultipartForm,
    ) -> Response {
        let request = Self::builder(method, path, session)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(form.body()))
            .unwrap();
        self.send(request).await
    }

    pub async fn register(&self, name: &str, email: &str) -> Session {
        let response = self
            .json(
                Method::POST,
                "/api/v1/auth/register",
                None,
                json!({ "name": name, "email": email, "password": "correct horse" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        let user_id = response.data()["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("user id");
        let set_cookie = response.set_cookie.expect("register sets a session cookie");
        let cookie = set_cookie
            .split(';')
            .next()
            .unwrap_or_default()
            .to_string();

        Session { cookie, user_id }
    }

    pub async fn create_workspace(&self, session: &Session, name: &str) -> Value {
        let response = self
            .form(
                Method::POST,
                "/api/v1/workspaces",
                Some(session),
                &MultipartForm::new().text("name", name),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.data().clone()
    }

    pub async fn create_project(&self, session: &Session, workspace_id: &str, name: &str) -> Value {
        let response = self
            .form(
                Method::POST,
                "/api/v1/projects",
                Some(session),
                &MultipartForm::new()
                    .text("workspaceId", workspace_id)
                    .text("name", name),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.data().clone()
    }

    /// Registers a user and joins them to the workspace with its invite code.
    pub async fn join(&self, workspace: &Value, name: &str, email: &str) -> Session {
        let session = self.register(name, email).await;
        let path = format!("/api/v1/workspaces/{}/join", workspace["id"].as_str().unwrap());
        let response = self
            .json(
                Method::POST,
                &path,
                Some(&session),
                json!({ "code": workspace["invite_code"] }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        session
    }
}

enum Part {
    Text { name: String, value: String },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Default)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(Part::Text {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.parts.push(Part::File {
            name: name.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes: bytes.to_vec(),
        });
        self
    }

    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            name, file_name, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }
}
