//! Shared harness for the HTTP integration tests.
//!
//! Builds the full router over in-memory stores and a tempdir-backed file
//! store, and mints real bearer tokens so the auth middleware runs for
//! every request.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use tempfile::TempDir;
use tower::ServiceExt;
use uplink_api::auth::{Claims, SYSTEM_ADMIN_ROLE};
use uplink_api::setup::routes::build_router;
use uplink_api::state::AppState;
use uplink_core::Config;
use uplink_db::{MemoryAccessControl, MemoryFileInfoStore, MemorySessionStore};
use uplink_storage::LocalFileStore;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";

pub fn test_config() -> Config {
    Config {
        server_port: 0,
        database_url: String::new(),
        storage_path: String::new(),
        max_file_size_bytes: 1024 * 1024,
        max_form_field_bytes: 256,
        peek_buffer_bytes: 1024,
        file_attachments_enabled: true,
        cloud: false,
        jwt_secret: JWT_SECRET.to_string(),
        db_max_connections: 1,
        db_timeout_seconds: 1,
        environment: "test".to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub access: Arc<MemoryAccessControl>,
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub token: String,
    dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFileStore::new(dir.path())
            .await
            .expect("file store");
        let access = Arc::new(MemoryAccessControl::new());
        let state = Arc::new(AppState::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryFileInfoStore::new()),
            access.clone(),
            Arc::new(store),
            config,
        ));
        let router = build_router(state.clone());

        let user_id = Uuid::new_v4();
        let channel_id = Uuid::new_v4();
        access.grant(user_id, channel_id);

        TestApp {
            router,
            state,
            access,
            user_id,
            channel_id,
            token: mint_token(user_id, vec![]),
            dir,
        }
    }

    pub fn admin_token(&self) -> String {
        mint_token(Uuid::new_v4(), vec![SYSTEM_ADMIN_ROLE.to_string()])
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router")
    }

    /// Number of regular files under the storage root, recursively.
    pub fn stored_file_count(&self) -> usize {
        fn walk(dir: &std::path::Path) -> usize {
            let mut count = 0;
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        count += walk(&path);
                    } else {
                        count += 1;
                    }
                }
            }
            count
        }
        walk(self.dir.path())
    }
}

pub fn mint_token(user_id: Uuid, roles: Vec<String>) -> String {
    let claims = Claims::new(user_id, roles, 3600);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("token")
}

pub fn json_request(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn raw_request(uri: &str, token: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, data.len().to_string())
        .body(Body::from(data.to_vec()))
        .expect("request")
}

pub fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .expect("request")
}

pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub const BOUNDARY: &str = "------------uplinktestboundary";

/// One part of a hand-built multipart form.
pub enum Part {
    Field(String, String),
    File(String, Vec<u8>),
}

impl Part {
    pub fn field(name: &str, value: &str) -> Self {
        Part::Field(name.to_string(), value.to_string())
    }

    pub fn file(filename: &str, data: &[u8]) -> Self {
        Part::File(filename.to_string(), data.to_vec())
    }
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                        filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Multipart requests are sent as a chunked stream of small frames so the
/// server reads them the way it would a real network body rather than one
/// giant buffer.
pub fn multipart_request(uri: &str, token: &str, parts: &[Part]) -> Request<Body> {
    let body = multipart_body(parts);
    let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = body
        .chunks(64)
        .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
        .collect();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .expect("request")
}

/// Same form, delivered as a single body frame. Exercises the case where
/// the whole request is ready at once and the parser sees everything in
/// one poll.
pub fn multipart_request_single_frame(uri: &str, token: &str, parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("request")
}
