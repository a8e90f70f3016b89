//! End-to-end tests for the resumable upload session endpoints.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use uuid::Uuid;

fn create_body(channel_id: Uuid, filename: &str, file_size: i64) -> serde_json::Value {
    json!({
        "type": "attachment",
        "channel_id": channel_id,
        "filename": filename,
        "file_size": file_size,
    })
}

async fn create_session(app: &TestApp, file_size: i64) -> serde_json::Value {
    let response = app
        .send(json_request(
            "/api/v1/uploads",
            &app.token,
            create_body(app.channel_id, "notes.txt", file_size),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

#[tokio::test]
async fn test_create_append_complete_round_trip() {
    let app = TestApp::new().await;
    let session = create_session(&app, 10).await;
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["file_offset"], 0);
    assert_eq!(session["file_size"], 10);

    // First chunk: session incomplete, no body.
    let response = app
        .send(raw_request(
            &format!("/api/v1/uploads/{}", id),
            &app.token,
            b"0123",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(get_request(&format!("/api/v1/uploads/{}", id), &app.token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = read_json(response).await;
    assert_eq!(fetched["file_offset"], 4);

    // Second chunk completes the session and returns the file record.
    let response = app
        .send(raw_request(
            &format!("/api/v1/uploads/{}", id),
            &app.token,
            b"456789",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let info = read_json(response).await;
    assert_eq!(info["id"].as_str().unwrap(), id);
    assert_eq!(info["size"], 10);
    assert_eq!(info["name"], "notes.txt");
    assert_eq!(info["mime_type"], "text/plain");
}

#[tokio::test]
async fn test_chunking_is_invisible_in_the_result() {
    let app = TestApp::new().await;

    let one = create_session(&app, 6).await;
    let one_id = one["id"].as_str().unwrap().to_string();
    let response = app
        .send(raw_request(
            &format!("/api/v1/uploads/{}", one_id),
            &app.token,
            b"abcdef",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let whole = read_json(response).await;

    let two = create_session(&app, 6).await;
    let two_id = two["id"].as_str().unwrap().to_string();
    app.send(raw_request(
        &format!("/api/v1/uploads/{}", two_id),
        &app.token,
        b"abc",
    ))
    .await;
    let response = app
        .send(raw_request(
            &format!("/api/v1/uploads/{}", two_id),
            &app.token,
            b"def",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let chunked = read_json(response).await;

    // Identity fields differ; everything derived from the bytes matches.
    assert_eq!(whole["size"], chunked["size"]);
    assert_eq!(whole["name"], chunked["name"]);
    assert_eq!(whole["mime_type"], chunked["mime_type"]);
    assert_eq!(whole["extension"], chunked["extension"]);
}

#[tokio::test]
async fn test_append_after_complete_is_idempotent() {
    let app = TestApp::new().await;
    let session = create_session(&app, 5).await;
    let id = session["id"].as_str().unwrap().to_string();

    let response = app
        .send(raw_request(
            &format!("/api/v1/uploads/{}", id),
            &app.token,
            b"hello",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = read_json(response).await;

    let response = app
        .send(raw_request(
            &format!("/api/v1/uploads/{}", id),
            &app.token,
            b"ignored trailing data",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = read_json(response).await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["create_at"], second["create_at"]);
    assert_eq!(second["size"], 5);
}

#[tokio::test]
async fn test_declared_length_beyond_remaining_is_rejected() {
    let app = TestApp::new().await;
    let session = create_session(&app, 4).await;
    let id = session["id"].as_str().unwrap().to_string();

    let response = app
        .send(raw_request(
            &format!("/api/v1/uploads/{}", id),
            &app.token,
            b"way too many bytes",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The failed append must not move the offset.
    let response = app
        .send(get_request(&format!("/api/v1/uploads/{}", id), &app.token))
        .await;
    let fetched = read_json(response).await;
    assert_eq!(fetched["file_offset"], 0);
}

#[tokio::test]
async fn test_raw_append_without_content_length_rejected() {
    let app = TestApp::new().await;
    let session = create_session(&app, 10).await;
    let id = session["id"].as_str().unwrap().to_string();

    // A chunked body with no declared length cannot be validated against the
    // session's remaining capacity.
    let chunks: Vec<Result<bytes::Bytes, std::io::Error>> =
        vec![Ok(bytes::Bytes::from_static(b"0123"))];
    let request = axum::http::Request::builder()
        .method("POST")
        .uri(format!("/api/v1/uploads/{}", id))
        .header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", app.token),
        )
        .header(
            axum::http::header::CONTENT_TYPE,
            "application/octet-stream",
        )
        .body(axum::body::Body::from_stream(futures::stream::iter(chunks)))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The rejected append must not move the offset.
    let response = app
        .send(get_request(&format!("/api/v1/uploads/{}", id), &app.token))
        .await;
    let fetched = read_json(response).await;
    assert_eq!(fetched["file_offset"], 0);
}

#[tokio::test]
async fn test_zero_size_session_completes_at_creation() {
    let app = TestApp::new().await;
    let session = create_session(&app, 0).await;
    assert_eq!(session["file_offset"], 0);
    assert_eq!(session["file_size"], 0);

    let id = session["id"].as_str().unwrap().to_string();
    let response = app
        .send(raw_request(
            &format!("/api/v1/uploads/{}", id),
            &app.token,
            b"",
        ))
        .await;
    // Already complete; the append is a no-op returning the file record.
    assert_eq!(response.status(), StatusCode::OK);
    let info = read_json(response).await;
    assert_eq!(info["size"], 0);
}

#[tokio::test]
async fn test_create_requires_channel_membership() {
    let app = TestApp::new().await;
    let foreign_channel = Uuid::new_v4();

    let response = app
        .send(json_request(
            "/api/v1/uploads",
            &app.token,
            create_body(foreign_channel, "notes.txt", 10),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_append_rechecks_permissions() {
    let app = TestApp::new().await;
    let session = create_session(&app, 10).await;
    let id = session["id"].as_str().unwrap().to_string();

    // Membership revoked between create and append.
    app.access.revoke(app.user_id, app.channel_id);

    let response = app
        .send(raw_request(
            &format!("/api/v1/uploads/{}", id),
            &app.token,
            b"0123",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_import_sessions_restricted() {
    let app = TestApp::new().await;
    let import = json!({
        "type": "import",
        "filename": "export.zip",
        "file_size": 100,
    });

    // Ordinary users cannot create import sessions.
    let response = app
        .send(json_request("/api/v1/uploads", &app.token, import.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // System admins can.
    let response = app
        .send(json_request("/api/v1/uploads", &app.admin_token(), import))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let session = read_json(response).await;
    assert_eq!(session["type"], "import");
}

#[tokio::test]
async fn test_import_rejected_on_cloud() {
    let mut config = test_config();
    config.cloud = true;
    let app = TestApp::with_config(config).await;

    let response = app
        .send(json_request(
            "/api/v1/uploads",
            &app.admin_token(),
            json!({
                "type": "import",
                "filename": "export.zip",
                "file_size": 100,
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_feature_flag_disables_uploads() {
    let mut config = test_config();
    config.file_attachments_enabled = false;
    let app = TestApp::with_config(config).await;

    let response = app
        .send(json_request(
            "/api/v1/uploads",
            &app.token,
            create_body(app.channel_id, "notes.txt", 10),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_declared_size_over_cap_rejected() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            "/api/v1/uploads",
            &app.token,
            create_body(app.channel_id, "big.bin", 10 * 1024 * 1024),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_get_restricted_to_owner_or_admin() {
    let app = TestApp::new().await;
    let session = create_session(&app, 10).await;
    let id = session["id"].as_str().unwrap().to_string();

    let stranger = mint_token(Uuid::new_v4(), vec![]);
    let response = app
        .send(get_request(&format!("/api/v1/uploads/{}", id), &stranger))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(get_request(
            &format!("/api/v1/uploads/{}", id),
            &app.admin_token(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let app = TestApp::new().await;
    let response = app
        .send(get_request(
            &format!("/api/v1/uploads/{}", Uuid::new_v4()),
            &app.token,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requests_without_token_are_401() {
    let app = TestApp::new().await;
    let request = axum::http::Request::builder()
        .method("GET")
        .uri(format!("/api/v1/uploads/{}", Uuid::new_v4()))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_multipart_append_uses_first_part() {
    let app = TestApp::new().await;
    let session = create_session(&app, 5).await;
    let id = session["id"].as_str().unwrap().to_string();

    let response = app
        .send(multipart_request(
            &format!("/api/v1/uploads/{}", id),
            &app.token,
            &[Part::file("chunk.bin", b"hello")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let info = read_json(response).await;
    assert_eq!(info["size"], 5);
}

#[tokio::test]
async fn test_session_json_hides_storage_path() {
    let app = TestApp::new().await;
    let session = create_session(&app, 10).await;
    assert!(session.get("path").is_none());
    assert!(session.get("remote_id").is_none());
}
