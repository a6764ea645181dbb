mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

use common::{image_part, registration_fields, TestServer};

const MAX_UPLOAD: usize = 10_000_000;

async fn register_with(server: &TestServer, email: &str, len: usize, mime: &str) -> Result<(StatusCode, Value)> {
    let form = registration_fields(email).part("profilePicture", image_part(len, "foto.png", mime)?);
    let res = server
        .client
        .post(server.api("/auth/register"))
        .multipart(form)
        .send()
        .await?;
    Ok((res.status(), res.json().await?))
}

#[tokio::test]
async fn file_of_exactly_the_maximum_is_accepted() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (status, body) = register_with(&server, "ana@example.com", MAX_UPLOAD, "image/png").await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(server.relay.upload_count(), 1);
    Ok(())
}

#[tokio::test]
async fn file_one_byte_over_the_maximum_is_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (status, body) = register_with(&server, "ana@example.com", MAX_UPLOAD + 1, "image/png").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["profilePicture"].is_string());

    // rejected before the handler: nothing relayed, nothing created
    assert_eq!(server.relay.upload_count(), 0);
    assert_eq!(server.identity.account_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn only_png_and_jpeg_are_accepted() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = register_with(&server, "ana@example.com", 64, "image/gif").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["profilePicture"].is_string());

    let (status, _) = register_with(&server, "ana@example.com", 64, "image/jpg").await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = register_with(&server, "luis@example.com", 64, "image/jpeg").await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn relay_failure_aborts_registration() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.relay.set_failing(true);

    let (status, body) = register_with(&server, "ana@example.com", 64, "image/png").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "INTERNAL_SERVER_ERROR");
    assert_eq!(server.identity.account_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() -> Result<()> {
    let server = TestServer::spawn_with(&[
        ("API_MAX_UPLOAD_BYTES", "4096"),
        ("API_MAX_REQUEST_SIZE_BYTES", "4096"),
    ])
    .await?;

    let (status, body) = register_with(&server, "ana@example.com", 8192, "image/png").await?;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "PAYLOAD_TOO_LARGE");
    Ok(())
}
