mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{image_part, profile_update, registration_fields, TestServer};

#[tokio::test]
async fn public_listing_hides_sensitive_fields_and_inactive_users() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (admin_uid, admin_token) = server.admin("admin@example.com").await?;
    let (ana_uid, _) = server.user("ana@example.com").await?;
    server.user("luis@example.com").await?;

    let res = server
        .client
        .delete(server.api(&format!("/user/{}", ana_uid)))
        .bearer_auth(&admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.client.get(server.api("/user/")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    for user in users {
        assert!(user.get("email").is_none());
        assert!(user.get("role").is_none());
        assert!(user.get("status").is_none());
        assert_ne!(user["uid"], ana_uid.as_str());
    }
    assert!(users.iter().any(|u| u["uid"] == admin_uid.as_str()));
    Ok(())
}

#[tokio::test]
async fn full_listing_is_admin_only() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, admin_token) = server.admin("admin@example.com").await?;
    let (_, user_token) = server.user("ana@example.com").await?;

    let res = server.client.get(server.api("/user/full")).bearer_auth(&user_token).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "FORBIDDEN");

    let res = server.client.get(server.api("/user/full")).bearer_auth(&admin_token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u["email"].is_string() && u["role"].is_string()));
    Ok(())
}

#[tokio::test]
async fn get_user_by_id() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (uid, token) = server.user("ana@example.com").await?;

    let res = server.client.get(server.api(&format!("/user/{}", uid))).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["uid"], uid.as_str());
    assert_eq!(body["user"]["email"], "ana@example.com");
    assert_eq!(body["user"]["status"], true);

    let res = server.client.get(server.api("/user/missing")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn users_edit_only_their_own_profile() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (ana_uid, ana_token) = server.user("ana@example.com").await?;
    let (luis_uid, _) = server.user("luis@example.com").await?;

    let res = server
        .client
        .put(server.api(&format!("/user/updateUser/{}", luis_uid)))
        .bearer_auth(&ana_token)
        .json(&profile_update("luis@example.com", "Hackeado"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .client
        .put(server.api(&format!("/user/updateUser/{}", ana_uid)))
        .bearer_auth(&ana_token)
        .json(&profile_update("ana@example.com", "Nueva frase"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["frase"], "Nueva frase");
    // picture from registration is kept
    assert!(body["user"]["profilePicture"].is_string());
    Ok(())
}

#[tokio::test]
async fn update_with_missing_fields_is_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (uid, token) = server.user("ana@example.com").await?;

    let res = server
        .client
        .put(server.api(&format!("/user/updateUser/{}", uid)))
        .bearer_auth(&token)
        .json(&json!({ "name": "Ana" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["surname"].is_string());
    assert!(body["field_errors"]["frase"].is_string());
    Ok(())
}

#[tokio::test]
async fn only_admins_change_role_and_status() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, admin_token) = server.admin("admin@example.com").await?;
    let (uid, user_token) = server.user("ana@example.com").await?;
    let url = server.api(&format!("/user/updateUser/{}", uid));

    let mut promote = profile_update("ana@example.com", "Hasta pronto");
    promote["role"] = json!("ADMIN");

    let res = server.client.put(&url).bearer_auth(&user_token).json(&promote).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.client.put(&url).bearer_auth(&admin_token).json(&promote).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["role"], "ADMIN");

    // the promoted user now passes ADMIN gates with the same token
    let res = server.client.get(server.api("/user/full")).bearer_auth(&user_token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let mut bad_role = profile_update("ana@example.com", "Hasta pronto");
    bad_role["role"] = json!("admin");
    let res = server.client.put(&url).bearer_auth(&admin_token).json(&bad_role).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn update_with_new_picture_over_multipart() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (uid, token) = server.user("ana@example.com").await?;

    let form = registration_fields("ana@example.com").part("profilePicture", image_part(128, "nueva.jpg", "image/jpeg")?);
    let res = server
        .client
        .put(server.api(&format!("/user/updateUser/{}", uid)))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let picture = body["user"]["profilePicture"].as_str().unwrap();
    assert!(picture.contains("nueva"));
    Ok(())
}

#[tokio::test]
async fn deactivation_is_idempotent_and_blocks_the_account() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, admin_token) = server.admin("admin@example.com").await?;
    let (uid, user_token) = server.user("ana@example.com").await?;
    let url = server.api(&format!("/user/{}", uid));

    // USER cannot deactivate
    let res = server.client.delete(&url).bearer_auth(&user_token).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    for _ in 0..2 {
        let res = server.client.delete(&url).bearer_auth(&admin_token).send().await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await?;
        assert_eq!(body["user"]["status"], false);
    }

    // token still verifies, the account is refused
    let res = server.client.get(&url).bearer_auth(&user_token).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "ACCOUNT_DEACTIVATED");

    // the credential itself survives
    assert_eq!(server.identity.account_count().await, 2);

    let res = server.client.delete(server.api("/user/missing")).bearer_auth(&admin_token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn password_reset_does_not_reveal_registration() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.register("ana@example.com").await?;

    for email in ["ana@example.com", "nobody@example.com"] {
        let res = server
            .client
            .post(server.api("/user/reset-password"))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
    }
    assert_eq!(server.identity.reset_requests().await, vec!["ana@example.com".to_string()]);

    let res = server
        .client
        .post(server.api("/user/reset-password"))
        .json(&json!({ "email": "not-an-email" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
