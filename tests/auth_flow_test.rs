//! Login, signup and session lifecycle

mod common;

use common::{client_for, json_response};
use cvforge::auth::AuthState;
use cvforge::error::{ApiError, ErrorKind};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer};

#[tokio::test]
async fn test_login_stores_token_and_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "sam@example.com", "password": "hunter2"})))
        .respond_with(json_response(
            200,
            json!({
                "success": true,
                "data": {
                    "token": "jwt-1",
                    "user": {"_id": "u1", "name": "Sam", "email": "sam@example.com"}
                }
            }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let session = client.login("sam@example.com", "hunter2").await.unwrap();

    assert_eq!(session.token, "jwt-1");
    assert_eq!(session.user_id.as_deref(), Some("u1"));
    assert_eq!(session.display_name.as_deref(), Some("Sam"));
    assert_eq!(client.session().tokens().get().await.as_deref(), Some("jwt-1"));
    assert!(client.session().state().is_signed_in());
}

#[tokio::test]
async fn test_login_accepts_top_level_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(json_response(200, json!({"success": true, "token": "jwt-2"})))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let session = client.login("sam@example.com", "pw").await.unwrap();
    assert_eq!(session.token, "jwt-2");
    assert_eq!(session.email.as_deref(), Some("sam@example.com"));
}

#[tokio::test]
async fn test_rejected_login_is_credential_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(json_response(
            401,
            json!({"success": false, "message": "Invalid email or password"}),
        ))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let err = client.login("sam@example.com", "wrong").await.unwrap_err();

    assert_eq!(err, ApiError::Credential("Invalid email or password".to_string()));
    assert!(client.session().tokens().get().await.is_none());
    assert_eq!(client.session().state(), AuthState::SignedOut);
}

#[tokio::test]
async fn test_success_false_is_credential_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(json_response(200, json!({"success": false})))
        .mount(&server)
        .await;

    let err = client_for(&server.uri())
        .login("sam@example.com", "pw")
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Credential("Login failed".to_string()));
}

#[tokio::test]
async fn test_server_fault_is_not_a_credential_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(json_response(500, json!({"message": "boom"})))
        .mount(&server)
        .await;

    let err = client_for(&server.uri())
        .login("sam@example.com", "pw")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Request);
}

#[tokio::test]
async fn test_empty_credentials_never_reach_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(json_response(200, json!({"token": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server.uri()).login("", "pw").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_signup_uses_register_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(
            json!({"name": "Sam", "email": "sam@example.com", "password": "pw"}),
        ))
        .respond_with(json_response(201, json!({"success": true, "data": {"token": "jwt-3"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let session = client.signup("Sam", "sam@example.com", "pw").await.unwrap();
    assert_eq!(session.token, "jwt-3");
    assert_eq!(session.display_name.as_deref(), Some("Sam"));
}

#[tokio::test]
async fn test_logout_clears_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(json_response(200, json!({"token": "jwt-4"})))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    client.login("sam@example.com", "pw").await.unwrap();
    client.logout().await.unwrap();

    assert!(client.session().tokens().get().await.is_none());
    assert!(client.whoami().await.is_none());
    assert_eq!(client.session().state(), AuthState::SignedOut);
}
