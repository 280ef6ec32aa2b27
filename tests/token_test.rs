mod common;

use axum::http::StatusCode;
use base64::Engine;
use common::*;
use oauth2_server::auth::minter::{AccessTokenClaims, IdTokenClaims, TokenResponse};
use serial_test::serial;
use sha2::{Digest, Sha256};

// ─── authorization_code ─────────────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn test_code_exchange_issues_signed_tokens() {
    let app = TestApp::new().await;
    let code = app
        .authorize_code(&[
            ("nonce", "n-0S6"),
            ("scope", "openid profile email offline_access"),
        ])
        .await;

    let resp = app.exchange_code(&code).await;
    resp.assert_status(StatusCode::OK);
    let tokens: TokenResponse = resp.json();

    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.expires_in, 3600);
    assert_eq!(tokens.expires, 3600);
    assert!(tokens.scope.split(' ').any(|s| s == "openid"));
    assert!(tokens.refresh_token.is_some(), "offline_access was requested");

    let id: IdTokenClaims = app.decode_with_jwks(&tokens.id_token).await.unwrap();
    assert_eq!(id.aud, CLIENT_ID);
    assert_eq!(id.sub, USER_ID);
    assert_eq!(id.iss, "https://acme.auth.test");
    assert_eq!(id.name, "Alice Liddell");
    assert_eq!(id.email.as_deref(), Some("alice@acme.test"));
    assert_eq!(id.nonce.as_deref(), Some("n-0S6"));

    let access: AccessTokenClaims = app.decode_with_jwks(&tokens.access_token).await.unwrap();
    assert_eq!(access.aud, CLIENT_ID);
    assert_eq!(access.sub, USER_ID);
    assert_eq!(access.roles, vec!["admin".to_string()]);
    assert_eq!(access.exp - access.iat, 3600);
}

#[tokio::test]
#[serial]
async fn test_code_without_scope_has_no_refresh_token() {
    let app = TestApp::new().await;
    let code = app.authorize_code(&[]).await;

    let resp = app.exchange_code(&code).await;
    resp.assert_status(StatusCode::OK);
    let tokens: TokenResponse = resp.json();

    assert_eq!(tokens.scope, "openid profile email");
    assert!(tokens.refresh_token.is_none());
}

#[tokio::test]
#[serial]
async fn test_code_cannot_be_reused() {
    let app = TestApp::new().await;
    let code = app.authorize_code(&[]).await;

    app.exchange_code(&code).await.assert_status(StatusCode::OK);
    app.exchange_code(&code)
        .await
        .assert_error(StatusCode::BAD_REQUEST, "InvalidGrant");
}

#[tokio::test]
#[serial]
async fn test_code_redirect_uri_must_match() {
    let app = TestApp::new().await;
    let code = app.authorize_code(&[]).await;

    let resp = app
        .token(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", "https://evil.test/cb"),
        ])
        .await;
    resp.assert_error(StatusCode::BAD_REQUEST, "InvalidGrant");

    // A rejected attempt does not burn the code
    app.exchange_code(&code).await.assert_status(StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_unknown_code_is_invalid_grant() {
    let app = TestApp::new().await;
    app.exchange_code("not-a-code")
        .await
        .assert_error(StatusCode::BAD_REQUEST, "InvalidGrant");
}

#[tokio::test]
#[serial]
async fn test_pkce_s256() {
    let app = TestApp::new().await;
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    let challenge =
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier));

    let code = app
        .authorize_code(&[
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "S256"),
        ])
        .await;

    let without_verifier = app.exchange_code(&code).await;
    without_verifier.assert_error(StatusCode::BAD_REQUEST, "InvalidGrant");

    let wrong = app
        .token(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", "wrong-verifier-wrong-verifier-wrong-verifier"),
        ])
        .await;
    wrong.assert_error(StatusCode::BAD_REQUEST, "InvalidGrant");

    let resp = app
        .token(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", verifier),
        ])
        .await;
    resp.assert_status(StatusCode::OK);
}

// ─── client authentication ──────────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn test_wrong_secret_is_invalid_client() {
    let app = TestApp::new().await;
    let resp = app
        .post_form_as(
            "/oauth/token",
            &[("grant_type", "client_credentials")],
            Some((CLIENT_ID, "wrong")),
        )
        .await;
    resp.assert_error(StatusCode::UNAUTHORIZED, "InvalidClient");
}

#[tokio::test]
#[serial]
async fn test_client_credentials_in_form_body() {
    let app = TestApp::new().await;
    let resp = app
        .post_form_as(
            "/oauth/token",
            &[
                ("grant_type", "client_credentials"),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
            ],
            None,
        )
        .await;
    resp.assert_status(StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_missing_credentials_is_invalid_client() {
    let app = TestApp::new().await;
    let resp = app
        .post_form_as("/oauth/token", &[("grant_type", "client_credentials")], None)
        .await;
    resp.assert_error(StatusCode::UNAUTHORIZED, "InvalidClient");
}

#[tokio::test]
#[serial]
async fn test_unsupported_grant_type() {
    let app = TestApp::new().await;
    let resp = app.token(&[("grant_type", "urn:example:magic")]).await;
    resp.assert_error(StatusCode::BAD_REQUEST, "UnsupportedGrantType");
}

#[tokio::test]
#[serial]
async fn test_grant_not_registered_for_client() {
    let app = TestApp::new().await;
    oauth2_server::seed::register_client(
        &app.state,
        TENANT,
        oauth2_server::seed::NewClient {
            client_id: Some("code-only".to_string()),
            client_secret: Some("secret".to_string()),
            redirect_uris: vec![REDIRECT_URI.to_string()],
            grant_types: vec!["authorization_code".to_string()],
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let resp = app
        .post_form_as(
            "/oauth/token",
            &[("grant_type", "client_credentials")],
            Some(("code-only", "secret")),
        )
        .await;
    resp.assert_error(StatusCode::BAD_REQUEST, "UnauthorizedClient");
}

// ─── client_credentials ─────────────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn test_client_credentials_issues_service_account_token() {
    let app = TestApp::new().await;
    let resp = app
        .token(&[("grant_type", "client_credentials"), ("scope", "openid")])
        .await;
    resp.assert_status(StatusCode::OK);
    let tokens: TokenResponse = resp.json();

    assert_eq!(tokens.scope, "openid");
    assert!(tokens.refresh_token.is_none());

    let access: AccessTokenClaims = app.decode_with_jwks(&tokens.access_token).await.unwrap();
    assert_eq!(access.sub, SERVICE_ACCOUNT_ID);
    assert_eq!(access.aud, CLIENT_ID);
}

#[tokio::test]
#[serial]
async fn test_client_credentials_without_scope_has_no_refresh_token() {
    let app = TestApp::new().await;
    let resp = app.token(&[("grant_type", "client_credentials")]).await;
    resp.assert_status(StatusCode::OK);
    let tokens: TokenResponse = resp.json();

    assert_eq!(tokens.scope, "openid profile email");
    assert!(tokens.refresh_token.is_none());
    let body: serde_json::Value = resp.json();
    assert!(body.get("refresh_token").is_none());
}

#[tokio::test]
#[serial]
async fn test_client_credentials_offline_access_issues_refresh_token() {
    let app = TestApp::new().await;
    let resp = app
        .token(&[
            ("grant_type", "client_credentials"),
            ("scope", "openid offline_access unknown"),
        ])
        .await;
    resp.assert_status(StatusCode::OK);
    let tokens: TokenResponse = resp.json();

    assert_eq!(tokens.scope, "openid offline_access");
    assert!(tokens.refresh_token.is_some());
}

// ─── refresh_token ──────────────────────────────────────────────────────────

async fn offline_tokens(app: &TestApp) -> TokenResponse {
    let resp = app
        .token(&[
            ("grant_type", "client_credentials"),
            ("scope", "openid offline_access"),
        ])
        .await;
    resp.assert_status(StatusCode::OK);
    resp.json()
}

#[tokio::test]
#[serial]
async fn test_refresh_rotates_token() {
    let app = TestApp::new().await;
    let first = offline_tokens(&app).await;
    let old = first.refresh_token.unwrap();

    let resp = app
        .token(&[("grant_type", "refresh_token"), ("refresh_token", old.as_str())])
        .await;
    resp.assert_status(StatusCode::OK);
    let second: TokenResponse = resp.json();
    let new = second.refresh_token.expect("rotated refresh token");
    assert_ne!(new, old);
    assert_eq!(second.scope, "openid offline_access");

    // The predecessor is dead, the replacement works
    app.token(&[("grant_type", "refresh_token"), ("refresh_token", old.as_str())])
        .await
        .assert_error(StatusCode::BAD_REQUEST, "InvalidGrant");
    app.token(&[("grant_type", "refresh_token"), ("refresh_token", new.as_str())])
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_refresh_without_rotation_returns_same_token() {
    let app = TestApp::new().await;
    oauth2_server::seed::register_client(
        &app.state,
        TENANT,
        oauth2_server::seed::NewClient {
            client_id: Some("sticky".to_string()),
            client_secret: Some("sticky-secret".to_string()),
            service_account_id: Some(SERVICE_ACCOUNT_ID.to_string()),
            rotate_refresh_tokens: false,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let basic = Some(("sticky", "sticky-secret"));

    let first: TokenResponse = app
        .post_form_as(
            "/oauth/token",
            &[
                ("grant_type", "client_credentials"),
                ("scope", "offline_access"),
            ],
            basic,
        )
        .await
        .json();
    let value = first.refresh_token.unwrap();

    for _ in 0..2 {
        let resp = app
            .post_form_as(
                "/oauth/token",
                &[("grant_type", "refresh_token"), ("refresh_token", value.as_str())],
                basic,
            )
            .await;
        resp.assert_status(StatusCode::OK);
        let tokens: TokenResponse = resp.json();
        assert_eq!(tokens.refresh_token.as_deref(), Some(value.as_str()));
    }
}

#[tokio::test]
#[serial]
async fn test_refresh_token_bound_to_client() {
    let app = TestApp::new().await;
    oauth2_server::seed::register_client(
        &app.state,
        TENANT,
        oauth2_server::seed::NewClient {
            client_id: Some("other".to_string()),
            client_secret: Some("other-secret".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let value = offline_tokens(&app).await.refresh_token.unwrap();
    let resp = app
        .post_form_as(
            "/oauth/token",
            &[("grant_type", "refresh_token"), ("refresh_token", value.as_str())],
            Some(("other", "other-secret")),
        )
        .await;
    resp.assert_error(StatusCode::BAD_REQUEST, "InvalidGrant");
}

// ─── password ───────────────────────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn test_password_grant() {
    let app = TestApp::new().await;
    let resp = app
        .token(&[
            ("grant_type", "password"),
            ("username", USERNAME),
            ("password", PASSWORD),
            ("scope", "offline_access"),
        ])
        .await;
    resp.assert_status(StatusCode::OK);
    let tokens: TokenResponse = resp.json();

    assert_eq!(tokens.scope, "admin offline_access");
    assert!(tokens.refresh_token.is_some());
    let access: AccessTokenClaims = app.decode_with_jwks(&tokens.access_token).await.unwrap();
    assert_eq!(access.sub, USER_ID);
}

#[tokio::test]
#[serial]
async fn test_password_grant_wrong_password() {
    let app = TestApp::new().await;
    let resp = app
        .token(&[
            ("grant_type", "password"),
            ("username", USERNAME),
            ("password", "nope"),
        ])
        .await;
    resp.assert_error(StatusCode::BAD_REQUEST, "InvalidCredential");
}

#[tokio::test]
#[serial]
async fn test_password_grant_rejects_service_account() {
    let app = TestApp::new().await;
    let resp = app
        .token(&[
            ("grant_type", "password"),
            ("username", "service-account@acme"),
            ("password", "anything"),
        ])
        .await;
    resp.assert_error(StatusCode::BAD_REQUEST, "InvalidCredential");
}

// ─── revoke / introspect / userinfo ─────────────────────────────────────────

#[tokio::test]
#[serial]
async fn test_revoked_refresh_token_is_invalid_grant() {
    let app = TestApp::new().await;
    let value = offline_tokens(&app).await.refresh_token.unwrap();

    let resp = app.post_form("/oauth/revoke", &[("token", value.as_str())]).await;
    resp.assert_status(StatusCode::OK);

    app.token(&[("grant_type", "refresh_token"), ("refresh_token", value.as_str())])
        .await
        .assert_error(StatusCode::BAD_REQUEST, "InvalidGrant");

    // Revoking again, or revoking garbage, still succeeds
    app.post_form("/oauth/revoke", &[("token", value.as_str())])
        .await
        .assert_status(StatusCode::OK);
    app.post_form("/oauth/revoke", &[("token", "garbage")])
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_introspect() {
    let app = TestApp::new().await;
    let tokens = offline_tokens(&app).await;

    let resp = app
        .post_form("/oauth/introspect", &[("token", tokens.access_token.as_str())])
        .await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["active"], true);
    assert_eq!(body["sub"], SERVICE_ACCOUNT_ID);
    assert_eq!(body["client_id"], CLIENT_ID);
    assert_eq!(body["scope"], "openid offline_access");

    let resp = app
        .post_form("/oauth/introspect", &[("token", "not.a.jwt")])
        .await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body, serde_json::json!({ "active": false }));
}

#[tokio::test]
#[serial]
async fn test_userinfo() {
    let app = TestApp::new().await;
    let code = app.authorize_code(&[]).await;
    let tokens: TokenResponse = app.exchange_code(&code).await.json();

    let bearer = format!("Bearer {}", tokens.access_token);
    let resp = app
        .get("/oauth/userinfo", &[("Authorization", bearer.as_str())])
        .await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["sub"], USER_ID);
    assert_eq!(body["preferred_username"], USERNAME);
    assert_eq!(body["email"], "alice@acme.test");
    assert_eq!(body["account_type"], "user");

    app.get("/oauth/userinfo", &[])
        .await
        .assert_error(StatusCode::UNAUTHORIZED, "Unauthorized");
}

#[tokio::test]
#[serial]
async fn test_token_response_is_not_cacheable() {
    let app = TestApp::new().await;
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/oauth/token")
        .header("Host", HOST)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("Authorization", basic_auth_header(CLIENT_ID, CLIENT_SECRET))
        .body(axum::body::Body::from("grant_type=client_credentials"))
        .unwrap();

    use tower::ServiceExt;
    let resp = oauth2_server::routes::create_router(app.state.clone())
        .oneshot(req)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["cache-control"], "no-store");
    assert_eq!(resp.headers()["pragma"], "no-cache");
}
