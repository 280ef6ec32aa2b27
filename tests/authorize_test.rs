mod common;

use axum::http::StatusCode;
use common::*;
use serial_test::serial;
use url::Url;

fn authorize_uri(params: &[(&str, &str)]) -> String {
    format!("/oauth/authorize?{}", form_body(params))
}

fn base_params<'a>() -> Vec<(&'a str, &'a str)> {
    vec![
        ("client_id", CLIENT_ID),
        ("response_type", "code"),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
    ]
}

#[tokio::test]
#[serial]
async fn test_authorize_without_session_redirects_to_signin() {
    let app = TestApp::new().await;
    let query = form_body(&base_params());

    let resp = app.get(&format!("/oauth/authorize?{query}"), &[]).await;
    resp.assert_status(StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some(format!("/signin?{query}").as_str()));
}

#[tokio::test]
#[serial]
async fn test_authorize_with_unknown_session_redirects_to_signin() {
    let app = TestApp::new().await;
    let resp = app
        .get(&authorize_uri(&base_params()), &[("Cookie", "_SID=missing")])
        .await;
    resp.assert_status(StatusCode::FOUND);
    assert!(resp.location.unwrap().starts_with("/signin?"));
}

#[tokio::test]
#[serial]
async fn test_authorize_with_session_redirects_with_code_and_state() {
    let app = TestApp::new().await;
    let sid = app.create_session(USER_ID).await;
    let cookie = format!("_SID={sid}");

    let resp = app
        .get(&authorize_uri(&base_params()), &[("Cookie", cookie.as_str())])
        .await;
    resp.assert_status(StatusCode::FOUND);

    let location = Url::parse(&resp.location.unwrap()).unwrap();
    assert_eq!(location.host_str(), Some("acme.test"));
    assert_eq!(location.path(), "/cb");
    let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
    assert!(pairs.iter().any(|(k, v)| k == "state" && v == "xyz"));
    let code = pairs.iter().find(|(k, _)| k == "code").map(|(_, v)| v.clone());
    assert!(code.is_some_and(|c| !c.is_empty()));
}

#[tokio::test]
#[serial]
async fn test_authorize_unknown_client_is_direct_error() {
    let app = TestApp::new().await;
    let resp = app
        .get(
            &authorize_uri(&[
                ("client_id", "nobody"),
                ("response_type", "code"),
                ("redirect_uri", REDIRECT_URI),
            ]),
            &[],
        )
        .await;
    resp.assert_error(StatusCode::UNAUTHORIZED, "InvalidClient");
    assert!(resp.location.is_none());
}

#[tokio::test]
#[serial]
async fn test_authorize_unregistered_redirect_is_direct_error() {
    let app = TestApp::new().await;
    let resp = app
        .get(
            &authorize_uri(&[
                ("client_id", CLIENT_ID),
                ("response_type", "code"),
                ("redirect_uri", "https://evil.test/cb"),
            ]),
            &[],
        )
        .await;
    resp.assert_error(StatusCode::BAD_REQUEST, "InvalidRedirectURI");
    assert!(resp.location.is_none());
}

#[tokio::test]
#[serial]
async fn test_authorize_unsupported_response_type() {
    let app = TestApp::new().await;
    let resp = app
        .get(
            &authorize_uri(&[
                ("client_id", CLIENT_ID),
                ("response_type", "id_token"),
                ("redirect_uri", REDIRECT_URI),
            ]),
            &[],
        )
        .await;
    resp.assert_error(StatusCode::BAD_REQUEST, "UnsupportedResponseType");
}

#[tokio::test]
#[serial]
async fn test_authorize_rejects_unknown_pkce_method() {
    let app = TestApp::new().await;
    let sid = app.create_session(USER_ID).await;
    let cookie = format!("_SID={sid}");
    let mut params = base_params();
    params.push(("code_challenge", "abc"));
    params.push(("code_challenge_method", "S512"));

    let resp = app
        .get(&authorize_uri(&params), &[("Cookie", cookie.as_str())])
        .await;
    resp.assert_error(StatusCode::BAD_REQUEST, "InvalidRequest");
}

#[tokio::test]
#[serial]
async fn test_implicit_flow_returns_token_in_fragment() {
    let app = TestApp::new().await;
    let sid = app.create_session(USER_ID).await;
    let cookie = format!("_SID={sid}");

    let resp = app
        .get(
            &authorize_uri(&[
                ("client_id", CLIENT_ID),
                ("response_type", "token"),
                ("redirect_uri", REDIRECT_URI),
                ("scope", "openid"),
                ("state", "abc"),
            ]),
            &[("Cookie", cookie.as_str())],
        )
        .await;
    resp.assert_status(StatusCode::FOUND);

    let location = Url::parse(&resp.location.unwrap()).unwrap();
    assert!(location.query().is_none());
    let fragment = location.fragment().expect("fragment");
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(fragment.as_bytes())
        .into_owned()
        .collect();
    let get = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    assert_eq!(get("token_type"), Some("Bearer"));
    assert_eq!(get("expires_in"), Some("3600"));
    assert_eq!(get("scope"), Some("openid"));
    assert_eq!(get("state"), Some("abc"));

    let access_token = get("access_token").expect("access_token").to_string();
    let claims: oauth2_server::auth::minter::AccessTokenClaims =
        app.decode_with_jwks(&access_token).await.unwrap();
    assert_eq!(claims.sub, USER_ID);
}

#[tokio::test]
#[serial]
async fn test_unknown_tenant_is_not_found() {
    let app = TestApp::new().await;
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(authorize_uri(&base_params()))
        .header("Host", "globex.auth.test")
        .body(axum::body::Body::empty())
        .unwrap();

    let resp = app.request(req).await;
    resp.assert_error(StatusCode::NOT_FOUND, "TenantNotFound");
}
