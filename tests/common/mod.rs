#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use migration::MigratorTrait;
use oauth2_server::config::Config;
use oauth2_server::db::models::{AccountType, Session};
use oauth2_server::db::Store;
use oauth2_server::routes::create_router;
use oauth2_server::seed::{self, NewAccount, NewClient};
use oauth2_server::AppState;
use sea_orm::Database;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

pub const TENANT: &str = "acme";
pub const HOST: &str = "acme.auth.test";
pub const CLIENT_ID: &str = "c1";
pub const CLIENT_SECRET: &str = "s1";
pub const REDIRECT_URI: &str = "https://acme.test/cb";
pub const USER_ID: &str = "u1";
pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "Password1!";
pub const SERVICE_ACCOUNT_ID: &str = "svc-acme";

// ─── TestResponse ────────────────────────────────────────────────────────────

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    body_bytes: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).to_string()
    }

    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body_bytes).unwrap_or_else(|e| {
            panic!(
                "Failed to deserialize response as {}: {e}\nBody: {}",
                std::any::type_name::<T>(),
                self.text()
            )
        })
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status, expected,
            "Expected status {expected}, got {}. Body: {}",
            self.status,
            self.text()
        );
    }

    pub fn assert_error(&self, expected: StatusCode, name: &str) {
        self.assert_status(expected);
        let body: serde_json::Value = self.json();
        assert_eq!(body["error"]["name"], name, "Body: {}", self.text());
        assert_eq!(body["error"]["status"], expected.as_u16());
    }
}

// ─── TestApp ─────────────────────────────────────────────────────────────────

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        key_encryption_key: base64::engine::general_purpose::STANDARD.encode([42u8; 32]),
        issuer_url_template: "https://{tenant}.auth.test".to_string(),
        signin_path: "/signin".to_string(),
        session_cookie_name: "_SID".to_string(),
        authorization_code_ttl_secs: 600,
        refresh_token_ttl_days: 7,
        retired_key_ttl_days: 7,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
    }
}

impl TestApp {
    /// Fixture tenant on the relational backend over in-memory SQLite.
    pub async fn new() -> Self {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory SQLite");

        migration::Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        Self::with_store(Store::relational(db)).await
    }

    pub async fn in_memory() -> Self {
        Self::with_store(Store::in_memory()).await
    }

    pub async fn with_store(store: Store) -> Self {
        let state = AppState::new(store, test_config()).expect("Failed to build state");
        let router = create_router(state.clone());
        let app = Self { router, state };
        app.seed_fixtures().await;
        app
    }

    async fn seed_fixtures(&self) {
        seed::provision_tenant(&self.state, TENANT, "Acme Corp")
            .await
            .expect("Failed to provision tenant");

        seed::create_account(
            &self.state,
            TENANT,
            NewAccount {
                id: Some(USER_ID.to_string()),
                username: USERNAME.to_string(),
                password: Some(PASSWORD.to_string()),
                email: Some("alice@acme.test".to_string()),
                given_name: "Alice".to_string(),
                family_name: "Liddell".to_string(),
                roles: vec!["admin".to_string()],
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create user");

        seed::create_account(
            &self.state,
            TENANT,
            NewAccount {
                id: Some(SERVICE_ACCOUNT_ID.to_string()),
                account_type: Some(AccountType::ServiceAccount),
                username: "service-account@acme".to_string(),
                given_name: "Service".to_string(),
                family_name: "Account".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create service account");

        seed::register_client(
            &self.state,
            TENANT,
            NewClient {
                name: "Acme Web".to_string(),
                client_id: Some(CLIENT_ID.to_string()),
                client_secret: Some(CLIENT_SECRET.to_string()),
                redirect_uris: vec![REDIRECT_URI.to_string()],
                grant_types: [
                    "authorization_code",
                    "client_credentials",
                    "refresh_token",
                    "password",
                    "implicit",
                ]
                .iter()
                .map(|g| g.to_string())
                .collect(),
                service_account_id: Some(SERVICE_ACCOUNT_ID.to_string()),
                access_token_expires_in: 3600,
                ..Default::default()
            },
        )
        .await
        .expect("Failed to register client");
    }

    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot failed");

        let status = resp.status();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body_bytes = resp
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            location,
            body_bytes,
        }
    }

    // ── Request helpers ──────────────────────────────────────────────────

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri).header("Host", HOST);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Form POST authenticated with the fixture client's Basic credentials.
    pub async fn post_form(&self, uri: &str, params: &[(&str, &str)]) -> TestResponse {
        self.post_form_as(uri, params, Some((CLIENT_ID, CLIENT_SECRET)))
            .await
    }

    pub async fn post_form_as(
        &self,
        uri: &str,
        params: &[(&str, &str)],
        basic: Option<(&str, &str)>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Host", HOST)
            .header("Content-Type", "application/x-www-form-urlencoded");
        if let Some((id, secret)) = basic {
            builder = builder.header("Authorization", basic_auth_header(id, secret));
        }
        self.request(builder.body(Body::from(form_body(params))).unwrap())
            .await
    }

    pub async fn token(&self, params: &[(&str, &str)]) -> TestResponse {
        self.post_form("/oauth/token", params).await
    }

    // ── Flow helpers ─────────────────────────────────────────────────────

    /// Insert a live browser session for `user_id` and return its id.
    pub async fn create_session(&self, user_id: &str) -> String {
        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: TENANT.to_string(),
            user_id: user_id.to_string(),
            ip_address: Some("127.0.0.1".to_string()),
            user_agent: None,
            expires_at: (now + Duration::hours(12)).naive_utc(),
            created_at: now.naive_utc(),
        };
        self.state
            .store
            .sessions
            .create(&session)
            .await
            .expect("Failed to create session");
        session.id
    }

    /// Run `/oauth/authorize` with a signed-in session and return the code.
    pub async fn authorize_code(&self, extra: &[(&str, &str)]) -> String {
        let sid = self.create_session(USER_ID).await;
        let mut params = vec![
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("redirect_uri", REDIRECT_URI),
        ];
        params.extend_from_slice(extra);

        let uri = format!("/oauth/authorize?{}", form_body(&params));
        let cookie = format!("_SID={sid}");
        let resp = self.get(&uri, &[("Cookie", cookie.as_str())]).await;
        resp.assert_status(StatusCode::FOUND);

        let location = url::Url::parse(resp.location.as_deref().expect("missing Location"))
            .expect("Location is not a URL");
        location
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
            .expect("no code in redirect")
    }

    pub async fn exchange_code(&self, code: &str) -> TestResponse {
        self.token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
        ])
        .await
    }

    pub async fn jwks(&self) -> serde_json::Value {
        let resp = self.get("/.well-known/jwks.json", &[]).await;
        resp.assert_status(StatusCode::OK);
        resp.json()
    }

    /// Verify `token` the way an external resource server would: pick the
    /// JWKS entry by the header `kid` and check the RS256 signature.
    pub async fn decode_with_jwks<T: DeserializeOwned>(
        &self,
        token: &str,
    ) -> Result<T, jsonwebtoken::errors::Error> {
        let jwks = self.jwks().await;
        let kid = decode_header(token)?.kid.expect("token has no kid");
        let jwk = jwks["keys"]
            .as_array()
            .unwrap()
            .iter()
            .find(|k| k["kid"] == kid.as_str())
            .unwrap_or_else(|| panic!("kid {kid} not published"));

        let key = DecodingKey::from_rsa_components(
            jwk["n"].as_str().unwrap(),
            jwk["e"].as_str().unwrap(),
        )?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&["https://acme.auth.test"]);
        validation.validate_aud = false;
        Ok(decode::<T>(token, &key, &validation)?.claims)
    }
}

pub fn basic_auth_header(client_id: &str, secret: &str) -> String {
    let raw = format!("{client_id}:{secret}");
    let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
    format!("Basic {encoded}")
}

pub fn form_body(params: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}
