//! Shared helpers for integration tests.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use bazaar::db::{AppState, init_schema, new_pool, queries};
use bazaar::models::{Account, AccountRole, CreateAccount};
use bazaar::notify::Notifier;
use bazaar::util::{generate_api_token, hash_token};

/// A fresh app state over a temp-file database, schema applied and
/// default plans seeded. Keep the returned file alive for the test's
/// duration or the database vanishes underneath the pool.
pub fn create_test_state() -> (AppState, NamedTempFile) {
    let db_file = NamedTempFile::new().unwrap();
    let pool = new_pool(db_file.path().to_str().unwrap()).unwrap();

    {
        let conn = pool.get().unwrap();
        init_schema(&conn).unwrap();
        queries::seed_default_plans(&conn).unwrap();
    }

    let state = AppState {
        db: pool,
        base_url: "http://localhost:3000".into(),
        dev_mode: true,
        notifier: Notifier::disabled(),
    };
    (state, db_file)
}

pub fn app(state: AppState) -> Router {
    bazaar::handlers::router(state)
}

/// Create an account directly in the database, returning it with its
/// plaintext bearer token.
pub fn create_test_account(
    state: &AppState,
    role: AccountRole,
    email: &str,
) -> (Account, String) {
    let token = generate_api_token();
    let conn = state.db.get().unwrap();
    let account = queries::create_account(
        &conn,
        &CreateAccount {
            email: email.into(),
            full_name: "Test Account".into(),
            role,
        },
        &hash_token(&token),
    )
    .unwrap();
    (account, token)
}

pub async fn request(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app(state.clone()).oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert status and decode the JSON body in one go.
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}

pub fn valid_payment() -> serde_json::Value {
    serde_json::json!({
        "card_number": "4242424242424242",
        "card_holder": "Ada Lovelace",
        "expiry_month": "09",
        "expiry_year": "2030",
        "cvc": "123"
    })
}

pub fn subscribe_body(tier: &str) -> serde_json::Value {
    serde_json::json!({
        "tier": tier,
        "payment_method": valid_payment()
    })
}
