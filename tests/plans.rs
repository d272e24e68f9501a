//! Plan catalog tests: role-gated visibility and admin upserts.

use axum::http::StatusCode;
use bazaar::models::AccountRole;

mod common;
use common::*;

#[tokio::test]
async fn admin_sees_both_account_types() {
    let (state, _db) = create_test_state();
    let (_, token) = create_test_account(&state, AccountRole::Admin, "admin@example.com");

    let response = request(&state, "GET", "/subscriptions/tiers", Some(&token), None).await;
    let body = expect_json(response, StatusCode::OK).await;

    assert!(body.get("reseller").is_some());
    assert!(body.get("store_owner").is_some());
    // Seeded defaults cover every tier.
    assert_eq!(body["reseller"].as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn reseller_sees_only_reseller_plans() {
    let (state, _db) = create_test_state();
    let (_, token) = create_test_account(&state, AccountRole::Reseller, "r@example.com");

    let response = request(&state, "GET", "/subscriptions/tiers", Some(&token), None).await;
    let body = expect_json(response, StatusCode::OK).await;

    assert!(body.get("reseller").is_some());
    assert!(body.get("store_owner").is_none());
}

#[tokio::test]
async fn store_owner_has_no_browse_path() {
    let (state, _db) = create_test_state();
    let (_, token) = create_test_account(&state, AccountRole::StoreOwner, "o@example.com");

    let response = request(&state, "GET", "/subscriptions/tiers", Some(&token), None).await;
    let body = expect_json(response, StatusCode::FORBIDDEN).await;
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn tiers_require_authentication() {
    let (state, _db) = create_test_state();

    let response = request(&state, "GET", "/subscriptions/tiers", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upsert_is_admin_only() {
    let (state, _db) = create_test_state();
    let (_, token) = create_test_account(&state, AccountRole::Reseller, "r@example.com");

    let body = serde_json::json!({
        "tiers": [{ "account_type": "reseller", "tier": "tier1", "amount": 5, "duration_days": 30 }]
    });
    let response = request(&state, "PUT", "/subscriptions/tiers", Some(&token), Some(body)).await;
    let body = expect_json(response, StatusCode::FORBIDDEN).await;
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn negative_amount_is_rejected_zero_is_not() {
    let (state, _db) = create_test_state();
    let (_, token) = create_test_account(&state, AccountRole::Admin, "admin@example.com");

    let bad = serde_json::json!({
        "tiers": [{ "account_type": "reseller", "tier": "tier1", "amount": -1, "duration_days": 30 }]
    });
    let response = request(&state, "PUT", "/subscriptions/tiers", Some(&token), Some(bad)).await;
    let body = expect_json(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(body["error"], "validation");
    assert_eq!(body["fields"][0]["field"], "tiers[0].amount");

    // Boundary: zero is a valid (free) plan.
    let free = serde_json::json!({
        "tiers": [{ "account_type": "reseller", "tier": "tier1", "amount": 0, "duration_days": 30 }]
    });
    let response = request(&state, "PUT", "/subscriptions/tiers", Some(&token), Some(free)).await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["reseller"]["tier1"]["amount"], 0);
}

#[tokio::test]
async fn upsert_reports_every_invalid_entry() {
    let (state, _db) = create_test_state();
    let (_, token) = create_test_account(&state, AccountRole::Admin, "admin@example.com");

    let body = serde_json::json!({
        "tiers": [
            { "account_type": "reseller", "tier": "tier1", "amount": -3, "duration_days": 30 },
            { "account_type": "store_owner", "tier": "tier2", "amount": 10, "duration_days": 0 }
        ]
    });
    let response = request(&state, "PUT", "/subscriptions/tiers", Some(&token), Some(body)).await;
    let body = expect_json(response, StatusCode::UNPROCESSABLE_ENTITY).await;

    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["tiers[0].amount", "tiers[1].duration_days"]);
}

#[tokio::test]
async fn upsert_is_idempotent_and_repricing_updates_in_place() {
    let (state, _db) = create_test_state();
    let (_, token) = create_test_account(&state, AccountRole::Admin, "admin@example.com");

    let body = serde_json::json!({
        "tiers": [{ "account_type": "store_owner", "tier": "tier3", "amount": 99, "duration_days": 60 }]
    });
    for _ in 0..2 {
        let response = request(
            &state,
            "PUT",
            "/subscriptions/tiers",
            Some(&token),
            Some(body.clone()),
        )
        .await;
        let parsed = expect_json(response, StatusCode::OK).await;
        assert_eq!(parsed["data"]["store_owner"]["tier3"]["amount"], 99);
        assert_eq!(parsed["data"]["store_owner"]["tier3"]["duration_days"], 60);
    }

    // Still exactly one entry per (type, tier): the other tiers are the
    // seeded defaults, untouched.
    let response = request(&state, "GET", "/subscriptions/tiers", Some(&token), None).await;
    let catalog = expect_json(response, StatusCode::OK).await;
    assert_eq!(catalog["store_owner"].as_object().unwrap().len(), 3);
}
