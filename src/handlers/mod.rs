pub mod accounts;
pub mod notifications;
pub mod plans;
pub mod subscriptions;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::db::AppState;
use crate::middleware::account_auth;

pub fn router(state: AppState) -> Router {
    let authed = Router::new()
        .route(
            "/subscriptions/tiers",
            get(plans::get_tiers).put(plans::upsert_tiers),
        )
        .route("/subscriptions/all", get(subscriptions::all_subscriptions))
        .route(
            "/subscriptions/manage-counts",
            put(subscriptions::manage_counts),
        )
        .route("/subscriptions/subscribe", post(subscriptions::subscribe))
        .route("/subscriptions", get(subscriptions::my_subscriptions))
        .route("/subscriptions/cancel", post(subscriptions::cancel))
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/me", get(accounts::me))
        .route("/notifications", get(notifications::my_notifications))
        .layer(middleware::from_fn_with_state(state.clone(), account_auth));

    Router::new()
        .merge(authed)
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
