use axum::extract::{Extension, State};
use chrono::Utc;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::AccountContext;
use crate::models::{
    Account, CreateAccount, Entitlement, SubscriptionState, derive_subscription_state,
};
use crate::util::{generate_api_token, hash_token};

#[derive(Debug, Serialize)]
pub struct AccountCreated {
    pub account: Account,
    /// Shown exactly once; only its hash is stored.
    pub api_token: String,
}

/// POST /accounts (admin). Onboard a marketplace account.
pub async fn create_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    Json(input): Json<CreateAccount>,
) -> Result<Json<AccountCreated>> {
    ctx.require_admin()?;
    input.validate()?;

    let conn = state.db.get()?;

    if queries::get_account_by_email(&conn, &input.email)?.is_some() {
        return Err(AppError::invalid_field("email", "already registered"));
    }

    let api_token = generate_api_token();
    let account = queries::create_account(&conn, &input, &hash_token(&api_token))?;

    tracing::info!(
        account_id = %account.id,
        role = account.role.as_ref(),
        admin = %ctx.account.id,
        "Account created"
    );

    Ok(Json(AccountCreated { account, api_token }))
}

#[derive(Debug, Serialize)]
pub struct AccountProfile {
    #[serde(flatten)]
    pub account: Account,
    pub entitlement: Option<Entitlement>,
    pub subscription_state: SubscriptionState,
}

/// GET /accounts/me: the caller's account with its entitlement and the
/// derived subscription state. The state is recomputed from the current
/// record and end timestamp on every read; the counters alone are never
/// authoritative.
pub async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<AccountProfile>> {
    let conn = state.db.get()?;

    // The context was loaded by the auth middleware at request start;
    // re-read so the profile reflects this instant.
    let account = queries::get_account_by_id(&conn, &ctx.account.id)?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    let record = match &account.current_subscription_id {
        Some(sub_id) => queries::get_subscription_by_id(&conn, sub_id)?,
        None => None,
    };

    let now = Utc::now().timestamp();
    let subscription_state =
        derive_subscription_state(record.as_ref(), account.subscription_end_at, now);

    Ok(Json(AccountProfile {
        entitlement: account.entitlement(),
        subscription_state,
        account,
    }))
}
