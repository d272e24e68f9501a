use axum::extract::{Extension, Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries::ReconcileOutcome;
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::AccountContext;
use crate::models::{
    Account, AccountType, Entitlement, NotificationKind, PaymentMethod, PlanTier,
    SubscriptionRecord,
};
use crate::pagination::{Paginated, PaginationQuery};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub tier: PlanTier,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub message: String,
    pub subscription: SubscriptionRecord,
    pub entitlement: Option<Entitlement>,
}

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2026")
fn format_date(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// The account type as a notification category, "system" for admins.
fn category_for(account: &Account) -> &'static str {
    match account.role.subscribable_type() {
        Some(AccountType::Reseller) => "reseller",
        Some(AccountType::StoreOwner) => "store_owner",
        None => "system",
    }
}

/// POST /subscriptions/subscribe
///
/// Payment shape is checked before storage is touched; the card number
/// and CVC are dropped once validation passes. Record insert, account
/// update, and order-id reservation commit atomically; the notification
/// goes out after the commit.
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>> {
    request.payment_method.validate()?;
    let payment = request.payment_method.summary();

    let now = Utc::now().timestamp();
    let mut conn = state.db.get()?;
    let (record, account) =
        queries::subscribe_atomic(&mut conn, &ctx.account.id, request.tier, &payment, now)?;

    let notification = queries::create_notification(
        &conn,
        &account.id,
        NotificationKind::Subscribed,
        "Subscription Confirmation",
        &format!(
            "Subscribed to the {} plan. Your subscription runs until {}.",
            record.tier.as_ref(),
            format_date(
                record.started_at + (record.duration_days as i64) * crate::util::SECONDS_PER_DAY
            )
        ),
        category_for(&account),
    )?;
    drop(conn);
    state.notifier.deliver(&account, &notification).await;

    tracing::info!(
        account_id = %account.id,
        order_id = %record.order_id,
        tier = record.tier.as_ref(),
        "Subscription created"
    );

    Ok(Json(SubscribeResponse {
        message: format!("Subscribed to the {} plan successfully", record.tier.as_ref()),
        entitlement: account.entitlement(),
        subscription: record,
    }))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: String,
    pub subscription: SubscriptionRecord,
}

/// POST /subscriptions/cancel
///
/// First call terminates the current subscription; an immediate second
/// call is a conflict, not a silent success.
pub async fn cancel(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<CancelResponse>> {
    let now = Utc::now().timestamp();
    let mut conn = state.db.get()?;
    let (record, account) = queries::cancel_atomic(&mut conn, &ctx.account.id, now)?;

    let notification = queries::create_notification(
        &conn,
        &account.id,
        NotificationKind::Cancelled,
        "Subscription Cancelled",
        "Your subscription has been cancelled.",
        category_for(&account),
    )?;
    drop(conn);
    state.notifier.deliver(&account, &notification).await;

    tracing::info!(
        account_id = %account.id,
        order_id = %record.order_id,
        "Subscription cancelled"
    );

    Ok(Json(CancelResponse {
        message: "Subscription cancelled successfully".into(),
        subscription: record,
    }))
}

/// GET /subscriptions: the caller's purchase history, newest first.
pub async fn my_subscriptions(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<Vec<SubscriptionRecord>>> {
    let conn = state.db.get()?;
    let subscriptions = queries::list_subscriptions_for_account(&conn, &ctx.account.id)?;
    Ok(Json(subscriptions))
}

/// GET /subscriptions/all (admin): every account's history, paginated.
pub async fn all_subscriptions(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<SubscriptionRecord>>> {
    ctx.require_admin()?;

    let limit = query.limit();
    let offset = query.offset();
    let conn = state.db.get()?;
    let (items, total) = queries::list_subscriptions_paginated(&conn, limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

#[derive(Debug, Deserialize)]
pub struct ManageCountsRequest {
    pub account_id: String,
}

#[derive(Debug, Serialize)]
pub struct ManageCountsResponse {
    pub outcome: &'static str,
    pub entitlement: Option<Entitlement>,
}

/// PUT /subscriptions/manage-counts (admin)
///
/// Reconciliation path for counter drift: recomputes the target
/// account's entitlement from its current record, or resets it when no
/// live subscription backs it (including lazily-expired ones).
pub async fn manage_counts(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    Json(request): Json<ManageCountsRequest>,
) -> Result<Json<ManageCountsResponse>> {
    ctx.require_admin()?;

    let now = Utc::now().timestamp();
    let mut conn = state.db.get()?;
    let outcome = queries::reconcile_counts_atomic(&mut conn, &request.account_id, now)?;

    let (response, account, kind, heading, content) = match outcome {
        ReconcileOutcome::Updated {
            account,
            entitlement,
        } => (
            ManageCountsResponse {
                outcome: "updated",
                entitlement: Some(entitlement),
            },
            account,
            NotificationKind::EntitlementUpdated,
            "Entitlement Updated",
            "Your subscription counters have been recalculated.".to_string(),
        ),
        ReconcileOutcome::Reset { account } => (
            ManageCountsResponse {
                outcome: "reset",
                entitlement: account.entitlement(),
            },
            account,
            NotificationKind::EntitlementReset,
            "Entitlement Reset",
            "Your subscription counters have been reset.".to_string(),
        ),
    };

    let notification = queries::create_notification(
        &conn,
        &account.id,
        kind,
        heading,
        &content,
        category_for(&account),
    )?;
    drop(conn);
    state.notifier.deliver(&account, &notification).await;

    tracing::info!(
        account_id = %account.id,
        outcome = response.outcome,
        admin = %ctx.account.id,
        "Subscription counts reconciled"
    );

    Ok(Json(response))
}
