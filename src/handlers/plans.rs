use std::collections::BTreeMap;

use axum::extract::{Extension, State};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, FieldViolation, Result};
use crate::extractors::Json;
use crate::middleware::AccountContext;
use crate::models::{AccountRole, AccountType, Plan, UpsertPlanEntry};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TierInfo {
    pub amount: i64,
    pub duration_days: i32,
}

/// Plans grouped by account type, then tier, matching the shape the
/// marketplace clients consume.
pub type TierCatalog = BTreeMap<String, BTreeMap<String, TierInfo>>;

fn group_plans(plans: Vec<Plan>) -> TierCatalog {
    let mut catalog = TierCatalog::new();
    for plan in plans {
        catalog
            .entry(plan.account_type.as_ref().to_string())
            .or_default()
            .insert(
                plan.tier.as_ref().to_string(),
                TierInfo {
                    amount: plan.amount,
                    duration_days: plan.duration_days,
                },
            );
    }
    catalog
}

/// GET /subscriptions/tiers
///
/// Admins see the whole catalog; resellers see only reseller plans.
/// Store owners have no browse path: their tier is priced at
/// subscribe-time only.
pub async fn get_tiers(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<TierCatalog>> {
    let conn = state.db.get()?;

    let plans = match ctx.account.role {
        AccountRole::Admin => queries::list_plans(&conn)?,
        AccountRole::Reseller => queries::list_plans_for_type(&conn, AccountType::Reseller)?,
        AccountRole::StoreOwner => {
            return Err(AppError::Forbidden(
                "Only admins and resellers can view subscription tiers".into(),
            ));
        }
    };

    Ok(Json(group_plans(plans)))
}

#[derive(Debug, Deserialize)]
pub struct UpsertTiersBody {
    pub tiers: Vec<UpsertPlanEntry>,
}

#[derive(Debug, Serialize)]
pub struct UpsertTiersResponse {
    pub message: String,
    pub data: TierCatalog,
}

/// PUT /subscriptions/tiers (admin)
///
/// Idempotent upsert keyed by (account_type, tier). Every invalid entry
/// is reported before anything is written.
pub async fn upsert_tiers(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    Json(body): Json<UpsertTiersBody>,
) -> Result<Json<UpsertTiersResponse>> {
    ctx.require_admin()?;

    if body.tiers.is_empty() {
        return Err(AppError::invalid_field("tiers", "must not be empty"));
    }

    let mut violations: Vec<FieldViolation> = Vec::new();
    for (idx, entry) in body.tiers.iter().enumerate() {
        if let Err(AppError::Validation(entry_violations)) = entry.validate() {
            violations.extend(entry_violations.into_iter().map(|v| {
                FieldViolation::new(format!("tiers[{idx}].{}", v.field), v.message)
            }));
        }
    }
    if !violations.is_empty() {
        return Err(AppError::Validation(violations));
    }

    let conn = state.db.get()?;
    for entry in &body.tiers {
        queries::upsert_plan(&conn, entry)?;
    }

    tracing::info!(
        count = body.tiers.len(),
        admin = %ctx.account.id,
        "Subscription tiers updated"
    );

    let catalog = group_plans(queries::list_plans(&conn)?);
    Ok(Json(UpsertTiersResponse {
        message: "Subscription tiers updated successfully".into(),
        data: catalog,
    }))
}
