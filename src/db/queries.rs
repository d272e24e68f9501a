use chrono::{Datelike, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;
use crate::util::{SubscriptionWindow, generate_api_token, hash_token, normalize_email, slot_limit};

use super::from_row::{
    ACCOUNT_COLS, NOTIFICATION_COLS, PLAN_COLS, SUBSCRIPTION_COLS, query_all, query_one,
};

/// Bounded retries for the order-id reservation race before surfacing
/// a sequence generation error.
const MAX_ORDER_ID_ATTEMPTS: u32 = 5;

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Accounts ============

/// Create an account. Only the token hash is stored; handing the
/// plaintext token to the caller is the HTTP layer's job.
pub fn create_account(
    conn: &Connection,
    input: &CreateAccount,
    api_token_hash: &str,
) -> Result<Account> {
    let id = gen_id();
    let now = now();
    let email = normalize_email(&input.email);

    conn.execute(
        "INSERT INTO accounts (id, email, full_name, role, api_token_hash,
                               total_promotion_slots, used_promotion_slots, total_scan_slots,
                               created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, ?6, ?7)",
        params![
            &id,
            &email,
            &input.full_name,
            input.role.as_ref(),
            api_token_hash,
            now,
            now
        ],
    )?;

    Ok(Account {
        id,
        email,
        full_name: input.full_name.clone(),
        role: input.role,
        api_token_hash: api_token_hash.to_string(),
        current_subscription_id: None,
        subscription_end_at: None,
        total_promotion_slots: 0,
        used_promotion_slots: 0,
        total_scan_slots: 0,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_account_by_id(conn: &Connection, id: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
        &[&id],
    )
}

pub fn get_account_by_email(conn: &Connection, email: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE email = ?1", ACCOUNT_COLS),
        &[&normalize_email(email)],
    )
}

/// Idempotent admin provisioning: creates the admin account if absent
/// and returns it with its one-time plaintext token. An existing account
/// with that email short-circuits to `None` without touching anything.
pub fn provision_admin(
    conn: &Connection,
    email: &str,
    full_name: &str,
) -> Result<Option<(Account, String)>> {
    if get_account_by_email(conn, email)?.is_some() {
        return Ok(None);
    }

    let api_token = generate_api_token();
    let account = create_account(
        conn,
        &CreateAccount {
            email: email.to_string(),
            full_name: full_name.to_string(),
            role: AccountRole::Admin,
        },
        &hash_token(&api_token),
    )?;
    Ok(Some((account, api_token)))
}

pub fn get_account_by_token_hash(conn: &Connection, token_hash: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM accounts WHERE api_token_hash = ?1",
            ACCOUNT_COLS
        ),
        &[&token_hash],
    )
}

// ============ Plans ============

/// Idempotent upsert keyed by (account_type, tier). The catalog never
/// shrinks; entries are only ever created or repriced.
pub fn upsert_plan(conn: &Connection, entry: &UpsertPlanEntry) -> Result<Plan> {
    let now = now();

    conn.execute(
        "INSERT INTO plans (id, account_type, tier, amount, duration_days, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (account_type, tier)
         DO UPDATE SET amount = excluded.amount,
                       duration_days = excluded.duration_days,
                       updated_at = excluded.updated_at",
        params![
            gen_id(),
            entry.account_type.as_ref(),
            entry.tier.as_ref(),
            entry.amount,
            entry.duration_days,
            now
        ],
    )?;

    get_plan(conn, entry.account_type, entry.tier)?
        .ok_or_else(|| AppError::Internal("Plan missing after upsert".into()))
}

pub fn get_plan(
    conn: &Connection,
    account_type: AccountType,
    tier: PlanTier,
) -> Result<Option<Plan>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM plans WHERE account_type = ?1 AND tier = ?2",
            PLAN_COLS
        ),
        &[&account_type.as_ref(), &tier.as_ref()],
    )
}

pub fn list_plans(conn: &Connection) -> Result<Vec<Plan>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM plans ORDER BY account_type, tier",
            PLAN_COLS
        ),
        [],
    )
}

pub fn list_plans_for_type(conn: &Connection, account_type: AccountType) -> Result<Vec<Plan>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM plans WHERE account_type = ?1 ORDER BY tier",
            PLAN_COLS
        ),
        &[&account_type.as_ref()],
    )
}

/// Insert catalog defaults for any (account_type, tier) pair that is
/// absent. Existing entries are left untouched, so reseeding at every
/// boot is safe.
pub fn seed_default_plans(conn: &Connection) -> Result<usize> {
    let mut seeded = 0;
    for entry in default_plans() {
        if get_plan(conn, entry.account_type, entry.tier)?.is_none() {
            upsert_plan(conn, &entry)?;
            seeded += 1;
        }
    }
    Ok(seeded)
}

// ============ Subscriptions ============

pub fn get_subscription_by_id(conn: &Connection, id: &str) -> Result<Option<SubscriptionRecord>> {
    query_one(
        conn,
        &format!("SELECT {} FROM subscriptions WHERE id = ?1", SUBSCRIPTION_COLS),
        &[&id],
    )
}

pub fn list_subscriptions_for_account(
    conn: &Connection,
    account_id: &str,
) -> Result<Vec<SubscriptionRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE account_id = ?1
             ORDER BY started_at DESC, order_id DESC",
            SUBSCRIPTION_COLS
        ),
        &[&account_id],
    )
}

pub fn list_subscriptions_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<SubscriptionRecord>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM subscriptions", [], |row| row.get(0))?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM subscriptions
             ORDER BY started_at DESC, order_id DESC LIMIT ?1 OFFSET ?2",
            SUBSCRIPTION_COLS
        ),
        params![limit, offset],
    )?;
    Ok((items, total))
}

// ============ Order ids ============

fn order_year(now: i64) -> Result<i32> {
    chrono::DateTime::from_timestamp(now, 0)
        .map(|dt| dt.year())
        .ok_or_else(|| AppError::Internal("Timestamp out of range".into()))
}

/// Next `ORD-<year>-<seq>` for the current year, read inside the caller's
/// write transaction: the lexicographically greatest existing id with the
/// year's prefix, suffix incremented, starting at 1. The UNIQUE index on
/// order_id backstops the reservation if two writers ever interleave.
fn next_order_id(conn: &Connection, now: i64) -> Result<String> {
    let year = order_year(now)?;
    let prefix = format!("ORD-{year}-");

    let last: Option<String> = conn
        .query_row(
            "SELECT order_id FROM subscriptions WHERE order_id LIKE ?1 || '%'
             ORDER BY order_id DESC LIMIT 1",
            params![&prefix],
            |row| row.get(0),
        )
        .optional()?;

    let seq = match last {
        Some(order_id) => order_id[prefix.len()..]
            .parse::<u64>()
            .map_err(|_| AppError::Internal(format!("Malformed order id: {order_id}")))?
            + 1,
        None => 1,
    };

    Ok(format!("{prefix}{seq:03}"))
}

fn is_order_id_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("subscriptions.order_id")
    )
}

// ============ Lifecycle ============

/// Subscribe an account to a tier: reserve an order id, append the
/// purchase record, point the account at it, and recompute the
/// entitlement counters, all in one IMMEDIATE transaction so the account
/// and its current record can never disagree.
///
/// Re-subscribing while already active replaces the entitlement outright:
/// no pro-rating, no stacking.
pub fn subscribe_atomic(
    conn: &mut Connection,
    account_id: &str,
    tier: PlanTier,
    payment: &PaymentMethodSummary,
    now: i64,
) -> Result<(SubscriptionRecord, Account)> {
    for attempt in 1..=MAX_ORDER_ID_ATTEMPTS {
        match try_subscribe(conn, account_id, tier, payment, now) {
            Err(AppError::Database(ref e)) if is_order_id_conflict(e) => {
                tracing::warn!(attempt, "Order id reservation lost a race, retrying");
            }
            other => return other,
        }
    }
    Err(AppError::SequenceGeneration(format!(
        "Could not reserve an order id after {MAX_ORDER_ID_ATTEMPTS} attempts"
    )))
}

fn try_subscribe(
    conn: &mut Connection,
    account_id: &str,
    tier: PlanTier,
    payment: &PaymentMethodSummary,
    now: i64,
) -> Result<(SubscriptionRecord, Account)> {
    // IMMEDIATE takes the write lock up front so the read-max/insert pair
    // on order ids cannot interleave with another subscriber.
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let account: Account = query_one(
        &tx,
        &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
        &[&account_id],
    )?
    .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    let account_type = account
        .role
        .subscribable_type()
        .ok_or_else(|| AppError::Forbidden("Admins cannot subscribe".into()))?;

    // Exact-match lookup; an unmapped tier for this role is a hard
    // validation failure, never a silent default.
    let plan = get_plan(&tx, account_type, tier)?.ok_or_else(|| {
        AppError::invalid_field("tier", "no plan configured for this account type and tier")
    })?;

    let window = SubscriptionWindow::from_duration(plan.duration_days, now);
    let order_id = next_order_id(&tx, now)?;
    let id = gen_id();

    tx.execute(
        "INSERT INTO subscriptions (id, order_id, account_id, account_type, tier, amount,
                                    status, started_at, duration_days,
                                    card_holder, card_expiry_month, card_expiry_year)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            &id,
            &order_id,
            account_id,
            account_type.as_ref(),
            tier.as_ref(),
            plan.amount,
            SubscriptionStatus::Completed.as_ref(),
            window.started_at,
            plan.duration_days,
            &payment.card_holder,
            &payment.expiry_month,
            &payment.expiry_year,
        ],
    )?;

    let limit = slot_limit(tier);
    let (total_promotions, used_promotions, total_scans) = match account_type {
        AccountType::StoreOwner => (limit, 0, account.total_scan_slots),
        AccountType::Reseller => (account.total_promotion_slots, account.used_promotion_slots, limit),
    };

    tx.execute(
        "UPDATE accounts
         SET current_subscription_id = ?1, subscription_end_at = ?2,
             total_promotion_slots = ?3, used_promotion_slots = ?4,
             total_scan_slots = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            &id,
            window.ends_at,
            total_promotions,
            used_promotions,
            total_scans,
            now,
            account_id
        ],
    )?;

    tx.commit()?;

    let record = SubscriptionRecord {
        id: id.clone(),
        order_id,
        account_id: account_id.to_string(),
        account_type,
        tier,
        amount: plan.amount,
        status: SubscriptionStatus::Completed,
        started_at: window.started_at,
        duration_days: plan.duration_days,
        payment_method: payment.clone(),
    };

    let account = Account {
        current_subscription_id: Some(id),
        subscription_end_at: Some(window.ends_at),
        total_promotion_slots: total_promotions,
        used_promotion_slots: used_promotions,
        total_scan_slots: total_scans,
        updated_at: now,
        ..account
    };

    Ok((record, account))
}

/// Cancel the account's current subscription: the record is kept as
/// history with status `cancelled`, the account's reference and end
/// timestamp are cleared, and the role's counters reset to zero.
///
/// Not idempotent: with no current subscription this fails
/// with a conflict and mutates nothing.
pub fn cancel_atomic(
    conn: &mut Connection,
    account_id: &str,
    now: i64,
) -> Result<(SubscriptionRecord, Account)> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let account: Account = query_one(
        &tx,
        &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
        &[&account_id],
    )?
    .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    let account_type = account
        .role
        .subscribable_type()
        .ok_or_else(|| AppError::Forbidden("Admins cannot cancel subscriptions".into()))?;

    let sub_id = account
        .current_subscription_id
        .clone()
        .ok_or_else(|| AppError::Conflict("No active subscription".into()))?;

    let record = get_subscription_by_id(&tx, &sub_id)?
        .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;

    tx.execute(
        "UPDATE subscriptions SET status = ?1 WHERE id = ?2",
        params![SubscriptionStatus::Cancelled.as_ref(), &sub_id],
    )?;

    let (total_promotions, used_promotions, total_scans) = match account_type {
        AccountType::StoreOwner => (0, 0, account.total_scan_slots),
        AccountType::Reseller => (account.total_promotion_slots, account.used_promotion_slots, 0),
    };

    tx.execute(
        "UPDATE accounts
         SET current_subscription_id = NULL, subscription_end_at = NULL,
             total_promotion_slots = ?1, used_promotion_slots = ?2,
             total_scan_slots = ?3, updated_at = ?4
         WHERE id = ?5",
        params![total_promotions, used_promotions, total_scans, now, account_id],
    )?;

    tx.commit()?;

    let record = SubscriptionRecord {
        status: SubscriptionStatus::Cancelled,
        ..record
    };

    let account = Account {
        current_subscription_id: None,
        subscription_end_at: None,
        total_promotion_slots: total_promotions,
        used_promotion_slots: used_promotions,
        total_scan_slots: total_scans,
        updated_at: now,
        ..account
    };

    Ok((record, account))
}

/// Outcome of an admin-invoked counter reconciliation.
pub enum ReconcileOutcome {
    /// A completed, unexpired subscription backs the account; counters
    /// were recomputed from its tier.
    Updated {
        account: Account,
        entitlement: Entitlement,
    },
    /// No live subscription; counters were reset to zero and any stale
    /// reference cleared.
    Reset { account: Account },
}

/// Recompute an account's entitlement counters from its current
/// subscription record, independent of the subscribe/cancel flows.
/// Used to repair drift, including stale counters left behind by lazy
/// expiry. Runs under the same IMMEDIATE-transaction discipline as the
/// other lifecycle operations, so it cannot interleave with them.
pub fn reconcile_counts_atomic(
    conn: &mut Connection,
    account_id: &str,
    now: i64,
) -> Result<ReconcileOutcome> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let account: Account = query_one(
        &tx,
        &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
        &[&account_id],
    )?
    .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    // Status and expiry both come from the record itself, never from the
    // cached counters being repaired.
    let live_record = match &account.current_subscription_id {
        Some(sub_id) => get_subscription_by_id(&tx, sub_id)?
            .filter(|r| r.status == SubscriptionStatus::Completed)
            .filter(|r| {
                SubscriptionWindow::from_duration(r.duration_days, r.started_at).is_active_at(now)
            }),
        None => None,
    };

    match live_record {
        Some(record) => {
            let limit = slot_limit(record.tier);
            let (total_promotions, used_promotions, total_scans) = match record.account_type {
                AccountType::StoreOwner => (
                    limit,
                    account.used_promotion_slots.clamp(0, limit),
                    account.total_scan_slots,
                ),
                AccountType::Reseller => (
                    account.total_promotion_slots,
                    account.used_promotion_slots,
                    limit,
                ),
            };

            tx.execute(
                "UPDATE accounts
                 SET total_promotion_slots = ?1, used_promotion_slots = ?2,
                     total_scan_slots = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![total_promotions, used_promotions, total_scans, now, account_id],
            )?;
            tx.commit()?;

            let account = Account {
                total_promotion_slots: total_promotions,
                used_promotion_slots: used_promotions,
                total_scan_slots: total_scans,
                updated_at: now,
                ..account
            };
            let entitlement = match record.account_type {
                AccountType::StoreOwner => Entitlement::Promotions {
                    total: total_promotions,
                    used: used_promotions,
                },
                AccountType::Reseller => Entitlement::Scans {
                    total: total_scans,
                },
            };
            Ok(ReconcileOutcome::Updated {
                account,
                entitlement,
            })
        }
        None => {
            tx.execute(
                "UPDATE accounts
                 SET current_subscription_id = NULL, subscription_end_at = NULL,
                     total_promotion_slots = 0, used_promotion_slots = 0,
                     total_scan_slots = 0, updated_at = ?1
                 WHERE id = ?2",
                params![now, account_id],
            )?;
            tx.commit()?;

            let account = Account {
                current_subscription_id: None,
                subscription_end_at: None,
                total_promotion_slots: 0,
                used_promotion_slots: 0,
                total_scan_slots: 0,
                updated_at: now,
                ..account
            };
            Ok(ReconcileOutcome::Reset { account })
        }
    }
}

// ============ Notifications ============

pub fn create_notification(
    conn: &Connection,
    account_id: &str,
    kind: NotificationKind,
    heading: &str,
    content: &str,
    category: &str,
) -> Result<Notification> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO notifications (id, account_id, kind, heading, content, category, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![&id, account_id, kind.as_ref(), heading, content, category, now],
    )?;

    Ok(Notification {
        id,
        account_id: account_id.to_string(),
        kind,
        heading: heading.to_string(),
        content: content.to_string(),
        category: category.to_string(),
        created_at: now,
    })
}

pub fn list_notifications_for_account(
    conn: &Connection,
    account_id: &str,
) -> Result<Vec<Notification>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM notifications WHERE account_id = ?1 ORDER BY created_at DESC",
            NOTIFICATION_COLS
        ),
        &[&account_id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::util::SECONDS_PER_DAY;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        seed_default_plans(&conn).unwrap();
        conn
    }

    fn test_account(conn: &Connection, role: AccountRole, email: &str) -> Account {
        create_account(
            conn,
            &CreateAccount {
                email: email.into(),
                full_name: "Test Account".into(),
                role,
            },
            &format!("hash-{email}"),
        )
        .unwrap()
    }

    fn summary() -> PaymentMethodSummary {
        PaymentMethodSummary {
            card_holder: "Ada Lovelace".into(),
            expiry_month: "09".into(),
            expiry_year: "2030".into(),
        }
    }

    // 2026-03-01T00:00:00Z
    const NOW: i64 = 1_772_323_200;

    #[test]
    fn order_ids_are_year_scoped_and_sequential() {
        let mut conn = test_conn();
        let owner = test_account(&conn, AccountRole::StoreOwner, "o@example.com");

        for expected in 1..=3 {
            let (record, _) =
                subscribe_atomic(&mut conn, &owner.id, PlanTier::Tier1, &summary(), NOW).unwrap();
            assert_eq!(record.order_id, format!("ORD-2026-{expected:03}"));
        }

        // A purchase in the next year restarts the sequence.
        let (record, _) = subscribe_atomic(
            &mut conn,
            &owner.id,
            PlanTier::Tier1,
            &summary(),
            NOW + 366 * SECONDS_PER_DAY,
        )
        .unwrap();
        assert_eq!(record.order_id, "ORD-2027-001");
    }

    #[test]
    fn subscribe_sets_window_and_counters() {
        let mut conn = test_conn();
        upsert_plan(
            &conn,
            &UpsertPlanEntry {
                account_type: AccountType::Reseller,
                tier: PlanTier::Tier2,
                amount: 20,
                duration_days: 90,
            },
        )
        .unwrap();
        let reseller = test_account(&conn, AccountRole::Reseller, "r@example.com");

        let (record, account) =
            subscribe_atomic(&mut conn, &reseller.id, PlanTier::Tier2, &summary(), NOW).unwrap();

        assert_eq!(record.amount, 20);
        assert_eq!(record.duration_days, 90);
        assert_eq!(record.status, SubscriptionStatus::Completed);
        assert_eq!(record.order_id, "ORD-2026-001");
        assert_eq!(
            account.subscription_end_at,
            Some(NOW + 90 * SECONDS_PER_DAY)
        );
        assert_eq!(account.total_scan_slots, 50);
        assert_eq!(account.entitlement(), Some(Entitlement::Scans { total: 50 }));

        // The row matches what the atomic call reported.
        let stored = get_account_by_id(&conn, &reseller.id).unwrap().unwrap();
        assert_eq!(stored.current_subscription_id, Some(record.id));
        assert_eq!(stored.total_scan_slots, 50);
    }

    #[test]
    fn resubscribe_replaces_entitlement_outright() {
        let mut conn = test_conn();
        let owner = test_account(&conn, AccountRole::StoreOwner, "o@example.com");

        subscribe_atomic(&mut conn, &owner.id, PlanTier::Tier1, &summary(), NOW).unwrap();
        conn.execute(
            "UPDATE accounts SET used_promotion_slots = 5 WHERE id = ?1",
            params![&owner.id],
        )
        .unwrap();

        let (_, account) =
            subscribe_atomic(&mut conn, &owner.id, PlanTier::Tier3, &summary(), NOW + 10).unwrap();

        assert_eq!(account.total_promotion_slots, 100);
        assert_eq!(account.used_promotion_slots, 0);
    }

    #[test]
    fn admin_cannot_subscribe() {
        let mut conn = test_conn();
        let admin = test_account(&conn, AccountRole::Admin, "a@example.com");

        let err =
            subscribe_atomic(&mut conn, &admin.id, PlanTier::Tier1, &summary(), NOW).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn cancel_is_not_idempotent() {
        let mut conn = test_conn();
        let reseller = test_account(&conn, AccountRole::Reseller, "r@example.com");
        subscribe_atomic(&mut conn, &reseller.id, PlanTier::Tier1, &summary(), NOW).unwrap();

        let (record, account) = cancel_atomic(&mut conn, &reseller.id, NOW + 100).unwrap();
        assert_eq!(record.status, SubscriptionStatus::Cancelled);
        assert_eq!(account.current_subscription_id, None);
        assert_eq!(account.total_scan_slots, 0);

        // History survives; only the status flipped.
        let stored = get_subscription_by_id(&conn, &record.id).unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Cancelled);

        let err = cancel_atomic(&mut conn, &reseller.id, NOW + 200).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn cancel_without_subscription_mutates_nothing() {
        let mut conn = test_conn();
        let owner = test_account(&conn, AccountRole::StoreOwner, "o@example.com");

        let err = cancel_atomic(&mut conn, &owner.id, NOW).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = get_account_by_id(&conn, &owner.id).unwrap().unwrap();
        assert_eq!(stored.updated_at, owner.updated_at);
    }

    #[test]
    fn unmapped_tier_is_a_validation_error() {
        let mut conn = test_conn();
        conn.execute(
            "DELETE FROM plans WHERE account_type = 'reseller' AND tier = 'tier3'",
            [],
        )
        .unwrap();
        let reseller = test_account(&conn, AccountRole::Reseller, "r@example.com");

        let err =
            subscribe_atomic(&mut conn, &reseller.id, PlanTier::Tier3, &summary(), NOW).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn reconcile_updates_counters_for_live_subscription() {
        let mut conn = test_conn();
        let owner = test_account(&conn, AccountRole::StoreOwner, "o@example.com");
        subscribe_atomic(&mut conn, &owner.id, PlanTier::Tier2, &summary(), NOW).unwrap();

        // Simulated drift: the totals were clobbered somewhere.
        conn.execute(
            "UPDATE accounts SET total_promotion_slots = 7, used_promotion_slots = 3 WHERE id = ?1",
            params![&owner.id],
        )
        .unwrap();

        match reconcile_counts_atomic(&mut conn, &owner.id, NOW + 100).unwrap() {
            ReconcileOutcome::Updated {
                account,
                entitlement,
            } => {
                assert_eq!(account.total_promotion_slots, 50);
                assert_eq!(account.used_promotion_slots, 3);
                assert_eq!(entitlement, Entitlement::Promotions { total: 50, used: 3 });
            }
            ReconcileOutcome::Reset { .. } => panic!("expected live subscription"),
        }
    }

    #[test]
    fn reconcile_resets_lapsed_subscription() {
        let mut conn = test_conn();
        let reseller = test_account(&conn, AccountRole::Reseller, "r@example.com");
        let (record, _) =
            subscribe_atomic(&mut conn, &reseller.id, PlanTier::Tier1, &summary(), NOW).unwrap();

        // Evaluate well past the 30-day default window: lazy expiry left
        // the counters stale, reconciliation clears them.
        let later = NOW + 31 * SECONDS_PER_DAY;
        match reconcile_counts_atomic(&mut conn, &reseller.id, later).unwrap() {
            ReconcileOutcome::Reset { account } => {
                assert_eq!(account.current_subscription_id, None);
                assert_eq!(account.subscription_end_at, None);
                assert_eq!(account.total_scan_slots, 0);
            }
            ReconcileOutcome::Updated { .. } => panic!("expected reset"),
        }

        // The record itself is untouched history.
        let stored = get_subscription_by_id(&conn, &record.id).unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Completed);
    }

    #[test]
    fn reconcile_resets_cancelled_record_reference() {
        let mut conn = test_conn();
        let owner = test_account(&conn, AccountRole::StoreOwner, "o@example.com");
        let (record, _) =
            subscribe_atomic(&mut conn, &owner.id, PlanTier::Tier1, &summary(), NOW).unwrap();

        // Drift: the record was cancelled but the account still points at it.
        conn.execute(
            "UPDATE subscriptions SET status = 'cancelled' WHERE id = ?1",
            params![&record.id],
        )
        .unwrap();

        match reconcile_counts_atomic(&mut conn, &owner.id, NOW + 100).unwrap() {
            ReconcileOutcome::Reset { account } => {
                assert_eq!(account.current_subscription_id, None);
                assert_eq!(account.total_promotion_slots, 0);
            }
            ReconcileOutcome::Updated { .. } => panic!("expected reset"),
        }
    }

    #[test]
    fn seeding_is_idempotent() {
        let conn = test_conn();
        assert_eq!(seed_default_plans(&conn).unwrap(), 0);
        assert_eq!(list_plans(&conn).unwrap().len(), 6);
    }
}
