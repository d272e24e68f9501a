//! Row-mapping helpers shared by the query layer.
//!
//! Each model carries a `*_COLS` constant naming its columns in the order
//! its [`FromRow`] impl reads them, so SELECT statements and mappers stay
//! in sync.

use std::str::FromStr;

use rusqlite::{Connection, Params, Row};

use crate::error::Result;
use crate::models::*;

pub const ACCOUNT_COLS: &str = "id, email, full_name, role, api_token_hash, \
     current_subscription_id, subscription_end_at, total_promotion_slots, \
     used_promotion_slots, total_scan_slots, created_at, updated_at";

pub const PLAN_COLS: &str = "id, account_type, tier, amount, duration_days, updated_at";

pub const SUBSCRIPTION_COLS: &str = "id, order_id, account_id, account_type, tier, amount, \
     status, started_at, duration_days, card_holder, card_expiry_month, card_expiry_year";

pub const NOTIFICATION_COLS: &str =
    "id, account_id, kind, heading, content, category, created_at";

pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Parse a TEXT column into a strum-backed enum, surfacing bad stored
/// values as a conversion failure instead of a panic.
fn parse_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

impl FromRow for Account {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Account {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            role: parse_enum(row, 3)?,
            api_token_hash: row.get(4)?,
            current_subscription_id: row.get(5)?,
            subscription_end_at: row.get(6)?,
            total_promotion_slots: row.get(7)?,
            used_promotion_slots: row.get(8)?,
            total_scan_slots: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for Plan {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Plan {
            id: row.get(0)?,
            account_type: parse_enum(row, 1)?,
            tier: parse_enum(row, 2)?,
            amount: row.get(3)?,
            duration_days: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for SubscriptionRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SubscriptionRecord {
            id: row.get(0)?,
            order_id: row.get(1)?,
            account_id: row.get(2)?,
            account_type: parse_enum(row, 3)?,
            tier: parse_enum(row, 4)?,
            amount: row.get(5)?,
            status: parse_enum(row, 6)?,
            started_at: row.get(7)?,
            duration_days: row.get(8)?,
            payment_method: PaymentMethodSummary {
                card_holder: row.get(9)?,
                expiry_month: row.get(10)?,
                expiry_year: row.get(11)?,
            },
        })
    }
}

impl FromRow for Notification {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Notification {
            id: row.get(0)?,
            account_id: row.get(1)?,
            kind: parse_enum(row, 2)?,
            heading: row.get(3)?,
            content: row.get(4)?,
            category: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

pub fn query_one<T: FromRow, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params, |row| T::from_row(row))?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| T::from_row(row))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}
