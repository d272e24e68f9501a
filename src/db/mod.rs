//! Database pool, schema, and application state.

pub mod from_row;
pub mod queries;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::config::Config;
use crate::error::Result;
use crate::notify::Notifier;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub base_url: String,
    pub dev_mode: bool,
    pub notifier: Notifier,
}

/// Open a pool against `database_path` with the standard per-connection
/// pragmas applied.
pub fn new_pool(database_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(configure_connection);
    Ok(Pool::new(manager)?)
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        let pool = new_pool(&config.database_path)?;

        {
            let conn = pool.get()?;
            init_schema(&conn)?;
            let seeded = queries::seed_default_plans(&conn)?;
            if seeded > 0 {
                tracing::info!("Seeded {} default plan(s)", seeded);
            }
        }

        Ok(Self {
            db: pool,
            base_url: config.base_url.clone(),
            dev_mode: config.dev_mode,
            notifier: Notifier::from_config(config),
        })
    }
}

/// Per-connection pragmas. WAL plus a busy timeout lets concurrent
/// writers queue on the write lock instead of failing immediately,
/// which the IMMEDIATE-transaction lifecycle operations rely on.
fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA foreign_keys = ON;",
    )
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            id                      TEXT PRIMARY KEY,
            email                   TEXT NOT NULL UNIQUE,
            full_name               TEXT NOT NULL,
            role                    TEXT NOT NULL,
            api_token_hash          TEXT NOT NULL UNIQUE,
            current_subscription_id TEXT REFERENCES subscriptions(id),
            subscription_end_at     INTEGER,
            total_promotion_slots   INTEGER NOT NULL DEFAULT 0,
            used_promotion_slots    INTEGER NOT NULL DEFAULT 0,
            total_scan_slots        INTEGER NOT NULL DEFAULT 0,
            created_at              INTEGER NOT NULL,
            updated_at              INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS plans (
            id            TEXT PRIMARY KEY,
            account_type  TEXT NOT NULL,
            tier          TEXT NOT NULL,
            amount        INTEGER NOT NULL,
            duration_days INTEGER NOT NULL,
            updated_at    INTEGER NOT NULL,
            UNIQUE (account_type, tier)
        );

        CREATE TABLE IF NOT EXISTS subscriptions (
            id                TEXT PRIMARY KEY,
            order_id          TEXT NOT NULL UNIQUE,
            account_id        TEXT NOT NULL REFERENCES accounts(id),
            account_type      TEXT NOT NULL,
            tier              TEXT NOT NULL,
            amount            INTEGER NOT NULL,
            status            TEXT NOT NULL,
            started_at        INTEGER NOT NULL,
            duration_days     INTEGER NOT NULL,
            card_holder       TEXT NOT NULL,
            card_expiry_month TEXT NOT NULL,
            card_expiry_year  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_subscriptions_account
            ON subscriptions (account_id, started_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id         TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id),
            kind       TEXT NOT NULL,
            heading    TEXT NOT NULL,
            content    TEXT NOT NULL,
            category   TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_account
            ON notifications (account_id, created_at);",
    )?;
    Ok(())
}
