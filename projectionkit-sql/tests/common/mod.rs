//! Shared fixtures for projectionkit-sql integration tests.
//!
//! SQLite runs in process against a private in-memory database. PostgreSQL
//! and MySQL run in containers shared by every test in a binary.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::env;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use projectionkit::{
    Configurable, HandlerKey, ProjectionConfigurer, ProjectionEventScope,
};
use projectionkit_sql::{MessageHandler, Options, SqlRepository};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyConnection, AnyPool, Row};
use uuid::Uuid;

/// Route log output through the test harness; `RUST_LOG` selects levels.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fresh in-memory SQLite database.
///
/// The pool holds exactly one connection for its whole life: every new
/// connection to `sqlite::memory:` opens a different, empty database.
pub async fn sqlite_pool() -> AnyPool {
    sqlx::any::install_default_drivers();
    AnyPoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("should open in-memory sqlite database")
}

/// Connect to `url`, retrying while the server finishes starting up.
pub async fn connect_with_retry(url: &str) -> AnyPool {
    sqlx::any::install_default_drivers();
    let max_retries = 30;
    let retry_delay = Duration::from_millis(500);

    for attempt in 0..max_retries {
        match AnyPoolOptions::new().max_connections(8).connect(url).await {
            Ok(pool) => return pool,
            Err(error) if attempt < max_retries - 1 => {
                tracing::debug!(%error, attempt, "database not ready yet");
                tokio::time::sleep(retry_delay).await;
            }
            Err(error) => panic!("should connect to {url}: {error}"),
        }
    }
    unreachable!("the last attempt either connects or panics")
}

/// A handler key no other test uses.
pub fn unique_key() -> HandlerKey {
    HandlerKey::new(Uuid::now_v7())
}

/// A repository for a fresh handler key that creates its schema lazily.
pub fn repository(pool: AnyPool) -> SqlRepository {
    SqlRepository::new(
        pool,
        unique_key(),
        &Options::default().create_schema_on_first_use(true),
    )
}

pub fn postgres_version() -> String {
    env::var("POSTGRES_VERSION").unwrap_or_else(|_| "17".to_string())
}

pub fn mysql_version() -> String {
    env::var("MYSQL_VERSION").unwrap_or_else(|_| "8.4".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Deposited { account: String, amount: i64 },
    /// Writes a row, then fails.
    Poisoned { account: String },
}

#[derive(Debug)]
pub enum LedgerError {
    Database(sqlx::Error),
    Poisoned,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(error) => write!(f, "ledger write failed: {error}"),
            Self::Poisoned => f.write_str("poisoned event"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Keeps account balances in a `ledger` table next to the OCC table.
pub struct Ledger;

pub const LEDGER_KEY: &str = "0d4a3f8e-2b6c-4e1f-9a7d-5c3b8e2f1a60";

impl Configurable for Ledger {
    fn configure(&self, c: &mut dyn ProjectionConfigurer) {
        c.identity("ledger", LEDGER_KEY);
        c.handles_event_type("Deposited");
    }
}

#[async_trait]
impl MessageHandler for Ledger {
    type Event = LedgerEvent;
    type Error = LedgerError;

    async fn handle_event(
        &self,
        tx: &mut AnyConnection,
        scope: &dyn ProjectionEventScope,
        event: &Self::Event,
    ) -> Result<(), Self::Error> {
        let (account, amount) = match event {
            LedgerEvent::Deposited { account, amount } => (account, *amount),
            LedgerEvent::Poisoned { account } => (account, 1),
        };

        sqlx::query(
            "INSERT INTO ledger (account, balance) VALUES (?, ?)
             ON CONFLICT (account) DO UPDATE SET balance = ledger.balance + excluded.balance",
        )
        .bind(account.clone())
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(LedgerError::Database)?;

        if matches!(event, LedgerEvent::Poisoned { .. }) {
            return Err(LedgerError::Poisoned);
        }
        scope.log("ledger updated");
        Ok(())
    }
}

pub async fn create_ledger(pool: &AnyPool) {
    let _ = sqlx::query(
        "CREATE TABLE IF NOT EXISTS ledger (account TEXT PRIMARY KEY, balance INTEGER NOT NULL)",
    )
    .execute(pool)
    .await
    .expect("should create ledger table");
}

pub async fn balance(pool: &AnyPool, account: &str) -> Option<i64> {
    sqlx::query("SELECT balance FROM ledger WHERE account = ?")
        .bind(account.to_owned())
        .fetch_optional(pool)
        .await
        .expect("should read ledger")
        .map(|row| row.try_get::<i64, _>(0).expect("balance column"))
}
