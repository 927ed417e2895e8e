//! Shared fixtures for projectionkit-redb integration tests.

#![allow(dead_code)]

use std::fmt;
use std::sync::Arc;

use projectionkit::{
    Configurable, ProjectionCompactScope, ProjectionConfigurer, ProjectionEventScope,
};
use projectionkit_redb::MessageHandler;
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Route log output through the test harness; `RUST_LOG` selects levels.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn in_memory_db() -> Arc<Database> {
    Arc::new(
        Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .expect("should create in-memory redb database"),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterEvent {
    Incremented(&'static str),
    /// Increments, then fails.
    Poisoned(&'static str),
}

#[derive(Debug)]
pub enum CounterError {
    Storage(redb::Error),
    Poisoned,
}

impl fmt::Display for CounterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(error) => write!(f, "counter storage failed: {error}"),
            Self::Poisoned => f.write_str("poisoned event"),
        }
    }
}

impl std::error::Error for CounterError {}

fn storage(error: impl Into<redb::Error>) -> CounterError {
    CounterError::Storage(error.into())
}

/// Counts events per name in the `counters` table.
pub struct Counter;

pub const COUNTER_KEY: &str = "7b2e4c19-8d3a-4f65-b0e1-2c9a6d4f8e31";

impl Configurable for Counter {
    fn configure(&self, c: &mut dyn ProjectionConfigurer) {
        c.identity("counter", COUNTER_KEY);
        c.handles_event_type("Incremented");
    }
}

impl MessageHandler for Counter {
    type Event = CounterEvent;
    type Error = CounterError;

    fn handle_event(
        &self,
        tx: &WriteTransaction,
        scope: &dyn ProjectionEventScope,
        event: &Self::Event,
    ) -> Result<(), Self::Error> {
        let name = match event {
            CounterEvent::Incremented(name) | CounterEvent::Poisoned(name) => *name,
        };

        {
            let mut table = tx.open_table(COUNTERS).map_err(storage)?;
            let count = table
                .get(name)
                .map_err(storage)?
                .map_or(0, |count| count.value());
            let _ = table.insert(name, count + 1).map_err(storage)?;
        }

        if matches!(event, CounterEvent::Poisoned(_)) {
            return Err(CounterError::Poisoned);
        }
        scope.log("counter incremented");
        Ok(())
    }

    fn compact(
        &self,
        db: &Database,
        scope: &dyn ProjectionCompactScope,
    ) -> Result<(), Self::Error> {
        let tx = db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(COUNTERS).map_err(storage)?;
            table.retain(|_, count| count > 1).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        scope.log("dropped single counts");
        Ok(())
    }
}

pub fn count(db: &Database, name: &str) -> Option<u64> {
    let tx = db.begin_read().expect("read transaction");
    let table = match tx.open_table(COUNTERS) {
        Ok(table) => table,
        Err(redb::TableError::TableDoesNotExist(_)) => return None,
        Err(error) => panic!("open counters: {error}"),
    };
    table
        .get(name)
        .expect("read counter")
        .map(|count| count.value())
}
