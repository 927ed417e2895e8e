//! Creation and removal of a handler's OCC table.
//!
//! Tables are also created implicitly by the first write, so calling
//! [`create_schema`] is optional. Both operations are idempotent.

use projectionkit::{HandlerKey, Operation, RepositoryError};
use redb::Database;
use tracing::info;

use crate::occ;
use crate::repository::map_redb_error;

/// Create the OCC table of the handler identified by `key`.
pub fn create_schema(db: &Database, key: HandlerKey) -> Result<(), RepositoryError> {
    let table = occ::table_name(key);
    let tx = db
        .begin_write()
        .map_err(|error| map_redb_error(error, Operation::BeginTransaction))?;
    occ::create_table(&tx, &table).map_err(|error| map_redb_error(error, Operation::CreateSchema))?;
    tx.commit()
        .map_err(|error| map_redb_error(error, Operation::CommitTransaction))?;

    info!(table = %table, "[redb.schema_created] OCC table is ready");
    Ok(())
}

/// Drop the OCC table of the handler identified by `key`, discarding its
/// records.
pub fn drop_schema(db: &Database, key: HandlerKey) -> Result<(), RepositoryError> {
    let table = occ::table_name(key);
    let tx = db
        .begin_write()
        .map_err(|error| map_redb_error(error, Operation::BeginTransaction))?;
    let existed =
        occ::drop_table(&tx, &table).map_err(|error| map_redb_error(error, Operation::DropSchema))?;
    tx.commit()
        .map_err(|error| map_redb_error(error, Operation::CommitTransaction))?;

    info!(table = %table, existed, "[redb.schema_dropped] OCC table removed");
    Ok(())
}
