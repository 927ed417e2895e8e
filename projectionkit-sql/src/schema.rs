//! Creation and removal of the `projection_occ` table.
//!
//! Both operations are idempotent. The driver is chosen from `options` the
//! same way an adaptor chooses it.

use projectionkit::{Candidate, Operation, RepositoryError};
use sqlx::AnyPool;
use tracing::{info, instrument};

use crate::options::Options;
use crate::repository::{describe, map_sqlx_error};

/// Create the OCC table if it does not exist.
#[instrument(name = "sql.create_schema", skip_all)]
pub async fn create_schema(pool: &AnyPool, options: &Options) -> Result<(), RepositoryError> {
    let drivers = options.driver_set();
    let driver = drivers
        .resolve(pool, describe)
        .await
        .map_err(|error| RepositoryError::new(Operation::Probe, error))?;

    let mut conn = pool
        .acquire()
        .await
        .map_err(|error| map_sqlx_error(error, Operation::CreateSchema))?;
    driver
        .create_schema(&mut conn)
        .await
        .map_err(|error| map_sqlx_error(error, Operation::CreateSchema))?;

    info!(driver = driver.name(), "[sql.schema_created] projection_occ table is ready");
    Ok(())
}

/// Drop the OCC table, discarding every handler's records.
#[instrument(name = "sql.drop_schema", skip_all)]
pub async fn drop_schema(pool: &AnyPool, options: &Options) -> Result<(), RepositoryError> {
    let drivers = options.driver_set();
    let driver = drivers
        .resolve(pool, describe)
        .await
        .map_err(|error| RepositoryError::new(Operation::Probe, error))?;

    let mut conn = pool
        .acquire()
        .await
        .map_err(|error| map_sqlx_error(error, Operation::DropSchema))?;
    driver
        .drop_schema(&mut conn)
        .await
        .map_err(|error| map_sqlx_error(error, Operation::DropSchema))?;

    info!(driver = driver.name(), "[sql.schema_dropped] projection_occ table removed");
    Ok(())
}
