use std::sync::Arc;

use async_trait::async_trait;
use projectionkit::{
    Candidate, CandidateSet, HandlerKey, Operation, RepositoryError, ResourceRepository,
    SucceedOnce, Version,
};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool};
use tracing::{error, info, instrument};

use crate::driver::Driver;
use crate::options::Options;

pub(crate) fn map_sqlx_error(error: sqlx::Error, operation: Operation) -> RepositoryError {
    error!(
        error = %error,
        operation = %operation,
        "[sql.database_error] database operation failed"
    );
    RepositoryError::new(operation, error)
}

/// Name of the database behind `pool`, for diagnostics.
pub(crate) fn describe(pool: &AnyPool) -> String {
    pool.connect_options().database_url.scheme().to_owned()
}

struct Shared {
    pool: AnyPool,
    key: HandlerKey,
    drivers: CandidateSet<dyn Driver>,
    schema: Option<SucceedOnce>,
}

/// OCC records of one handler in the `projection_occ` table.
///
/// The driver is resolved on first use and remembered; clones share the
/// resolution, the schema gate and the pool.
#[derive(Clone)]
pub struct SqlRepository {
    shared: Arc<Shared>,
}

impl SqlRepository {
    /// A repository for the records owned by `key`.
    pub fn new(pool: AnyPool, key: HandlerKey, options: &Options) -> Self {
        Self {
            shared: Arc::new(Shared {
                pool,
                key,
                drivers: options.driver_set(),
                schema: options
                    .creates_schema_on_first_use()
                    .then(SucceedOnce::new),
            }),
        }
    }

    /// The handler key that partitions this repository's records.
    pub fn key(&self) -> HandlerKey {
        self.shared.key
    }

    /// The pool the repository runs on.
    pub fn pool(&self) -> &AnyPool {
        &self.shared.pool
    }

    /// The driver for this database, creating the schema first if the
    /// repository was configured to.
    pub async fn driver(&self) -> Result<&Arc<dyn Driver>, RepositoryError> {
        let shared = &self.shared;
        let driver = shared
            .drivers
            .resolve(&shared.pool, describe)
            .await
            .map_err(|error| RepositoryError::new(Operation::Probe, error))?;

        if let Some(gate) = &shared.schema {
            gate.call(|| async move {
                let mut conn = shared.pool.acquire().await?;
                driver.create_schema(&mut conn).await?;
                info!(
                    driver = driver.name(),
                    "[sql.schema_created] projection_occ table is ready"
                );
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|error| map_sqlx_error(error, Operation::CreateSchema))?;
        }

        Ok(driver)
    }

    async fn acquire(&self, operation: Operation) -> Result<PoolConnection<Any>, RepositoryError> {
        self.shared
            .pool
            .acquire()
            .await
            .map_err(|error| map_sqlx_error(error, operation))
    }
}

impl std::fmt::Debug for SqlRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlRepository")
            .field("key", &self.shared.key)
            .field("drivers", &self.shared.drivers)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResourceRepository for SqlRepository {
    #[instrument(name = "sql.resource_version", skip_all, fields(handler = %self.shared.key))]
    async fn resource_version(&self, resource: &[u8]) -> Result<Version, RepositoryError> {
        let driver = self.driver().await?;
        let mut conn = self.acquire(Operation::ResourceVersion).await?;
        driver
            .query_version(&mut conn, &self.shared.key, resource)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::ResourceVersion))
    }

    #[instrument(name = "sql.store_resource_version", skip_all, fields(handler = %self.shared.key))]
    async fn store_resource_version(
        &self,
        resource: &[u8],
        version: &Version,
    ) -> Result<(), RepositoryError> {
        let driver = self.driver().await?;
        let mut conn = self.acquire(Operation::StoreResourceVersion).await?;
        driver
            .store_version(&mut conn, &self.shared.key, resource, version)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::StoreResourceVersion))
    }

    #[instrument(
        name = "sql.update_resource_version",
        skip_all,
        fields(handler = %self.shared.key)
    )]
    async fn update_resource_version(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
    ) -> Result<bool, RepositoryError> {
        let driver = self.driver().await?;
        let mut conn = self.acquire(Operation::UpdateResourceVersion).await?;
        driver
            .update_version(&mut conn, &self.shared.key, resource, current, next)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::UpdateResourceVersion))
    }

    #[instrument(name = "sql.delete_resource", skip_all, fields(handler = %self.shared.key))]
    async fn delete_resource(&self, resource: &[u8]) -> Result<(), RepositoryError> {
        let driver = self.driver().await?;
        let mut conn = self.acquire(Operation::DeleteResource).await?;
        driver
            .delete_version(&mut conn, &self.shared.key, resource)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::DeleteResource))
    }
}
