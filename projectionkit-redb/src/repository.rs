use std::sync::Arc;

use async_trait::async_trait;
use projectionkit::{HandlerKey, Operation, RepositoryError, ResourceRepository, Version};
use redb::Database;
use tracing::{error, instrument, warn};

use crate::occ;

pub(crate) fn map_redb_error(
    error: impl Into<redb::Error>,
    operation: Operation,
) -> RepositoryError {
    let error = error.into();
    error!(
        error = %error,
        operation = %operation,
        "[redb.database_error] database operation failed"
    );
    RepositoryError::new(operation, error)
}

pub(crate) fn abort(tx: redb::WriteTransaction) {
    if let Err(error) = tx.abort() {
        warn!(error = %error, "[redb.abort_failed] transaction abort failed");
    }
}

/// OCC records of one handler, in the table `projection_occ/<key>`.
#[derive(Clone)]
pub struct RedbRepository {
    db: Arc<Database>,
    key: HandlerKey,
    table: String,
}

impl RedbRepository {
    /// A repository for the records owned by `key`.
    pub fn new(db: Arc<Database>, key: HandlerKey) -> Self {
        Self {
            db,
            key,
            table: occ::table_name(key),
        }
    }

    /// The handler key that partitions this repository's records.
    pub const fn key(&self) -> HandlerKey {
        self.key
    }

    /// The database the repository writes to.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub(crate) fn table(&self) -> &str {
        &self.table
    }

    fn write<T>(
        &self,
        operation: Operation,
        f: impl FnOnce(&redb::WriteTransaction) -> Result<T, redb::Error>,
    ) -> Result<T, RepositoryError> {
        let tx = self
            .db
            .begin_write()
            .map_err(|error| map_redb_error(error, Operation::BeginTransaction))?;
        let value = f(&tx).map_err(|error| map_redb_error(error, operation))?;
        tx.commit()
            .map_err(|error| map_redb_error(error, Operation::CommitTransaction))?;
        Ok(value)
    }
}

impl std::fmt::Debug for RedbRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRepository")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResourceRepository for RedbRepository {
    #[instrument(name = "redb.resource_version", skip_all, fields(handler = %self.key))]
    async fn resource_version(&self, resource: &[u8]) -> Result<Version, RepositoryError> {
        let tx = self
            .db
            .begin_read()
            .map_err(|error| map_redb_error(error, Operation::BeginTransaction))?;
        occ::query(&tx, &self.table, resource)
            .map_err(|error| map_redb_error(error, Operation::ResourceVersion))
    }

    #[instrument(name = "redb.store_resource_version", skip_all, fields(handler = %self.key))]
    async fn store_resource_version(
        &self,
        resource: &[u8],
        version: &Version,
    ) -> Result<(), RepositoryError> {
        self.write(Operation::StoreResourceVersion, |tx| {
            occ::store(tx, &self.table, resource, version)
        })
    }

    #[instrument(name = "redb.update_resource_version", skip_all, fields(handler = %self.key))]
    async fn update_resource_version(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
    ) -> Result<bool, RepositoryError> {
        let tx = self
            .db
            .begin_write()
            .map_err(|error| map_redb_error(error, Operation::BeginTransaction))?;

        let applied = occ::update(&tx, &self.table, resource, current, next)
            .map_err(|error| map_redb_error(error, Operation::UpdateResourceVersion))?;
        if !applied {
            abort(tx);
            return Ok(false);
        }

        tx.commit()
            .map_err(|error| map_redb_error(error, Operation::CommitTransaction))?;
        Ok(true)
    }

    #[instrument(name = "redb.delete_resource", skip_all, fields(handler = %self.key))]
    async fn delete_resource(&self, resource: &[u8]) -> Result<(), RepositoryError> {
        self.write(Operation::DeleteResource, |tx| {
            occ::delete(tx, &self.table, resource)
        })
    }
}
