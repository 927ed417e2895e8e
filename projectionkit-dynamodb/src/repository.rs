use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::TransactWriteItem;
use aws_sdk_dynamodb::Client;
use projectionkit::{
    HandlerKey, Operation, RepositoryError, ResourceRepository, SucceedOnce, Version,
};
use tracing::{debug, error, instrument};

use crate::occ;
use crate::options::{Options, TableName};
use crate::schema;

pub(crate) fn map_sdk_error<E>(error: E, operation: Operation) -> RepositoryError
where
    E: std::error::Error + Send + Sync + 'static,
{
    error!(
        error = %error,
        operation = %operation,
        "[dynamodb.request_error] request failed"
    );
    RepositoryError::new(operation, error)
}

struct Shared {
    client: Client,
    table: TableName,
    key: HandlerKey,
    schema: Option<SucceedOnce>,
}

/// OCC records of one handler, stored as items in a shared table.
#[derive(Clone)]
pub struct DynamoRepository {
    shared: Arc<Shared>,
}

impl DynamoRepository {
    /// A repository for the records owned by `key`.
    pub fn new(client: Client, key: HandlerKey, options: &Options) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                table: options.table().clone(),
                key,
                schema: options
                    .creates_table_on_first_use()
                    .then(SucceedOnce::new),
            }),
        }
    }

    /// The handler key that partitions this repository's records.
    pub fn key(&self) -> HandlerKey {
        self.shared.key
    }

    /// The client the repository sends requests with.
    pub fn client(&self) -> &Client {
        &self.shared.client
    }

    /// The OCC table.
    pub fn table(&self) -> &TableName {
        &self.shared.table
    }

    pub(crate) async fn ensure_table(&self) -> Result<(), RepositoryError> {
        match &self.shared.schema {
            Some(gate) => {
                gate.call(|| schema::create_table(&self.shared.client, &self.shared.table))
                    .await
            }
            None => Ok(()),
        }
    }

    /// Commit the OCC update together with `items`.
    ///
    /// Returns `Ok(false)` without writing anything when the stored version
    /// is not `current`.
    pub(crate) async fn transact(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
        items: Vec<TransactWriteItem>,
    ) -> Result<bool, RepositoryError> {
        let shared = &self.shared;
        let update = occ::update_item(shared.table.as_ref(), shared.key, resource, current, next)
            .map_err(|error| map_sdk_error(error, Operation::UpdateResourceVersion))?;

        let mut transaction = Vec::with_capacity(items.len() + 1);
        transaction.push(update);
        transaction.extend(items);

        match shared
            .client
            .transact_write_items()
            .set_transact_items(Some(transaction))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(error) if occ::is_version_conflict(&error) => {
                debug!(current = %current, "[dynamodb.occ_conflict] resource version mismatch");
                Ok(false)
            }
            Err(error) => Err(map_sdk_error(error, Operation::CommitTransaction)),
        }
    }
}

impl std::fmt::Debug for DynamoRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoRepository")
            .field("table", &self.shared.table)
            .field("key", &self.shared.key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResourceRepository for DynamoRepository {
    #[instrument(name = "dynamodb.resource_version", skip_all, fields(handler = %self.shared.key))]
    async fn resource_version(&self, resource: &[u8]) -> Result<Version, RepositoryError> {
        self.ensure_table().await?;
        let shared = &self.shared;

        let output = shared
            .client
            .get_item()
            .table_name(shared.table.as_ref())
            .key(occ::PARTITION_KEY, occ::partition_key(shared.key, resource))
            .consistent_read(true)
            .send()
            .await
            .map_err(|error| map_sdk_error(error, Operation::ResourceVersion))?;

        Ok(occ::version_of(output.item()))
    }

    #[instrument(
        name = "dynamodb.store_resource_version",
        skip_all,
        fields(handler = %self.shared.key)
    )]
    async fn store_resource_version(
        &self,
        resource: &[u8],
        version: &Version,
    ) -> Result<(), RepositoryError> {
        if version.is_absent() {
            return self.delete_resource(resource).await;
        }
        self.ensure_table().await?;
        let shared = &self.shared;

        let _ = shared
            .client
            .put_item()
            .table_name(shared.table.as_ref())
            .item(occ::PARTITION_KEY, occ::partition_key(shared.key, resource))
            .item(occ::VERSION, occ::version_value(version))
            .send()
            .await
            .map_err(|error| map_sdk_error(error, Operation::StoreResourceVersion))?;
        Ok(())
    }

    #[instrument(
        name = "dynamodb.update_resource_version",
        skip_all,
        fields(handler = %self.shared.key)
    )]
    async fn update_resource_version(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
    ) -> Result<bool, RepositoryError> {
        self.ensure_table().await?;
        self.transact(resource, current, next, Vec::new()).await
    }

    /// Removes the record without checking its version.
    #[instrument(name = "dynamodb.delete_resource", skip_all, fields(handler = %self.shared.key))]
    async fn delete_resource(&self, resource: &[u8]) -> Result<(), RepositoryError> {
        self.ensure_table().await?;
        let shared = &self.shared;

        let _ = shared
            .client
            .delete_item()
            .table_name(shared.table.as_ref())
            .key(occ::PARTITION_KEY, occ::partition_key(shared.key, resource))
            .send()
            .await
            .map_err(|error| map_sdk_error(error, Operation::DeleteResource))?;
        Ok(())
    }
}
