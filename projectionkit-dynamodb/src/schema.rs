//! Creation and removal of the OCC table.
//!
//! Both operations are idempotent. Creation waits until the table is
//! `ACTIVE`, so the first write after it returns does not race the
//! provisioning.

use std::time::Duration;

use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_table::DeleteTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client;
use projectionkit::{Operation, RepositoryError};
use tracing::{debug, info, instrument};

use crate::occ::PARTITION_KEY;
use crate::options::TableName;
use crate::repository::map_sdk_error;

const ACTIVE_POLL_INTERVAL: Duration = Duration::from_millis(200);
const ACTIVE_POLL_ATTEMPTS: u32 = 150;

/// Create the OCC table if it does not exist and wait until it is active.
#[instrument(name = "dynamodb.create_table", skip_all, fields(table = %table))]
pub async fn create_table(client: &Client, table: &TableName) -> Result<(), RepositoryError> {
    let key_schema = KeySchemaElement::builder()
        .attribute_name(PARTITION_KEY)
        .key_type(KeyType::Hash)
        .build()
        .map_err(|error| map_sdk_error(error, Operation::CreateSchema))?;
    let attribute = AttributeDefinition::builder()
        .attribute_name(PARTITION_KEY)
        .attribute_type(ScalarAttributeType::B)
        .build()
        .map_err(|error| map_sdk_error(error, Operation::CreateSchema))?;

    let created = client
        .create_table()
        .table_name(table.as_ref())
        .key_schema(key_schema)
        .attribute_definitions(attribute)
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;

    match created {
        Ok(_) => {}
        Err(error)
            if matches!(
                error.as_service_error(),
                Some(CreateTableError::ResourceInUseException(_))
            ) =>
        {
            debug!("[dynamodb.table_exists] OCC table already exists");
        }
        Err(error) => return Err(map_sdk_error(error, Operation::CreateSchema)),
    }

    wait_until_active(client, table).await?;
    info!("[dynamodb.table_created] OCC table is ready");
    Ok(())
}

/// Delete the OCC table, discarding every handler's records.
#[instrument(name = "dynamodb.delete_table", skip_all, fields(table = %table))]
pub async fn delete_table(client: &Client, table: &TableName) -> Result<(), RepositoryError> {
    match client.delete_table().table_name(table.as_ref()).send().await {
        Ok(_) => {
            info!("[dynamodb.table_deleted] OCC table removed");
            Ok(())
        }
        Err(error)
            if matches!(
                error.as_service_error(),
                Some(DeleteTableError::ResourceNotFoundException(_))
            ) =>
        {
            debug!("[dynamodb.table_missing] OCC table does not exist");
            Ok(())
        }
        Err(error) => Err(map_sdk_error(error, Operation::DropSchema)),
    }
}

async fn wait_until_active(client: &Client, table: &TableName) -> Result<(), RepositoryError> {
    for _ in 0..ACTIVE_POLL_ATTEMPTS {
        let described = client
            .describe_table()
            .table_name(table.as_ref())
            .send()
            .await
            .map_err(|error| map_sdk_error(error, Operation::CreateSchema))?;

        let status = described.table().and_then(|t| t.table_status());
        if status == Some(&TableStatus::Active) {
            return Ok(());
        }
        tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
    }

    Err(RepositoryError::new(
        Operation::CreateSchema,
        TableNotActive(table.clone()),
    ))
}

#[derive(Debug, thiserror::Error)]
#[error("table {0} did not become active")]
struct TableNotActive(TableName);
