//! Shared fixtures for projectionkit-dynamodb integration tests.
//!
//! DynamoDB Local runs in one container shared by every test in a binary.
//! Each test uses its own table so tests never observe each other.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::env;
use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType, TransactWriteItem, Update,
};
use aws_sdk_dynamodb::Client;
use projectionkit::{Configurable, HandlerKey, ProjectionConfigurer, ProjectionEventScope};
use projectionkit_dynamodb::{DynamoRepository, MessageHandler, Options, TableName};
use testcontainers::{runners::SyncRunner, Container, ImageExt};
use testcontainers_modules::dynamodb_local::DynamoDb;
use uuid::Uuid;

static SHARED_CONTAINER: OnceLock<SharedDynamo> = OnceLock::new();

struct SharedDynamo {
    endpoint: String,
    #[allow(dead_code)]
    container: Container<DynamoDb>,
}

fn dynamodb_local_version() -> String {
    env::var("DYNAMODB_LOCAL_VERSION").unwrap_or_else(|_| "2.5.4".to_string())
}

fn get_shared_dynamo() -> &'static SharedDynamo {
    SHARED_CONTAINER.get_or_init(|| {
        // Run container setup in a separate thread to avoid tokio runtime conflicts
        std::thread::spawn(|| {
            let container = DynamoDb::default()
                .with_tag(dynamodb_local_version())
                .start()
                .expect("should start dynamodb-local container");

            let host_port = container
                .get_host_port_ipv4(8000)
                .expect("should get dynamodb-local port");

            SharedDynamo {
                endpoint: format!("http://127.0.0.1:{host_port}"),
                container,
            }
        })
        .join()
        .expect("container setup thread should complete")
    })
}

/// Route log output through the test harness; `RUST_LOG` selects levels.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client for the shared DynamoDB Local container.
pub async fn client() -> Client {
    let shared = get_shared_dynamo();
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .endpoint_url(shared.endpoint.clone())
        .credentials_provider(Credentials::new(
            "projectionkit",
            "projectionkit",
            None,
            None,
            "projectionkit-tests",
        ))
        .load()
        .await;
    Client::new(&config)
}

/// A table name no other test uses.
pub fn unique_table(prefix: &str) -> TableName {
    TableName::try_new(format!("{prefix}-{}", Uuid::now_v7().simple()))
        .expect("valid table name")
}

/// Options for a fresh OCC table that is created on first use.
pub fn options() -> Options {
    Options::new(unique_table("occ")).create_table_on_first_use(true)
}

/// A repository for a fresh handler key and a fresh table.
pub async fn repository() -> DynamoRepository {
    DynamoRepository::new(client().await, HandlerKey::new(Uuid::now_v7()), &options())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyEvent {
    Counted { name: String },
    /// Fails before producing any write.
    Poisoned,
}

#[derive(Debug)]
pub enum TallyError {
    Request(aws_sdk_dynamodb::error::BuildError),
    Poisoned,
}

impl fmt::Display for TallyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(error) => write!(f, "invalid tally request: {error}"),
            Self::Poisoned => f.write_str("poisoned event"),
        }
    }
}

impl std::error::Error for TallyError {}

/// Counts events per name in its own table.
pub struct Tally {
    pub table: TableName,
}

pub const TALLY_KEY: &str = "5e0c7a21-93d4-4b8f-a6e2-1f7d0b3c9a44";

impl Configurable for Tally {
    fn configure(&self, c: &mut dyn ProjectionConfigurer) {
        c.identity("tally", TALLY_KEY);
        c.handles_event_type("Counted");
    }
}

#[async_trait]
impl MessageHandler for Tally {
    type Event = TallyEvent;
    type Error = TallyError;

    async fn handle_event(
        &self,
        _db: &Client,
        scope: &dyn ProjectionEventScope,
        event: &Self::Event,
    ) -> Result<Vec<TransactWriteItem>, Self::Error> {
        let TallyEvent::Counted { name } = event else {
            return Err(TallyError::Poisoned);
        };

        let update = Update::builder()
            .table_name(self.table.as_ref())
            .key("name", AttributeValue::S(name.clone()))
            .update_expression("ADD #c :one")
            .expression_attribute_names("#c", "count")
            .expression_attribute_values(":one", AttributeValue::N("1".to_owned()))
            .build()
            .map_err(TallyError::Request)?;

        scope.log("tally updated");
        Ok(vec![TransactWriteItem::builder().update(update).build()])
    }
}

/// Create the table the tally handler writes to.
pub async fn create_tally_table(client: &Client, table: &TableName) {
    let _ = client
        .create_table()
        .table_name(table.as_ref())
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name("name")
                .key_type(KeyType::Hash)
                .build()
                .expect("valid key schema"),
        )
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name("name")
                .attribute_type(ScalarAttributeType::S)
                .build()
                .expect("valid attribute definition"),
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
        .expect("should create tally table");
}

/// The tally for `name`, if it was ever counted.
pub async fn count(client: &Client, table: &TableName, name: &str) -> Option<u64> {
    let output = client
        .get_item()
        .table_name(table.as_ref())
        .key("name", AttributeValue::S(name.to_owned()))
        .consistent_read(true)
        .send()
        .await
        .expect("should read tally");

    output
        .item()
        .and_then(|item| item.get("count"))
        .and_then(|value| value.as_n().ok())
        .map(|n| n.parse().expect("numeric count"))
}
