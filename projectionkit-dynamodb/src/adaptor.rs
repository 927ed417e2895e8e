use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::TransactWriteItem;
use aws_sdk_dynamodb::Client;
use projectionkit::{
    identity, Configurable, HandlerKey, IdentityError, ProjectionCompactScope,
    ProjectionConfigurer, ProjectionError, ProjectionEventScope, ProjectionMessageHandler,
    ResourceRepository, Version,
};
use tracing::instrument;

use crate::options::Options;
use crate::repository::DynamoRepository;

/// Application-authored projection over DynamoDB.
///
/// DynamoDB has no interactive transactions. Instead of writing through a
/// transaction handle, the handler returns the writes it wants to make;
/// they are committed in one `TransactWriteItems` request together with the
/// resource-version update.
#[async_trait]
pub trait MessageHandler: Configurable {
    /// The domain event type this handler consumes.
    type Event: Send + Sync;

    /// The error type returned when handling fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Describe the writes that apply `event` to the projection.
    ///
    /// `db` may be used for reads. Writes sent directly through it are not
    /// part of the transaction and are not protected against redelivery.
    /// DynamoDB limits a transaction to 100 items, one of which is the
    /// version update.
    ///
    /// Runs before the version condition is evaluated, so it is also
    /// called for stale deliveries. Their returned writes are discarded,
    /// but anything else the call does is not, and an error it returns
    /// reaches the caller instead of `Ok(false)`.
    async fn handle_event(
        &self,
        db: &Client,
        scope: &dyn ProjectionEventScope,
        event: &Self::Event,
    ) -> Result<Vec<TransactWriteItem>, Self::Error>;

    /// Reduce the size of the projection, e.g. by deleting expired items.
    async fn compact(
        &self,
        _db: &Client,
        _scope: &dyn ProjectionCompactScope,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Binds a [`MessageHandler`] to DynamoDB.
pub struct Adaptor<H> {
    handler: H,
    repository: DynamoRepository,
}

impl<H> Adaptor<H>
where
    H: MessageHandler,
{
    /// Bind `handler` to `client`, keeping OCC records in the table named by
    /// `options`.
    pub fn new(client: Client, handler: H, options: &Options) -> Result<Self, IdentityError> {
        let key = identity::key(&handler)?;
        Ok(Self {
            handler,
            repository: DynamoRepository::new(client, key, options),
        })
    }

    /// The handler's identity key.
    pub fn key(&self) -> HandlerKey {
        self.repository.key()
    }

    /// Borrow the user handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// The repository holding this handler's OCC records.
    pub const fn repository(&self) -> &DynamoRepository {
        &self.repository
    }
}

impl<H> Configurable for Adaptor<H>
where
    H: MessageHandler,
{
    fn configure(&self, configurer: &mut dyn ProjectionConfigurer) {
        self.handler.configure(configurer);
    }
}

#[async_trait]
impl<H> ProjectionMessageHandler<H::Event> for Adaptor<H>
where
    H: MessageHandler,
{
    /// Collects the handler's writes, then commits them with the version
    /// update in one transaction.
    ///
    /// The version check happens inside that transaction, after the
    /// handler has run. A stale delivery therefore still invokes the
    /// handler: its writes are cancelled with the transaction and the call
    /// returns `Ok(false)`, unless the handler itself fails, in which case
    /// the handler error is returned and nothing is written.
    #[instrument(name = "dynamodb.handle_event", skip_all, fields(handler = %self.key()))]
    async fn handle_event(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
        scope: &dyn ProjectionEventScope,
        event: &H::Event,
    ) -> Result<bool, ProjectionError> {
        self.repository.ensure_table().await?;

        let items = self
            .handler
            .handle_event(self.repository.client(), scope, event)
            .await
            .map_err(ProjectionError::handler)?;

        Ok(self
            .repository
            .transact(resource, current, next, items)
            .await?)
    }

    async fn resource_version(&self, resource: &[u8]) -> Result<Version, ProjectionError> {
        Ok(self.repository.resource_version(resource).await?)
    }

    async fn close_resource(&self, resource: &[u8]) -> Result<(), ProjectionError> {
        Ok(self.repository.delete_resource(resource).await?)
    }

    #[instrument(name = "dynamodb.compact", skip_all, fields(handler = %self.key()))]
    async fn compact(&self, scope: &dyn ProjectionCompactScope) -> Result<(), ProjectionError> {
        self.handler
            .compact(self.repository.client(), scope)
            .await
            .map_err(ProjectionError::handler)
    }

    fn resource_repository(&self) -> Option<Arc<dyn ResourceRepository>> {
        Some(Arc::new(self.repository.clone()))
    }
}
