use std::sync::Arc;

use async_trait::async_trait;
use projectionkit::{
    identity, Configurable, HandlerKey, IdentityError, Operation, ProjectionCompactScope,
    ProjectionConfigurer, ProjectionError, ProjectionEventScope, ProjectionMessageHandler,
    ResourceRepository, Version,
};
use sqlx::{AnyConnection, AnyPool};
use tracing::{debug, instrument, warn};

use crate::options::Options;
use crate::repository::{map_sqlx_error, SqlRepository};

/// Application-authored projection over a relational database.
#[async_trait]
pub trait MessageHandler: Configurable {
    /// The domain event type this handler consumes.
    type Event: Send + Sync;

    /// The error type returned when handling fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply `event` to the projection.
    ///
    /// `tx` is a connection inside the transaction that also advances the
    /// resource version. Every statement the handler issues for this event
    /// must go through it; nothing commits unless this returns `Ok`.
    async fn handle_event(
        &self,
        tx: &mut AnyConnection,
        scope: &dyn ProjectionEventScope,
        event: &Self::Event,
    ) -> Result<(), Self::Error>;

    /// Reduce the size of the projection, e.g. by deleting expired rows.
    async fn compact(
        &self,
        _db: &AnyPool,
        _scope: &dyn ProjectionCompactScope,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Binds a [`MessageHandler`] to a relational database.
pub struct Adaptor<H> {
    handler: H,
    repository: SqlRepository,
}

impl<H> Adaptor<H>
where
    H: MessageHandler,
{
    /// Bind `handler` to `pool`.
    ///
    /// No I/O happens here: the driver is resolved, and the schema created
    /// if so configured, on first use.
    pub fn new(pool: AnyPool, handler: H, options: &Options) -> Result<Self, IdentityError> {
        let key = identity::key(&handler)?;
        Ok(Self {
            handler,
            repository: SqlRepository::new(pool, key, options),
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
    pub const fn repository(&self) -> &SqlRepository {
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
    #[instrument(name = "sql.handle_event", skip_all, fields(handler = %self.key()))]
    async fn handle_event(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
        scope: &dyn ProjectionEventScope,
        event: &H::Event,
    ) -> Result<bool, ProjectionError> {
        let driver = self.repository.driver().await?;
        let key = self.key();

        let mut tx = self
            .repository
            .pool()
            .begin()
            .await
            .map_err(|error| map_sqlx_error(error, Operation::BeginTransaction))?;

        let applied = driver
            .update_version(&mut tx, &key, resource, current, next)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::UpdateResourceVersion))?;

        if !applied {
            debug!(current = %current, "[sql.occ_conflict] resource version mismatch");
            if let Err(error) = tx.rollback().await {
                warn!(error = %error, "[sql.rollback_failed] rollback after conflict failed");
            }
            return Ok(false);
        }

        if let Err(handler_error) = self.handler.handle_event(&mut tx, scope, event).await {
            if let Err(error) = tx.rollback().await {
                warn!(error = %error, "[sql.rollback_failed] rollback after handler error failed");
            }
            return Err(ProjectionError::handler(handler_error));
        }

        tx.commit()
            .await
            .map_err(|error| map_sqlx_error(error, Operation::CommitTransaction))?;
        Ok(true)
    }

    async fn resource_version(&self, resource: &[u8]) -> Result<Version, ProjectionError> {
        Ok(self.repository.resource_version(resource).await?)
    }

    async fn close_resource(&self, resource: &[u8]) -> Result<(), ProjectionError> {
        Ok(self.repository.delete_resource(resource).await?)
    }

    #[instrument(name = "sql.compact", skip_all, fields(handler = %self.key()))]
    async fn compact(&self, scope: &dyn ProjectionCompactScope) -> Result<(), ProjectionError> {
        self.handler
            .compact(self.repository.pool(), scope)
            .await
            .map_err(ProjectionError::handler)
    }

    fn resource_repository(&self) -> Option<Arc<dyn ResourceRepository>> {
        Some(Arc::new(self.repository.clone()))
    }
}
