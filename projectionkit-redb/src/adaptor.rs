use std::sync::Arc;

use async_trait::async_trait;
use projectionkit::{
    identity, Configurable, HandlerKey, IdentityError, Operation, ProjectionCompactScope,
    ProjectionConfigurer, ProjectionError, ProjectionEventScope, ProjectionMessageHandler,
    ResourceRepository, Version,
};
use redb::{Database, WriteTransaction};
use tracing::{debug, instrument};

use crate::occ;
use crate::repository::{abort, map_redb_error, RedbRepository};

/// Application-authored projection over a redb database.
pub trait MessageHandler: Configurable {
    /// The domain event type this handler consumes.
    type Event: Send + Sync;

    /// The error type returned when handling fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply `event` to the projection's tables through `tx`.
    ///
    /// `tx` has already advanced the resource version. It commits only if
    /// this returns `Ok`. The table `projection_occ/<key>` is reserved.
    fn handle_event(
        &self,
        tx: &WriteTransaction,
        scope: &dyn ProjectionEventScope,
        event: &Self::Event,
    ) -> Result<(), Self::Error>;

    /// Reduce the size of the projection, e.g. by removing expired keys.
    fn compact(
        &self,
        _db: &Database,
        _scope: &dyn ProjectionCompactScope,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Binds a [`MessageHandler`] to a redb database.
///
/// redb is a blocking store: each operation runs to completion on the
/// calling task, and write transactions, including the user handler's
/// work, are serialized by the database.
pub struct Adaptor<H> {
    handler: H,
    repository: RedbRepository,
}

impl<H> Adaptor<H>
where
    H: MessageHandler,
{
    /// Bind `handler` to `db`.
    pub fn new(db: Arc<Database>, handler: H) -> Result<Self, IdentityError> {
        let key = identity::key(&handler)?;
        Ok(Self {
            handler,
            repository: RedbRepository::new(db, key),
        })
    }

    /// The handler's identity key.
    pub const fn key(&self) -> HandlerKey {
        self.repository.key()
    }

    /// Borrow the user handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// The repository holding this handler's OCC records.
    pub const fn repository(&self) -> &RedbRepository {
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
    #[instrument(name = "redb.handle_event", skip_all, fields(handler = %self.key()))]
    async fn handle_event(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
        scope: &dyn ProjectionEventScope,
        event: &H::Event,
    ) -> Result<bool, ProjectionError> {
        let tx = self
            .repository
            .database()
            .begin_write()
            .map_err(|error| map_redb_error(error, Operation::BeginTransaction))?;

        let applied = match occ::update(&tx, self.repository.table(), resource, current, next) {
            Ok(applied) => applied,
            Err(error) => {
                abort(tx);
                return Err(map_redb_error(error, Operation::UpdateResourceVersion).into());
            }
        };

        if !applied {
            debug!(current = %current, "[redb.occ_conflict] resource version mismatch");
            abort(tx);
            return Ok(false);
        }

        if let Err(error) = self.handler.handle_event(&tx, scope, event) {
            abort(tx);
            return Err(ProjectionError::handler(error));
        }

        tx.commit()
            .map_err(|error| map_redb_error(error, Operation::CommitTransaction))?;
        Ok(true)
    }

    async fn resource_version(&self, resource: &[u8]) -> Result<Version, ProjectionError> {
        Ok(self.repository.resource_version(resource).await?)
    }

    async fn close_resource(&self, resource: &[u8]) -> Result<(), ProjectionError> {
        Ok(self.repository.delete_resource(resource).await?)
    }

    #[instrument(name = "redb.compact", skip_all, fields(handler = %self.key()))]
    async fn compact(&self, scope: &dyn ProjectionCompactScope) -> Result<(), ProjectionError> {
        self.handler
            .compact(self.repository.database(), scope)
            .map_err(ProjectionError::handler)
    }

    fn resource_repository(&self) -> Option<Arc<dyn ResourceRepository>> {
        Some(Arc::new(self.repository.clone()))
    }
}
