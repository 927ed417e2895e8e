//! In-memory adapter for `projectionkit`
//!
//! This crate keeps a projection's derived state and its OCC records in
//! process memory, guarded by a single lock. It is useful for tests and for
//! projections whose state can be rebuilt from the event stream on start.
//!
//! A projection's state is an ordered map. The transaction scope handed to
//! the user handler is a [`Transaction`] overlay on that map: the handler's
//! writes are staged in the overlay and merged into the live state only if
//! the handler succeeds, in the same critical section that advances the
//! resource version.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use projectionkit::{
    identity, Configurable, HandlerKey, IdentityError, ProjectionCompactScope,
    ProjectionConfigurer, ProjectionError, ProjectionEventScope, ProjectionMessageHandler,
    RepositoryError, ResourceRepository, Version,
};
use tracing::{debug, instrument};

mod transaction;

pub use transaction::Transaction;

/// Application-authored projection over in-memory state.
pub trait MessageHandler: Configurable {
    /// Key of one projection entry.
    type Key: Ord + Clone + Send + Sync + 'static;

    /// Value of one projection entry.
    type Value: Clone + Send + Sync + 'static;

    /// The domain event type this handler consumes.
    type Event: Send + Sync;

    /// The error type returned when handling fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply `event` through `tx`.
    ///
    /// If this returns an error the staged writes are discarded and the
    /// live state is left untouched.
    fn handle_event(
        &self,
        tx: &mut Transaction<'_, Self::Key, Self::Value>,
        scope: &dyn ProjectionEventScope,
        event: &Self::Event,
    ) -> Result<(), Self::Error>;

    /// Reduce the size of the state, e.g. by discarding expired entries.
    fn compact(
        &self,
        _tx: &mut Transaction<'_, Self::Key, Self::Value>,
        _scope: &dyn ProjectionCompactScope,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// State and OCC records of one handler, always mutated together.
#[derive(Debug, Default)]
struct Store<S> {
    state: S,
    versions: HashMap<Vec<u8>, Vec<u8>>,
}

impl<S> Store<S> {
    fn version(&self, resource: &[u8]) -> Version {
        self.versions
            .get(resource)
            .map_or_else(Version::absent, |version| Version::from(version.as_slice()))
    }

    fn matches(&self, resource: &[u8], current: &Version) -> bool {
        match self.versions.get(resource) {
            None => current.is_absent(),
            Some(stored) => !current.is_absent() && stored.as_slice() == current.as_bytes(),
        }
    }

    fn set(&mut self, resource: &[u8], version: &Version) {
        if version.is_absent() {
            let _ = self.versions.remove(resource);
        } else {
            let _ = self
                .versions
                .insert(resource.to_vec(), version.as_bytes().to_vec());
        }
    }
}

/// Thread-safe in-memory OCC repository.
///
/// Clones share storage. A repository obtained from an [`Adaptor`] shares
/// its lock with the handler's state, so direct version changes serialize
/// with event handling.
pub struct MemoryRepository<S = ()> {
    store: Arc<RwLock<Store<S>>>,
}

impl MemoryRepository<()> {
    /// Create a new, empty repository with no attached state.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
        }
    }
}

impl Default for MemoryRepository<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for MemoryRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[async_trait]
impl<S> ResourceRepository for MemoryRepository<S>
where
    S: Send + Sync,
{
    async fn resource_version(&self, resource: &[u8]) -> Result<Version, RepositoryError> {
        Ok(self.store.read().version(resource))
    }

    async fn store_resource_version(
        &self,
        resource: &[u8],
        version: &Version,
    ) -> Result<(), RepositoryError> {
        self.store.write().set(resource, version);
        Ok(())
    }

    async fn update_resource_version(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
    ) -> Result<bool, RepositoryError> {
        let mut store = self.store.write();
        if !store.matches(resource, current) {
            return Ok(false);
        }
        store.set(resource, next);
        Ok(true)
    }

    async fn delete_resource(&self, resource: &[u8]) -> Result<(), RepositoryError> {
        let _ = self.store.write().versions.remove(resource);
        Ok(())
    }
}

/// Entries of a handler's projection.
pub type State<H> = BTreeMap<<H as MessageHandler>::Key, <H as MessageHandler>::Value>;

/// Binds a [`MessageHandler`] to in-memory storage.
pub struct Adaptor<H>
where
    H: MessageHandler,
{
    key: HandlerKey,
    handler: H,
    store: Arc<RwLock<Store<State<H>>>>,
}

impl<H> Adaptor<H>
where
    H: MessageHandler,
{
    /// Bind `handler` to fresh, empty state.
    pub fn new(handler: H) -> Result<Self, IdentityError> {
        let key = identity::key(&handler)?;
        Ok(Self {
            key,
            handler,
            store: Arc::new(RwLock::new(Store::default())),
        })
    }

    /// The handler's identity key.
    pub const fn key(&self) -> HandlerKey {
        self.key
    }

    /// Borrow the user handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Run `f` against a consistent snapshot of the projection's state.
    pub fn query<R>(&self, f: impl FnOnce(&State<H>) -> R) -> R {
        f(&self.store.read().state)
    }

    /// A repository sharing this adaptor's storage.
    pub fn repository(&self) -> MemoryRepository<State<H>> {
        MemoryRepository {
            store: Arc::clone(&self.store),
        }
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
    #[instrument(name = "memory.handle_event", skip_all, fields(handler = %self.key))]
    async fn handle_event(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
        scope: &dyn ProjectionEventScope,
        event: &H::Event,
    ) -> Result<bool, ProjectionError> {
        let mut store = self.store.write();

        if !store.matches(resource, current) {
            debug!(
                current = %current,
                stored = %store.version(resource),
                "[memory.occ_conflict] resource version mismatch"
            );
            return Ok(false);
        }

        let mut tx = Transaction::new(&store.state);
        self.handler
            .handle_event(&mut tx, scope, event)
            .map_err(ProjectionError::handler)?;
        let writes = tx.into_writes();

        debug!(writes = writes.len(), "[memory.commit] applying staged writes");
        transaction::apply(&mut store.state, writes);
        store.set(resource, next);
        Ok(true)
    }

    async fn resource_version(&self, resource: &[u8]) -> Result<Version, ProjectionError> {
        Ok(self.store.read().version(resource))
    }

    async fn close_resource(&self, resource: &[u8]) -> Result<(), ProjectionError> {
        let _ = self.store.write().versions.remove(resource);
        Ok(())
    }

    #[instrument(name = "memory.compact", skip_all, fields(handler = %self.key))]
    async fn compact(&self, scope: &dyn ProjectionCompactScope) -> Result<(), ProjectionError> {
        let mut store = self.store.write();
        let mut tx = Transaction::new(&store.state);
        self.handler
            .compact(&mut tx, scope)
            .map_err(ProjectionError::handler)?;
        let writes = tx.into_writes();

        transaction::apply(&mut store.state, writes);
        Ok(())
    }

    fn resource_repository(&self) -> Option<Arc<dyn ResourceRepository>> {
        Some(Arc::new(self.repository()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_storage() {
        let repository = MemoryRepository::new();
        let clone = repository.clone();

        assert!(Arc::ptr_eq(&repository.store, &clone.store));
    }

    #[test]
    fn present_current_never_matches_missing_record() {
        let store: Store<()> = Store::default();

        assert!(store.matches(b"R", &Version::absent()));
        assert!(!store.matches(b"R", &Version::from("V1")));
    }

    #[test]
    fn setting_absent_removes_the_record() {
        let mut store: Store<()> = Store::default();
        store.set(b"R", &Version::from("V1"));
        store.set(b"R", &Version::absent());

        assert!(store.versions.is_empty());
    }
}
