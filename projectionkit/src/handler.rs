//! The projection contract between the delivery engine, the adaptors and
//! application-authored handlers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::ProjectionError;
use crate::repository::ResourceRepository;
use crate::version::Version;

/// Receives a handler's declarations during [`Configurable::configure`].
pub trait ProjectionConfigurer {
    /// Declare the handler's identity.
    ///
    /// `name` is a human-readable label; `key` must be the string form of a
    /// UUID and must never change for the lifetime of the projection.
    fn identity(&mut self, name: &str, key: &str);

    /// Declare that the handler consumes events of the named type.
    fn handles_event_type(&mut self, event_type: &str);
}

/// Anything that can describe itself to a [`ProjectionConfigurer`].
///
/// Every backend's user-facing handler trait extends this, and so does
/// [`ProjectionMessageHandler`], so identity extraction works the same on a
/// raw user handler and on a bound adaptor.
pub trait Configurable: Send + Sync {
    /// Describe the handler. May be called any number of times and must
    /// declare the same identity every time.
    fn configure(&self, configurer: &mut dyn ProjectionConfigurer);
}

/// Per-event context supplied by the delivery engine.
pub trait ProjectionEventScope: Send + Sync {
    /// When the event was recorded.
    fn recorded_at(&self) -> DateTime<Utc>;

    /// Whether this is the primary delivery of the event, as opposed to a
    /// redelivery or replay.
    fn is_primary_delivery(&self) -> bool;

    /// Record an informational message about the handling of this event.
    fn log(&self, message: &str);
}

/// Context supplied by the delivery engine to a compaction run.
pub trait ProjectionCompactScope: Send + Sync {
    /// The engine's notion of the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Record an informational message about the compaction.
    fn log(&self, message: &str);
}

/// The projection contract invoked by the delivery engine.
///
/// Adaptors implement this by binding a user handler to a backend. The
/// engine supplies, for each event, the *current* version it believes the
/// resource to be at and the *next* version the event advances it to.
///
/// # Contract
///
/// - [`handle_event`](Self::handle_event) returns `Ok(true)` when both the
///   OCC update and the user handler's mutations committed atomically,
///   `Ok(false)` when `current` did not match the stored version (nothing
///   was applied, the engine should re-read the version and retry), and
///   `Err` when anything failed (nothing was applied).
/// - Concurrent calls are safe, including for the same resource; mutual
///   exclusion is the backend's conflict detection, not an in-process lock.
/// - Dropping an in-flight future rolls back its transaction.
#[async_trait]
pub trait ProjectionMessageHandler<E>: Configurable
where
    E: Send + Sync,
{
    /// Apply `event` to the projection if `resource` is still at `current`,
    /// advancing it to `next`.
    async fn handle_event(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
        scope: &dyn ProjectionEventScope,
        event: &E,
    ) -> Result<bool, ProjectionError>;

    /// The version `resource` is at, or [`Version::absent`] if unseen.
    async fn resource_version(&self, resource: &[u8]) -> Result<Version, ProjectionError>;

    /// Discard the OCC record of a resource that will receive no more
    /// events. Closing an unseen resource succeeds.
    async fn close_resource(&self, resource: &[u8]) -> Result<(), ProjectionError>;

    /// Forward to the user handler's compaction routine. May run
    /// concurrently with `handle_event`.
    async fn compact(&self, scope: &dyn ProjectionCompactScope) -> Result<(), ProjectionError>;

    /// The repository holding this handler's OCC records, for higher-level
    /// projections that manage versions directly.
    ///
    /// Returns `None` when the handler has no repository, in which case the
    /// helpers in [`resource`](crate::resource) report
    /// [`ProjectionError::NotSupported`].
    fn resource_repository(&self) -> Option<Arc<dyn ResourceRepository>> {
        None
    }
}
