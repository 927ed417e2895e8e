use async_trait::async_trait;
use tracing::warn;

use crate::errors::ProjectionError;
use crate::handler::{
    Configurable, ProjectionCompactScope, ProjectionConfigurer, ProjectionEventScope,
    ProjectionMessageHandler,
};
use crate::version::Version;

/// A projection handler with no backing store.
///
/// Adaptor constructors return this variant (through
/// [`Binding::Unbound`](crate::Binding::Unbound)) when no database is
/// supplied. Configuration still reaches the user handler, so identity and
/// routes remain observable, but every state-touching operation fails with
/// [`ProjectionError::NotBound`].
#[derive(Debug, Clone)]
pub struct UnboundHandler<H> {
    handler: H,
}

impl<H> UnboundHandler<H> {
    /// Wrap `handler` without binding it to a store.
    pub const fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Borrow the wrapped handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Unwrap the handler, e.g. to bind it once a store is available.
    pub fn into_inner(self) -> H {
        self.handler
    }
}

impl<H> Configurable for UnboundHandler<H>
where
    H: Configurable,
{
    fn configure(&self, configurer: &mut dyn ProjectionConfigurer) {
        self.handler.configure(configurer);
    }
}

#[async_trait]
impl<H, E> ProjectionMessageHandler<E> for UnboundHandler<H>
where
    H: Configurable,
    E: Send + Sync,
{
    async fn handle_event(
        &self,
        _resource: &[u8],
        _current: &Version,
        _next: &Version,
        _scope: &dyn ProjectionEventScope,
        _event: &E,
    ) -> Result<bool, ProjectionError> {
        warn!("[unbound.handle_event] event delivered to unbound projection handler");
        Err(ProjectionError::NotBound)
    }

    async fn resource_version(&self, _resource: &[u8]) -> Result<Version, ProjectionError> {
        Err(ProjectionError::NotBound)
    }

    async fn close_resource(&self, _resource: &[u8]) -> Result<(), ProjectionError> {
        Err(ProjectionError::NotBound)
    }

    async fn compact(&self, _scope: &dyn ProjectionCompactScope) -> Result<(), ProjectionError> {
        Err(ProjectionError::NotBound)
    }
}
