use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ProjectionError;
use crate::handler::{
    Configurable, ProjectionCompactScope, ProjectionConfigurer, ProjectionEventScope,
    ProjectionMessageHandler,
};
use crate::repository::ResourceRepository;
use crate::unbound::UnboundHandler;
use crate::version::Version;

/// A user handler that may or may not be bound to a store.
///
/// Each backend crate exposes a `bind(Option<db>, handler)` constructor that
/// returns `Bound` when a database is supplied and `Unbound` otherwise, so
/// construction never fails for lack of a store and callers can compose
/// the result the same way in both cases.
#[derive(Debug)]
pub enum Binding<A, H> {
    /// The handler's adaptor over a real backend.
    Bound(A),
    /// The handler without a backend.
    Unbound(UnboundHandler<H>),
}

impl<A, H> Binding<A, H> {
    /// Whether a backing store is present.
    pub const fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }
}

impl<A, H> Configurable for Binding<A, H>
where
    A: Configurable,
    H: Configurable,
{
    fn configure(&self, configurer: &mut dyn ProjectionConfigurer) {
        match self {
            Self::Bound(adaptor) => adaptor.configure(configurer),
            Self::Unbound(unbound) => unbound.configure(configurer),
        }
    }
}

#[async_trait]
impl<A, H, E> ProjectionMessageHandler<E> for Binding<A, H>
where
    A: ProjectionMessageHandler<E>,
    H: Configurable,
    E: Send + Sync,
{
    async fn handle_event(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
        scope: &dyn ProjectionEventScope,
        event: &E,
    ) -> Result<bool, ProjectionError> {
        match self {
            Self::Bound(adaptor) => {
                adaptor
                    .handle_event(resource, current, next, scope, event)
                    .await
            }
            Self::Unbound(unbound) => {
                ProjectionMessageHandler::<E>::handle_event(
                    unbound, resource, current, next, scope, event,
                )
                .await
            }
        }
    }

    async fn resource_version(&self, resource: &[u8]) -> Result<Version, ProjectionError> {
        match self {
            Self::Bound(adaptor) => adaptor.resource_version(resource).await,
            Self::Unbound(unbound) => {
                ProjectionMessageHandler::<E>::resource_version(unbound, resource).await
            }
        }
    }

    async fn close_resource(&self, resource: &[u8]) -> Result<(), ProjectionError> {
        match self {
            Self::Bound(adaptor) => adaptor.close_resource(resource).await,
            Self::Unbound(unbound) => {
                ProjectionMessageHandler::<E>::close_resource(unbound, resource).await
            }
        }
    }

    async fn compact(&self, scope: &dyn ProjectionCompactScope) -> Result<(), ProjectionError> {
        match self {
            Self::Bound(adaptor) => adaptor.compact(scope).await,
            Self::Unbound(unbound) => ProjectionMessageHandler::<E>::compact(unbound, scope).await,
        }
    }

    fn resource_repository(&self) -> Option<Arc<dyn ResourceRepository>> {
        match self {
            Self::Bound(adaptor) => adaptor.resource_repository(),
            Self::Unbound(_) => None,
        }
    }
}
