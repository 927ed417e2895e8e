//! Direct version management for handlers that expose their repository.
//!
//! Higher-level projections occasionally need to manipulate OCC records
//! outside of event handling (seeding, migration, manual recovery). These
//! helpers reach the repository through
//! [`ProjectionMessageHandler::resource_repository`] and fail with
//! [`ProjectionError::NotSupported`] when the handler has none.

use std::sync::Arc;

use crate::errors::ProjectionError;
use crate::handler::ProjectionMessageHandler;
use crate::repository::ResourceRepository;
use crate::version::Version;

/// The repository behind `handler`.
pub fn repository_of<H, E>(handler: &H) -> Result<Arc<dyn ResourceRepository>, ProjectionError>
where
    H: ProjectionMessageHandler<E> + ?Sized,
    E: Send + Sync,
{
    handler
        .resource_repository()
        .ok_or(ProjectionError::NotSupported)
}

/// Unconditionally set the version of `resource`.
pub async fn store_version<H, E>(
    handler: &H,
    resource: &[u8],
    version: &Version,
) -> Result<(), ProjectionError>
where
    H: ProjectionMessageHandler<E> + ?Sized,
    E: Send + Sync,
{
    let repository = repository_of::<H, E>(handler)?;
    repository
        .store_resource_version(resource, version)
        .await
        .map_err(ProjectionError::from)
}

/// Compare-and-update the version of `resource` without handling an event.
pub async fn update_version<H, E>(
    handler: &H,
    resource: &[u8],
    current: &Version,
    next: &Version,
) -> Result<bool, ProjectionError>
where
    H: ProjectionMessageHandler<E> + ?Sized,
    E: Send + Sync,
{
    let repository = repository_of::<H, E>(handler)?;
    repository
        .update_resource_version(resource, current, next)
        .await
        .map_err(ProjectionError::from)
}

/// Remove the OCC record of `resource`.
pub async fn delete_resource<H, E>(handler: &H, resource: &[u8]) -> Result<(), ProjectionError>
where
    H: ProjectionMessageHandler<E> + ?Sized,
    E: Send + Sync,
{
    let repository = repository_of::<H, E>(handler)?;
    repository
        .delete_resource(resource)
        .await
        .map_err(ProjectionError::from)
}
