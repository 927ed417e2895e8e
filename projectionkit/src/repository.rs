use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::version::Version;

/// Backend-agnostic store of OCC records.
///
/// A repository is bound to one handler key at construction time and maps
/// each resource id to the version that handler has reached on it. It is
/// the only authoritative record of a handler's progress.
///
/// # Semantics of [`update_resource_version`](Self::update_resource_version)
///
/// | `current` | stored record     | `next`     | effect                    | result  |
/// |-----------|-------------------|------------|---------------------------|---------|
/// | absent    | none              | any        | insert `next` (none if absent) | `true`  |
/// | absent    | exists            | any        | none                      | `false` |
/// | present   | equal to current  | absent     | delete record             | `true`  |
/// | present   | equal to current  | present    | overwrite                 | `true`  |
/// | present   | unequal / missing | any        | none                      | `false` |
///
/// Comparison is byte-level equality. Implementations map duplicate-key and
/// conditional-write rejections to `Ok(false)`; only genuine backend
/// failures become errors.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// The stored version of `resource`, or [`Version::absent`].
    async fn resource_version(&self, resource: &[u8]) -> Result<Version, RepositoryError>;

    /// Unconditionally set the version of `resource`. Storing the absent
    /// version deletes the record.
    async fn store_resource_version(
        &self,
        resource: &[u8],
        version: &Version,
    ) -> Result<(), RepositoryError>;

    /// Atomically replace `current` with `next`, reporting whether the
    /// stored version matched.
    async fn update_resource_version(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
    ) -> Result<bool, RepositoryError>;

    /// Remove the record of `resource`. Removing a missing record succeeds.
    async fn delete_resource(&self, resource: &[u8]) -> Result<(), RepositoryError>;
}
