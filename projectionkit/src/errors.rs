use thiserror::Error;

/// Type-erased error used wherever a backend or user handler error is
/// carried through without interpretation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Identifies the repository operation that failed.
///
/// Used by [`RepositoryError`] to provide strongly-typed identification of
/// which operation encountered a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Reading the stored version of a resource.
    ResourceVersion,
    /// Unconditionally storing a resource version.
    StoreResourceVersion,
    /// Compare-and-update of a resource version.
    UpdateResourceVersion,
    /// Removing a resource's OCC record.
    DeleteResource,
    /// Beginning a backend transaction.
    BeginTransaction,
    /// Committing a backend transaction.
    CommitTransaction,
    /// Creating the OCC schema.
    CreateSchema,
    /// Dropping the OCC schema.
    DropSchema,
    /// Probing a backend for dialect compatibility.
    Probe,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResourceVersion => write!(f, "resource_version"),
            Self::StoreResourceVersion => write!(f, "store_resource_version"),
            Self::UpdateResourceVersion => write!(f, "update_resource_version"),
            Self::DeleteResource => write!(f, "delete_resource"),
            Self::BeginTransaction => write!(f, "begin_transaction"),
            Self::CommitTransaction => write!(f, "commit_transaction"),
            Self::CreateSchema => write!(f, "create_schema"),
            Self::DropSchema => write!(f, "drop_schema"),
            Self::Probe => write!(f, "probe"),
        }
    }
}

/// A backend failure surfaced by a repository or driver.
///
/// The core never classifies backend errors as transient or permanent; the
/// original error is kept as the source so the delivery engine can decide
/// whether to retry. An OCC mismatch is *not* a `RepositoryError`: drivers
/// report it as `Ok(false)` from
/// [`update_resource_version`](crate::ResourceRepository::update_resource_version).
#[derive(Debug, Error)]
#[error("{operation} operation failed")]
pub struct RepositoryError {
    operation: Operation,
    #[source]
    source: BoxError,
}

impl RepositoryError {
    /// Wrap a backend error raised while performing `operation`.
    pub fn new(operation: Operation, source: impl Into<BoxError>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }

    /// The operation that failed.
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Borrow the backend error.
    pub fn backend_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// Failure to derive a [`HandlerKey`](crate::HandlerKey) from a handler's
/// configuration.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The handler's `configure` never called `identity`.
    #[error("projection handler did not declare an identity")]
    Missing,

    /// The declared key is not a UUID.
    #[error("identity key {key:?} of projection handler {name:?} is not a valid UUID")]
    InvalidKey {
        /// The declared handler name.
        name: String,
        /// The rejected key text.
        key: String,
        /// Parser failure.
        #[source]
        source: uuid::Error,
    },
}

/// Error type returned at the projection adaptor boundary.
///
/// OCC mismatches are not errors; they are reported as `Ok(false)` from
/// [`handle_event`](crate::ProjectionMessageHandler::handle_event).
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Every state-touching operation on an [`UnboundHandler`](crate::UnboundHandler).
    #[error("projection handler has not been bound to a database")]
    NotBound,

    /// An optional capability was requested from a handler that lacks it.
    #[error("the handler does not support this operation")]
    NotSupported,

    /// Backend failure, passed through unchanged.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The user handler failed; its transaction was rolled back.
    #[error("projection handler failed")]
    Handler(#[source] BoxError),

    /// The handler's identity could not be determined.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl ProjectionError {
    /// Wrap an error raised by user handler code.
    pub fn handler(source: impl Into<BoxError>) -> Self {
        Self::Handler(source.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_bound_message_is_stable() {
        assert_eq!(
            ProjectionError::NotBound.to_string(),
            "projection handler has not been bound to a database"
        );
    }

    #[test]
    fn repository_error_names_operation_and_keeps_source() {
        let error = RepositoryError::new(Operation::CommitTransaction, "connection reset");

        assert_eq!(error.to_string(), "commit_transaction operation failed");
        assert_eq!(error.operation(), Operation::CommitTransaction);
        assert_eq!(error.backend_error().to_string(), "connection reset");
    }

    #[test]
    fn repository_errors_pass_through_projection_errors_transparently() {
        let error = ProjectionError::from(RepositoryError::new(
            Operation::ResourceVersion,
            "timeout",
        ));

        assert_eq!(error.to_string(), "resource_version operation failed");
    }
}
