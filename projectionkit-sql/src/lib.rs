//! Relational adapter for `projectionkit`
//!
//! Binds a projection handler to a SQL database through an [`sqlx::AnyPool`].
//! OCC records live in a single table shared by every handler:
//!
//! ```sql
//! projection_occ (handler, resource, version, PRIMARY KEY (handler, resource))
//! ```
//!
//! Each event is applied in one transaction that first advances the
//! resource version and then runs the user handler on the same connection,
//! so the handler's writes and the version change commit together or not
//! at all.
//!
//! The dialect is discovered by probing the database with each candidate
//! [`Driver`] in turn (PostgreSQL, SQLite, then MySQL when the `mysql`
//! feature is enabled). Probing happens once per repository; use
//! [`Options::with_driver`] to skip it.
//!
//! Remember to call [`sqlx::any::install_default_drivers`] before
//! connecting an `AnyPool`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adaptor;
pub mod driver;
mod options;
mod repository;
pub mod schema;

use projectionkit::{Binding, IdentityError, UnboundHandler};
use sqlx::AnyPool;

pub use adaptor::{Adaptor, MessageHandler};
pub use driver::{Dialect, Driver};
pub use options::Options;
pub use repository::SqlRepository;
pub use schema::{create_schema, drop_schema};

/// Bind `handler` to `pool`, or leave it unbound when there is no pool.
///
/// An unbound handler still reports its identity but fails every
/// state-touching operation with
/// [`ProjectionError::NotBound`](projectionkit::ProjectionError::NotBound).
pub fn bind<H>(
    pool: Option<AnyPool>,
    handler: H,
    options: &Options,
) -> Result<Binding<Adaptor<H>, H>, IdentityError>
where
    H: MessageHandler,
{
    match pool {
        Some(pool) => Adaptor::new(pool, handler, options).map(Binding::Bound),
        None => Ok(Binding::Unbound(UnboundHandler::new(handler))),
    }
}
