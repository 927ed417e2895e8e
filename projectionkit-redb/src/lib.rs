//! Embedded key-value adapter for `projectionkit`, backed by [redb].
//!
//! Every handler gets its own table, `projection_occ/<handler-key>`,
//! mapping resource ids to versions. Event handling runs in a single redb
//! write transaction: the OCC update first, then the user handler on the
//! same transaction, then one commit.
//!
//! [redb]: https://docs.rs/redb

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adaptor;
mod occ;
mod repository;
pub mod schema;

use std::sync::Arc;

use projectionkit::{Binding, IdentityError, UnboundHandler};
use redb::Database;

pub use adaptor::{Adaptor, MessageHandler};
pub use repository::RedbRepository;
pub use schema::{create_schema, drop_schema};

/// Bind `handler` to `db`, or leave it unbound when there is no database.
pub fn bind<H>(
    db: Option<Arc<Database>>,
    handler: H,
) -> Result<Binding<Adaptor<H>, H>, IdentityError>
where
    H: MessageHandler,
{
    match db {
        Some(db) => Adaptor::new(db, handler).map(Binding::Bound),
        None => Ok(Binding::Unbound(UnboundHandler::new(handler))),
    }
}
