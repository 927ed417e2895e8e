//! Amazon DynamoDB adapter for `projectionkit`
//!
//! OCC records of every handler live in one table, configured through
//! [`Options`]. An item's binary partition key `ID` is the handler key
//! followed by `:` and the resource; its binary attribute `V` is the
//! version. A missing item means the resource has no version.
//!
//! Handlers return the writes an event causes as
//! [`TransactWriteItem`](aws_sdk_dynamodb::types::TransactWriteItem)s. The
//! adaptor prepends the conditional version update and sends everything in
//! a single `TransactWriteItems` request. A cancellation caused by that
//! condition is reported as a stale event (`Ok(false)`), not an error.
//!
//! ```no_run
//! # async fn demo(client: aws_sdk_dynamodb::Client) -> Result<(), Box<dyn std::error::Error>> {
//! use projectionkit_dynamodb::{create_table, Options, TableName};
//!
//! let options = Options::new(TableName::try_new("ProjectionOCC")?);
//! create_table(&client, options.table()).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adaptor;
mod occ;
mod options;
mod repository;
pub mod schema;

use aws_sdk_dynamodb::Client;
use projectionkit::{Binding, IdentityError, UnboundHandler};

pub use adaptor::{Adaptor, MessageHandler};
pub use options::{Options, TableName, TableNameError};
pub use repository::DynamoRepository;
pub use schema::{create_table, delete_table};

/// Bind `handler` to `client`, or leave it unbound when there is no client.
///
/// An unbound handler still reports its identity but fails every
/// state-touching operation with
/// [`ProjectionError::NotBound`](projectionkit::ProjectionError::NotBound).
pub fn bind<H>(
    client: Option<Client>,
    handler: H,
    options: &Options,
) -> Result<Binding<Adaptor<H>, H>, IdentityError>
where
    H: MessageHandler,
{
    match client {
        Some(client) => Adaptor::new(client, handler, options).map(Binding::Bound),
        None => Ok(Binding::Unbound(UnboundHandler::new(handler))),
    }
}
