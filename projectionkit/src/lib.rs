#![forbid(
    invalid_value,
    overflowing_literals,
    unconditional_recursion,
    unreachable_pub,
    unused_allocation,
    unsafe_code
)]
#![deny(
    bad_style,
    deprecated,
    meta_variable_misuse,
    non_ascii_idents,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_code,
    unused_assignments,
    unused_attributes,
    unused_extern_crates,
    unused_imports,
    unused_must_use,
    unused_mut,
    unused_parens,
    unused_qualifications,
    unused_results,
    unused_variables
)]

//! Exactly-once projection handlers on top of at-least-once event delivery.
//!
//! `projectionkit` turns application-authored projection handlers into
//! durable consumers of an event stream. Every mutation a handler makes to
//! its derived state is coupled, inside one backend transaction, with an
//! optimistic-concurrency-controlled (OCC) update of a per-resource
//! *version*. Events that the delivery engine redelivers are recognised by
//! their stale version and never applied twice.
//!
//! This crate holds the backend-agnostic vocabulary shared by the storage
//! adapters (`projectionkit-sql`, `projectionkit-redb`,
//! `projectionkit-dynamodb`, `projectionkit-memory`):
//!
//! - Values: [`Version`], [`HandlerKey`]
//! - Contracts: [`ResourceRepository`], [`ProjectionMessageHandler`],
//!   [`ProjectionConfigurer`], [`ProjectionEventScope`],
//!   [`ProjectionCompactScope`]
//! - Building blocks: [`identity::key`], [`UnboundHandler`], [`Binding`],
//!   [`SucceedOnce`], [`CandidateSet`]
//! - Errors: [`ProjectionError`], [`RepositoryError`], [`IdentityError`],
//!   [`ResolveError`]

mod binding;
mod errors;
mod handler;
pub mod identity;
mod key;
mod repository;
pub mod resource;
mod resolver;
mod succeed_once;
mod unbound;
mod version;

pub use binding::Binding;
pub use errors::{BoxError, IdentityError, Operation, ProjectionError, RepositoryError};
pub use handler::{
    Configurable, ProjectionCompactScope, ProjectionConfigurer, ProjectionEventScope,
    ProjectionMessageHandler,
};
pub use key::HandlerKey;
pub use repository::ResourceRepository;
pub use resolver::{Candidate, CandidateSet, ResolveError};
pub use succeed_once::SucceedOnce;
pub use unbound::UnboundHandler;
pub use version::Version;
