#![forbid(
    invalid_value,
    overflowing_literals,
    unconditional_recursion,
    unused_allocation,
    unsafe_code
)]
#![deny(
    bad_style,
    deprecated,
    meta_variable_misuse,
    non_ascii_idents,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_code,
    unused_extern_crates,
    unused_imports,
    unused_must_use,
    unused_mut,
    unused_results,
    unused_variables
)]

//! Test support for `projectionkit` adapters.
//!
//! - [`contract`]: the behaviour every `ResourceRepository`
//!   must satisfy, packaged as async functions plus the
//!   [`resource_repository_contract_tests!`] macro that expands them into a
//!   `#[tokio::test]` suite for one backend.
//! - [`chaos`]: a repository wrapper that injects backend failures and
//!   spurious OCC mismatches.
//! - [`scope`]: recording doubles of the delivery engine's event and
//!   compaction scopes.

pub mod chaos;
pub mod contract;
pub mod scope;

pub use chaos::{ChaosConfig, ChaosRepository, ChaosRepositoryExt, Injected};
pub use scope::{RecordingCompactScope, RecordingEventScope};
