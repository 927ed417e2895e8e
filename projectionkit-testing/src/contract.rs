//! The behaviour every [`ResourceRepository`] must satisfy.
//!
//! Each `test_*` function runs one scenario against a repository and
//! reports the first violated expectation as a [`ContractTestFailure`].
//! Backends normally run them through
//! [`resource_repository_contract_tests!`].

use std::fmt;
use std::sync::Arc;

use projectionkit::{RepositoryError, ResourceRepository, Version};
use uuid::Uuid;

/// A violated contract expectation, tagged with its scenario.
#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn repository_error(
        scenario: &'static str,
        operation: &'static str,
        error: &RepositoryError,
    ) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }

    fn assertion(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::new(scenario, detail)
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

/// Outcome of one contract scenario.
pub type ContractTestResult = Result<(), ContractTestFailure>;

/// A resource id unique to one scenario run.
///
/// Includes a UUID so scenarios can run in parallel against a shared
/// database without observing each other's records.
pub fn contract_resource(scenario: &'static str, label: &str) -> Vec<u8> {
    format!("contract::{scenario}::{label}::{}", Uuid::now_v7()).into_bytes()
}

async fn query<R>(
    scenario: &'static str,
    repository: &R,
    resource: &[u8],
) -> Result<Version, ContractTestFailure>
where
    R: ResourceRepository + ?Sized,
{
    repository
        .resource_version(resource)
        .await
        .map_err(|error| {
            ContractTestFailure::repository_error(scenario, "resource_version", &error)
        })
}

async fn update<R>(
    scenario: &'static str,
    repository: &R,
    resource: &[u8],
    current: &Version,
    next: &Version,
) -> Result<bool, ContractTestFailure>
where
    R: ResourceRepository + ?Sized,
{
    repository
        .update_resource_version(resource, current, next)
        .await
        .map_err(|error| {
            ContractTestFailure::repository_error(scenario, "update_resource_version", &error)
        })
}

async fn delete<R>(
    scenario: &'static str,
    repository: &R,
    resource: &[u8],
) -> Result<(), ContractTestFailure>
where
    R: ResourceRepository + ?Sized,
{
    repository
        .delete_resource(resource)
        .await
        .map_err(|error| {
            ContractTestFailure::repository_error(scenario, "delete_resource", &error)
        })
}

async fn store<R>(
    scenario: &'static str,
    repository: &R,
    resource: &[u8],
    version: &Version,
) -> Result<(), ContractTestFailure>
where
    R: ResourceRepository + ?Sized,
{
    repository
        .store_resource_version(resource, version)
        .await
        .map_err(|error| {
            ContractTestFailure::repository_error(scenario, "store_resource_version", &error)
        })
}

fn expect_applied(
    scenario: &'static str,
    step: &str,
    expected: bool,
    applied: bool,
) -> ContractTestResult {
    if applied == expected {
        return Ok(());
    }
    Err(ContractTestFailure::assertion(
        scenario,
        format!("{step}: expected applied={expected} but observed applied={applied}"),
    ))
}

fn expect_version(
    scenario: &'static str,
    step: &str,
    expected: &Version,
    observed: &Version,
) -> ContractTestResult {
    if observed == expected {
        return Ok(());
    }
    Err(ContractTestFailure::assertion(
        scenario,
        format!("{step}: expected version {expected:?} but observed {observed:?}"),
    ))
}

/// `update(absent, V1)` on an unseen resource applies and stores `V1`.
pub async fn test_first_write<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "first_write";

    let resource = contract_resource(SCENARIO, "R");
    let v1 = Version::from("V1");

    let applied = update(SCENARIO, repository, &resource, &Version::absent(), &v1).await?;
    expect_applied(SCENARIO, "update(absent, V1)", true, applied)?;

    let version = query(SCENARIO, repository, &resource).await?;
    expect_version(SCENARIO, "query after first write", &v1, &version)
}

/// `update(V1, V2)` applies when `V1` is stored.
pub async fn test_correct_advance<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "correct_advance";

    let resource = contract_resource(SCENARIO, "R");
    let (v1, v2) = (Version::from("V1"), Version::from("V2"));

    let _ = update(SCENARIO, repository, &resource, &Version::absent(), &v1).await?;
    let applied = update(SCENARIO, repository, &resource, &v1, &v2).await?;
    expect_applied(SCENARIO, "update(V1, V2)", true, applied)?;

    let version = query(SCENARIO, repository, &resource).await?;
    expect_version(SCENARIO, "query after advance", &v2, &version)
}

/// An update whose `current` is behind the stored version is rejected
/// and leaves the record untouched.
pub async fn test_stale_advance<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "stale_advance";

    let resource = contract_resource(SCENARIO, "R");
    let (v1, v2, v3) = (Version::from("V1"), Version::from("V2"), Version::from("V3"));

    let _ = update(SCENARIO, repository, &resource, &Version::absent(), &v1).await?;
    let _ = update(SCENARIO, repository, &resource, &v1, &v2).await?;

    let applied = update(SCENARIO, repository, &resource, &v1, &v3).await?;
    expect_applied(SCENARIO, "stale update(V1, V3)", false, applied)?;

    let version = query(SCENARIO, repository, &resource).await?;
    expect_version(SCENARIO, "query after stale update", &v2, &version)
}

/// Advancing to absent removes the record, after which the chain
/// restarts from absent.
pub async fn test_delete_via_update<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "delete_via_update";

    let resource = contract_resource(SCENARIO, "R");
    let absent = Version::absent();
    let (v1, v2) = (Version::from("V1"), Version::from("V2"));

    let _ = update(SCENARIO, repository, &resource, &absent, &v1).await?;
    let _ = update(SCENARIO, repository, &resource, &v1, &v2).await?;

    let applied = update(SCENARIO, repository, &resource, &v2, &absent).await?;
    expect_applied(SCENARIO, "update(V2, absent)", true, applied)?;

    let version = query(SCENARIO, repository, &resource).await?;
    expect_version(SCENARIO, "query after delete-via-update", &absent, &version)?;

    // The record is gone, so the chain restarts from absent.
    let applied = update(SCENARIO, repository, &resource, &absent, &v1).await?;
    expect_applied(SCENARIO, "update(absent, V1) after delete", true, applied)
}

/// `delete_resource` is idempotent and tolerates unseen resources.
pub async fn test_close_idempotence<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "close_idempotence";

    let resource = contract_resource(SCENARIO, "R");
    let absent = Version::absent();
    let _ = update(SCENARIO, repository, &resource, &absent, &Version::from("V1")).await?;

    delete(SCENARIO, repository, &resource).await?;
    delete(SCENARIO, repository, &resource).await?;

    let version = query(SCENARIO, repository, &resource).await?;
    expect_version(SCENARIO, "query after double delete", &absent, &version)?;

    let never_seen = contract_resource(SCENARIO, "never-seen");
    delete(SCENARIO, repository, &never_seen).await?;
    let version = query(SCENARIO, repository, &never_seen).await?;
    expect_version(SCENARIO, "query after deleting unseen resource", &absent, &version)
}

/// A removed record and a never-written record both read as absent and
/// both accept `update(absent, _)`.
pub async fn test_absent_equivalence<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "absent_equivalence";

    let absent = Version::absent();

    let via_store = contract_resource(SCENARIO, "store");
    store(SCENARIO, repository, &via_store, &Version::from("V1")).await?;
    store(SCENARIO, repository, &via_store, &absent).await?;
    let version = query(SCENARIO, repository, &via_store).await?;
    expect_version(SCENARIO, "query after store(absent)", &absent, &version)?;

    let applied = update(SCENARIO, repository, &via_store, &absent, &Version::from("V2")).await?;
    expect_applied(SCENARIO, "update(absent, V2) after store(absent)", true, applied)?;

    let unseen = contract_resource(SCENARIO, "unseen");
    let applied = update(SCENARIO, repository, &unseen, &absent, &absent).await?;
    expect_applied(SCENARIO, "update(absent, absent) on missing record", true, applied)?;
    let version = query(SCENARIO, repository, &unseen).await?;
    expect_version(SCENARIO, "query after update(absent, absent)", &absent, &version)
}

/// `store_resource_version` overwrites without a version check.
pub async fn test_unconditional_store<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "unconditional_store";

    let resource = contract_resource(SCENARIO, "R");
    let (v7, v8) = (Version::from("V7"), Version::from("V8"));

    store(SCENARIO, repository, &resource, &Version::from("V1")).await?;
    store(SCENARIO, repository, &resource, &v7).await?;

    let version = query(SCENARIO, repository, &resource).await?;
    expect_version(SCENARIO, "query after overwrite", &v7, &version)?;

    let applied = update(SCENARIO, repository, &resource, &v7, &v8).await?;
    expect_applied(SCENARIO, "update(V7, V8) after store", true, applied)
}

/// Present-vs-absent mismatches in either direction are rejected.
pub async fn test_mismatched_current_is_rejected<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "mismatched_current_is_rejected";

    let absent = Version::absent();
    let (v1, v2) = (Version::from("V1"), Version::from("V2"));

    let missing = contract_resource(SCENARIO, "missing");
    let applied = update(SCENARIO, repository, &missing, &v1, &v2).await?;
    expect_applied(SCENARIO, "update(V1, V2) on missing record", false, applied)?;
    let applied = update(SCENARIO, repository, &missing, &v1, &absent).await?;
    expect_applied(SCENARIO, "update(V1, absent) on missing record", false, applied)?;

    let existing = contract_resource(SCENARIO, "existing");
    let _ = update(SCENARIO, repository, &existing, &absent, &v1).await?;
    let applied = update(SCENARIO, repository, &existing, &absent, &v2).await?;
    expect_applied(SCENARIO, "update(absent, V2) on existing record", false, applied)?;
    let applied = update(SCENARIO, repository, &existing, &absent, &absent).await?;
    expect_applied(SCENARIO, "update(absent, absent) on existing record", false, applied)?;

    let version = query(SCENARIO, repository, &existing).await?;
    expect_version(SCENARIO, "query after rejected updates", &v1, &version)
}

/// Versions compare as raw bytes: no case folding, trimming or prefix
/// matching, and binary values round-trip.
pub async fn test_byte_level_equality<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "byte_level_equality";

    let resource = contract_resource(SCENARIO, "R");
    let stored = Version::from("version");
    let binary = Version::new(vec![0x00, 0xff, 0x7f, b'v']);

    let _ = update(SCENARIO, repository, &resource, &Version::absent(), &stored).await?;

    for (label, candidate) in [
        ("upper case", Version::from("VERSION")),
        ("trailing space", Version::from("version ")),
        ("prefix", Version::from("vers")),
    ] {
        let applied = update(SCENARIO, repository, &resource, &candidate, &binary).await?;
        expect_applied(SCENARIO, label, false, applied)?;
    }

    let applied = update(SCENARIO, repository, &resource, &stored, &binary).await?;
    expect_applied(SCENARIO, "exact match", true, applied)?;

    let version = query(SCENARIO, repository, &resource).await?;
    expect_version(SCENARIO, "binary round trip", &binary, &version)
}

/// Resource ids and versions of several hundred bytes are kept whole:
/// ids sharing a long prefix stay distinct and a long version reads back
/// unchanged.
pub async fn test_long_identifiers<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "long_identifiers";
    const PREFIX_LEN: usize = 300;

    let absent = Version::absent();
    let prefix = vec![b'A'; PREFIX_LEN];
    let mut first = contract_resource(SCENARIO, "shared");
    first.extend_from_slice(&prefix);
    let mut second = first.clone();
    first.push(b'1');
    second.push(b'2');

    let long_version = Version::new((0..=u8::MAX).cycle().take(1024).collect::<Vec<_>>());

    let applied = update(SCENARIO, repository, &first, &absent, &long_version).await?;
    expect_applied(SCENARIO, "update(absent, long) on first id", true, applied)?;

    let version = query(SCENARIO, repository, &second).await?;
    expect_version(SCENARIO, "second id is unseen", &absent, &version)?;

    let applied = update(SCENARIO, repository, &second, &absent, &Version::from("V1")).await?;
    expect_applied(SCENARIO, "update(absent, V1) on second id", true, applied)?;

    let version = query(SCENARIO, repository, &first).await?;
    expect_version(SCENARIO, "long version round trip", &long_version, &version)?;

    let applied = update(SCENARIO, repository, &first, &long_version, &absent).await?;
    expect_applied(SCENARIO, "update(long, absent) on first id", true, applied)
}

/// Records of different resources never affect each other.
pub async fn test_resource_isolation<R>(repository: &R) -> ContractTestResult
where
    R: ResourceRepository + ?Sized,
{
    const SCENARIO: &str = "resource_isolation";

    let left = contract_resource(SCENARIO, "left");
    let right = contract_resource(SCENARIO, "right");
    let r1 = Version::from("R1");

    let _ = update(SCENARIO, repository, &left, &Version::absent(), &Version::from("L1")).await?;
    let _ = update(SCENARIO, repository, &right, &Version::absent(), &r1).await?;
    delete(SCENARIO, repository, &left).await?;

    let version = query(SCENARIO, repository, &right).await?;
    expect_version(SCENARIO, "right survives deleting left", &r1, &version)
}

/// Of several concurrent updates from the same `current`, exactly one
/// applies.
pub async fn test_concurrent_updates_single_winner<R>(repository: Arc<R>) -> ContractTestResult
where
    R: ResourceRepository + ?Sized + 'static,
{
    const SCENARIO: &str = "concurrent_updates_single_winner";
    const CONTENDERS: usize = 8;

    let resource = contract_resource(SCENARIO, "R");
    let v1 = Version::from("V1");
    let _ = update(SCENARIO, repository.as_ref(), &resource, &Version::absent(), &v1).await?;

    let tasks: Vec<_> = (0..CONTENDERS)
        .map(|contender| {
            let repository = Arc::clone(&repository);
            let resource = resource.clone();
            let current = v1.clone();
            tokio::spawn(async move {
                let next = Version::from(format!("V2-{contender}").as_str());
                repository
                    .update_resource_version(&resource, &current, &next)
                    .await
            })
        })
        .collect();

    let mut winners = Vec::new();
    let outcomes = futures::future::join_all(tasks).await;
    for (contender, task) in outcomes.into_iter().enumerate() {
        let outcome = task.map_err(|error| {
            ContractTestFailure::assertion(SCENARIO, format!("contender task panicked: {error}"))
        })?;
        // Serialization failures under contention are a legitimate
        // backend outcome; they must simply not count as a win.
        if let Ok(true) = outcome {
            winners.push(contender);
        }
    }

    if winners.len() != 1 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected exactly one winner, observed {}", winners.len()),
        ));
    }

    let expected = Version::from(format!("V2-{}", winners[0]).as_str());
    let version = query(SCENARIO, repository.as_ref(), &resource).await?;
    expect_version(SCENARIO, "winner's version is stored", &expected, &version)
}

/// Runs the complete `ResourceRepository` contract against one backend.
///
/// `make_repository` is an expression evaluating to an async factory, e.g.
/// `|| async { MemoryRepository::new() }`. Each scenario gets a fresh
/// repository from the factory. Extra attributes (such as
/// `#[ignore = "requires docker"]`) are applied to every generated test.
#[macro_export]
macro_rules! resource_repository_contract_tests {
    (
        suite = $suite:ident,
        make_repository = $make_repository:expr
        $(, attributes = [$(#[$attr:meta])*])?
        $(,)?
    ) => {
        mod $suite {
            use $crate::contract::{
                test_absent_equivalence, test_byte_level_equality, test_close_idempotence,
                test_concurrent_updates_single_winner, test_correct_advance,
                test_delete_via_update, test_first_write, test_long_identifiers,
                test_mismatched_current_is_rejected, test_resource_isolation, test_stale_advance,
                test_unconditional_store,
            };

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn first_write_contract() {
                let repository = ($make_repository)().await;
                test_first_write(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn correct_advance_contract() {
                let repository = ($make_repository)().await;
                test_correct_advance(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn stale_advance_contract() {
                let repository = ($make_repository)().await;
                test_stale_advance(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn delete_via_update_contract() {
                let repository = ($make_repository)().await;
                test_delete_via_update(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn close_idempotence_contract() {
                let repository = ($make_repository)().await;
                test_close_idempotence(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn absent_equivalence_contract() {
                let repository = ($make_repository)().await;
                test_absent_equivalence(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn unconditional_store_contract() {
                let repository = ($make_repository)().await;
                test_unconditional_store(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn mismatched_current_is_rejected_contract() {
                let repository = ($make_repository)().await;
                test_mismatched_current_is_rejected(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn byte_level_equality_contract() {
                let repository = ($make_repository)().await;
                test_byte_level_equality(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn long_identifiers_contract() {
                let repository = ($make_repository)().await;
                test_long_identifiers(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn resource_isolation_contract() {
                let repository = ($make_repository)().await;
                test_resource_isolation(&repository)
                    .await
                    .expect("resource repository contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attr])*)?
            async fn concurrent_updates_single_winner_contract() {
                let repository = ::std::sync::Arc::new(($make_repository)().await);
                test_concurrent_updates_single_winner(repository)
                    .await
                    .expect("resource repository contract failed");
            }
        }
    };
}

pub use resource_repository_contract_tests;
