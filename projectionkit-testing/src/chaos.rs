//! Fault injection for [`ResourceRepository`] implementations.
//!
//! [`ChaosRepository`] sits in front of a real repository and, at the
//! configured rates, fails an operation with [`InjectedFailure`] or answers
//! an update with a spurious mismatch. Both are outcomes a delivery engine
//! must already handle (a retryable error, or a stale event), so code built
//! on the repository can be exercised against them without a flaky
//! backend.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use nutype::nutype;
use parking_lot::Mutex;
use projectionkit::{Operation, RepositoryError, ResourceRepository, Version};
use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

/// Rate at which a fault is injected, clamped into `[0.0, 1.0]`. NaN
/// reads as `0.0`.
///
/// # Examples
///
/// ```
/// use projectionkit_testing::chaos::Probability;
///
/// assert!((Probability::new(0.5).into_inner() - 0.5).abs() < f64::EPSILON);
/// assert!((Probability::new(1.5).into_inner() - 1.0).abs() < f64::EPSILON);
/// assert!(Probability::new(-0.1).into_inner().abs() < f64::EPSILON);
/// assert!(Probability::new(f64::NAN).into_inner().abs() < f64::EPSILON);
/// ```
#[nutype(
    sanitize(with = |rate: f64| if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) }),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Into)
)]
pub struct Probability(f64);

/// The backend failure injected by [`ChaosRepository`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("chaos: injected {0} failure")]
pub struct InjectedFailure(pub Operation);

/// Injection rates and the random seed of a [`ChaosRepository`].
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    seed: Option<u64>,
    failure_rate: Probability,
    conflict_rate: Probability,
}

impl ChaosConfig {
    /// Inject nothing until rates are set; draws come from `seed`, so two
    /// repositories with equal configs inject on the same calls.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Fail this share of operations before they reach the wrapped
    /// repository. Out-of-range rates are clamped.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = Probability::new(rate);
        self
    }

    /// Report this share of updates as OCC mismatches, as if another writer
    /// had advanced the resource first. Out-of-range rates are clamped.
    pub fn with_conflict_rate(mut self, rate: f64) -> Self {
        self.conflict_rate = Probability::new(rate);
        self
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            seed: None,
            failure_rate: Probability::new(0.0),
            conflict_rate: Probability::new(0.0),
        }
    }
}

/// Counts of the faults a [`ChaosRepository`] has injected so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Injected {
    /// Operations failed with [`InjectedFailure`].
    pub failures: u64,
    /// Updates answered with a spurious mismatch.
    pub conflicts: u64,
}

/// A repository wrapper that injects faults at configured rates.
pub struct ChaosRepository<R> {
    repository: R,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
    failures: AtomicU64,
    conflicts: AtomicU64,
}

impl<R> ChaosRepository<R> {
    /// Wrap `repository`.
    pub fn new(repository: R, config: ChaosConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        Self {
            repository,
            config,
            rng: Mutex::new(rng),
            failures: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }

    /// The wrapped repository, for inspecting state without faults.
    pub const fn inner(&self) -> &R {
        &self.repository
    }

    /// Faults injected so far.
    pub fn injected(&self) -> Injected {
        Injected {
            failures: self.failures.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }

    fn draw(&self, rate: Probability) -> bool {
        let rate: f64 = rate.into();
        if rate <= 0.0 {
            return false;
        }
        rate >= 1.0 || self.rng.lock().random_bool(rate)
    }

    fn maybe_fail(&self, operation: Operation) -> Result<(), RepositoryError> {
        if !self.draw(self.config.failure_rate) {
            return Ok(());
        }
        let _ = self.failures.fetch_add(1, Ordering::Relaxed);
        debug!(operation = %operation, "[chaos.failure] injected backend failure");
        Err(RepositoryError::new(operation, InjectedFailure(operation)))
    }
}

#[async_trait]
impl<R> ResourceRepository for ChaosRepository<R>
where
    R: ResourceRepository,
{
    async fn resource_version(&self, resource: &[u8]) -> Result<Version, RepositoryError> {
        self.maybe_fail(Operation::ResourceVersion)?;
        self.repository.resource_version(resource).await
    }

    async fn store_resource_version(
        &self,
        resource: &[u8],
        version: &Version,
    ) -> Result<(), RepositoryError> {
        self.maybe_fail(Operation::StoreResourceVersion)?;
        self.repository.store_resource_version(resource, version).await
    }

    async fn update_resource_version(
        &self,
        resource: &[u8],
        current: &Version,
        next: &Version,
    ) -> Result<bool, RepositoryError> {
        self.maybe_fail(Operation::UpdateResourceVersion)?;
        if self.draw(self.config.conflict_rate) {
            let _ = self.conflicts.fetch_add(1, Ordering::Relaxed);
            debug!(current = %current, "[chaos.conflict] injected version mismatch");
            return Ok(false);
        }
        self.repository
            .update_resource_version(resource, current, next)
            .await
    }

    async fn delete_resource(&self, resource: &[u8]) -> Result<(), RepositoryError> {
        self.maybe_fail(Operation::DeleteResource)?;
        self.repository.delete_resource(resource).await
    }
}

/// `repository.with_chaos(config)` for any repository.
pub trait ChaosRepositoryExt: Sized {
    /// Wrap `self` in a [`ChaosRepository`].
    fn with_chaos(self, config: ChaosConfig) -> ChaosRepository<Self>;
}

impl<R> ChaosRepositoryExt for R
where
    R: ResourceRepository,
{
    fn with_chaos(self, config: ChaosConfig) -> ChaosRepository<Self> {
        ChaosRepository::new(self, config)
    }
}
