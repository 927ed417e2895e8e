//! Runtime selection of a driver by capability probing.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::errors::BoxError;

/// A driver that can check whether it understands a given database.
#[async_trait]
pub trait Candidate<Db>: Send + Sync
where
    Db: ?Sized + Sync,
{
    /// Short name used in diagnostics, e.g. `"postgres"`.
    fn name(&self) -> &str;

    /// Cheap, harmless probe that succeeds only if `db` is of the dialect
    /// this driver expects.
    async fn is_compatible_with(&self, db: &Db) -> Result<(), BoxError>;
}

/// No candidate accepted the database.
#[derive(Debug)]
pub struct ResolveError {
    backend: String,
    rejections: Vec<(String, String)>,
}

impl ResolveError {
    /// Description of the database that was probed.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Each candidate's name together with the reason it was rejected.
    pub fn rejections(&self) -> &[(String, String)] {
        &self.rejections
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no compatible driver for {} database", self.backend)?;
        if self.rejections.is_empty() {
            return write!(f, " (no candidates)");
        }
        for (index, (name, reason)) in self.rejections.iter().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(f, "{separator}{name} rejected it: {reason}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolveError {}

/// An ordered set of candidate drivers with a memoized winner.
///
/// The first call to [`resolve`](Self::resolve) probes the candidates in
/// order and remembers the first that accepts the database. Concurrent first
/// callers wait on that single probe sequence rather than starting their
/// own. If every candidate rejects the database nothing is remembered and
/// the next call probes again.
pub struct CandidateSet<D: ?Sized> {
    candidates: Vec<Arc<D>>,
    selected: OnceCell<Arc<D>>,
}

impl<D: ?Sized> CandidateSet<D> {
    /// A set that probes `candidates` in the given order.
    pub fn new(candidates: Vec<Arc<D>>) -> Self {
        Self {
            candidates,
            selected: OnceCell::new(),
        }
    }

    /// A set whose winner is already decided; nothing is probed.
    pub fn preselected(driver: Arc<D>) -> Self {
        Self {
            candidates: vec![Arc::clone(&driver)],
            selected: OnceCell::new_with(Some(driver)),
        }
    }

    /// The memoized winner, if resolution has already happened.
    pub fn selected(&self) -> Option<&Arc<D>> {
        self.selected.get()
    }

    /// The driver to use for `db`.
    ///
    /// `describe` names the backend in the diagnostic returned when no
    /// candidate is compatible; it is only invoked on that path.
    #[instrument(name = "resolver.resolve", skip_all)]
    pub async fn resolve<Db, F>(&self, db: &Db, describe: F) -> Result<&Arc<D>, ResolveError>
    where
        D: Candidate<Db>,
        Db: ?Sized + Sync,
        F: FnOnce(&Db) -> String,
    {
        self.selected
            .get_or_try_init(|| async {
                let mut rejections = Vec::with_capacity(self.candidates.len());

                for candidate in &self.candidates {
                    match candidate.is_compatible_with(db).await {
                        Ok(()) => {
                            info!(
                                driver = candidate.name(),
                                "[resolver.selected] driver accepted database"
                            );
                            return Ok(Arc::clone(candidate));
                        }
                        Err(reason) => {
                            debug!(
                                driver = candidate.name(),
                                reason = %reason,
                                "[resolver.rejected] driver rejected database"
                            );
                            rejections.push((candidate.name().to_owned(), reason.to_string()));
                        }
                    }
                }

                let error = ResolveError {
                    backend: describe(db),
                    rejections,
                };
                warn!(error = %error, "[resolver.no_match] no compatible driver");
                Err(error)
            })
            .await
    }
}

impl<D: ?Sized> fmt::Debug for CandidateSet<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateSet")
            .field("candidates", &self.candidates.len())
            .field("resolved", &self.selected.initialized())
            .finish()
    }
}
