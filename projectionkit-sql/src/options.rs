use std::fmt;
use std::sync::Arc;

use projectionkit::{Candidate, CandidateSet};

use crate::driver::{default_candidates, Driver};

/// Configuration for binding a handler to a relational database.
///
/// # Examples
///
/// ```
/// use projectionkit_sql::{driver, Options};
///
/// // Skip probing and create the OCC table the first time it is needed.
/// let options = Options::default()
///     .with_driver(driver::sqlite())
///     .create_schema_on_first_use(true);
/// # let _ = options;
/// ```
#[derive(Clone)]
pub struct Options {
    driver: Option<Arc<dyn Driver>>,
    candidates: Vec<Arc<dyn Driver>>,
    create_schema: bool,
}

impl Options {
    /// Use `driver` without probing the database.
    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Probe `candidates`, in order, to find the driver for the database.
    ///
    /// Ignored when an explicit driver is set.
    pub fn with_candidate_drivers(mut self, candidates: Vec<Arc<dyn Driver>>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Create the OCC table, once per repository, before the first
    /// operation that touches it.
    pub const fn create_schema_on_first_use(mut self, enabled: bool) -> Self {
        self.create_schema = enabled;
        self
    }

    pub(crate) const fn creates_schema_on_first_use(&self) -> bool {
        self.create_schema
    }

    pub(crate) fn driver_set(&self) -> CandidateSet<dyn Driver> {
        match &self.driver {
            Some(driver) => CandidateSet::preselected(Arc::clone(driver)),
            None => CandidateSet::new(self.candidates.clone()),
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            driver: None,
            candidates: default_candidates(),
            create_schema: false,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let candidates: Vec<_> = self.candidates.iter().map(|d| d.name()).collect();
        f.debug_struct("Options")
            .field("driver", &self.driver.as_ref().map(|d| d.name()))
            .field("candidates", &candidates)
            .field("create_schema_on_first_use", &self.create_schema)
            .finish()
    }
}
