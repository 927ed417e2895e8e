use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

/// One-shot initializer that keeps retrying until it succeeds once.
///
/// Used to run idempotent bootstrap work, such as schema creation, exactly
/// once per process. Unlike a plain once-cell, a failed attempt leaves the
/// gate pending, so the next caller tries again.
///
/// Once the gate is done, [`call`](Self::call) returns after a single atomic
/// load. Until then, callers serialize on an async mutex so that at most one
/// attempt runs at a time and no attempt runs after a success.
///
/// # Examples
///
/// ```
/// # tokio_test::block_on(async {
/// use projectionkit::SucceedOnce;
///
/// let gate = SucceedOnce::new();
///
/// let first: Result<(), &str> = gate.call(|| async { Err("not yet") }).await;
/// assert!(first.is_err());
/// assert!(!gate.is_done());
///
/// gate.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
/// assert!(gate.is_done());
/// # });
/// ```
#[derive(Debug, Default)]
pub struct SucceedOnce {
    done: AtomicBool,
    attempt: Mutex<()>,
}

impl SucceedOnce {
    /// A pending gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an attempt has succeeded.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Run `f` unless a previous call already succeeded.
    ///
    /// Returns `Ok(())` without running `f` once the gate is done. If `f`
    /// fails, its error is returned and the gate stays pending.
    pub async fn call<F, Fut, E>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        if self.is_done() {
            return Ok(());
        }

        let _attempt = self.attempt.lock().await;

        if self.done.load(Ordering::Relaxed) {
            return Ok(());
        }

        f().await?;
        self.done.store(true, Ordering::Release);
        Ok(())
    }
}
