//! Recording doubles of the delivery engine's scopes.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use projectionkit::{ProjectionCompactScope, ProjectionEventScope};
use tracing::info;

/// Event scope double that records every logged message.
#[derive(Debug)]
pub struct RecordingEventScope {
    recorded_at: DateTime<Utc>,
    primary_delivery: bool,
    messages: Mutex<Vec<String>>,
}

impl RecordingEventScope {
    /// A primary-delivery scope for an event recorded now.
    pub fn new() -> Self {
        Self {
            recorded_at: Utc::now(),
            primary_delivery: true,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Pin the event's recording time, for handlers that derive state
    /// from it.
    pub fn recorded_at_time(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = recorded_at;
        self
    }

    /// Mark the delivery as a redelivery or replay.
    pub fn redelivery(mut self) -> Self {
        self.primary_delivery = false;
        self
    }

    /// Messages logged through the scope, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Default for RecordingEventScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionEventScope for RecordingEventScope {
    fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    fn is_primary_delivery(&self) -> bool {
        self.primary_delivery
    }

    fn log(&self, message: &str) {
        info!(log = message, "[scope.event_log] projection handler log");
        self.messages.lock().push(message.to_owned());
    }
}

/// Compact scope double with a fixed clock.
#[derive(Debug)]
pub struct RecordingCompactScope {
    now: DateTime<Utc>,
    messages: Mutex<Vec<String>>,
}

impl RecordingCompactScope {
    /// A scope whose clock reads the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// A scope whose clock always reads `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Messages logged through the scope, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Default for RecordingCompactScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionCompactScope for RecordingCompactScope {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn log(&self, message: &str) {
        info!(log = message, "[scope.compact_log] projection compaction log");
        self.messages.lock().push(message.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn event_scope_reports_the_pinned_recording_time() {
        let recorded_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid time");
        let scope = RecordingEventScope::new()
            .recorded_at_time(recorded_at)
            .redelivery();

        assert_eq!(scope.recorded_at(), recorded_at);
        assert!(!scope.is_primary_delivery());
    }

    #[test]
    fn compact_scope_clock_is_fixed_and_logs_are_kept_in_order() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid time");
        let scope = RecordingCompactScope::at(now);

        scope.log("first");
        scope.log("second");

        assert_eq!(scope.now(), now);
        assert_eq!(scope.messages(), vec!["first".to_owned(), "second".to_owned()]);
    }
}
