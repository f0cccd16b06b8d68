//! Saga metrics recorded through an explicitly supplied recorder.

use std::sync::Arc;
use std::time::Duration;

use metrics::{NoopRecorder, Recorder, Unit};

use crate::result::SagaStatus;

/// Histogram buckets (seconds) for `saga_duration_seconds`.
pub const DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Counters and the duration histogram for saga execution.
///
/// Every update goes to the recorder handed to [`SagaMetrics::new`], never to
/// the process-wide one, so independent instances do not share counts.
#[derive(Clone)]
pub struct SagaMetrics {
    recorder: Arc<dyn Recorder + Send + Sync>,
}

impl SagaMetrics {
    /// Creates metrics backed by `recorder` and registers metric descriptions.
    pub fn new<R>(recorder: R) -> Self
    where
        R: Recorder + Send + Sync + 'static,
    {
        let metrics = Self {
            recorder: Arc::new(recorder),
        };
        metrics.describe();
        metrics
    }

    /// Creates metrics that discard every update.
    pub fn disabled() -> Self {
        Self::new(NoopRecorder)
    }

    fn describe(&self) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::describe_counter!(
                "saga_events_published_total",
                "Total events published by event name"
            );
            metrics::describe_counter!("saga_started_total", "Total started sagas");
            metrics::describe_counter!("saga_completed_total", "Total completed sagas");
            metrics::describe_counter!(
                "saga_failed_total",
                "Total failed sagas without full compensation"
            );
            metrics::describe_counter!(
                "saga_failed_compensated_total",
                "Total failed but compensated sagas"
            );
            metrics::describe_histogram!(
                "saga_duration_seconds",
                Unit::Seconds,
                "Saga execution duration histogram"
            );
        });
    }

    /// Counts one published event.
    pub fn event_published(&self, event_name: &str) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::counter!("saga_events_published_total", "event" => event_name.to_owned())
                .increment(1);
        });
    }

    /// Counts one started saga.
    pub fn saga_started(&self) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::counter!("saga_started_total").increment(1);
        });
    }

    /// Records the settled status of a saga and its wall-clock duration.
    ///
    /// Non-settled statuses (`Started`, `InProgress`) are ignored.
    pub fn saga_finished(&self, status: SagaStatus, elapsed: Duration) {
        let counter = match status {
            SagaStatus::Completed => "saga_completed_total",
            SagaStatus::Failed => "saga_failed_total",
            SagaStatus::FailedCompensated => "saga_failed_compensated_total",
            SagaStatus::Started | SagaStatus::InProgress => return,
        };

        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::counter!(counter).increment(1);
            metrics::histogram!("saga_duration_seconds").record(elapsed.as_secs_f64());
        });
    }
}

impl Default for SagaMetrics {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for SagaMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaMetrics").finish_non_exhaustive()
    }
}
