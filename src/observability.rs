use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for lifecycle activity
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    pub submitted: AtomicU64,
    pub withdrawn: AtomicU64,
    pub rejected: AtomicU64,
    pub lost_races: AtomicU64,
    pub validations: AtomicU64,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_withdrawn(&self) {
        self.withdrawn.fetch_add(1, Ordering::Relaxed);
    }

    /// Transition refused by the status guard or by open validation issues
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Transition refused because the stored status changed concurrently
    pub fn record_lost_race(&self) {
        self.lost_races.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation(&self) {
        self.validations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> LifecycleStats {
        LifecycleStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            withdrawn: self.withdrawn.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            lost_races: self.lost_races.load(Ordering::Relaxed),
            validations: self.validations.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Lifecycle metrics: submitted={}, withdrawn={}, rejected={}, lost_races={}, validations={}",
            stats.submitted,
            stats.withdrawn,
            stats.rejected,
            stats.lost_races,
            stats.validations
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleStats {
    pub submitted: u64,
    pub withdrawn: u64,
    pub rejected: u64,
    pub lost_races: u64,
    pub validations: u64,
}

static LIFECYCLE_METRICS: std::sync::LazyLock<LifecycleMetrics> =
    std::sync::LazyLock::new(LifecycleMetrics::new);

pub fn lifecycle_metrics() -> &'static LifecycleMetrics {
    &LIFECYCLE_METRICS
}

/// Span shared by everything a lifecycle operation logs
pub fn create_lifecycle_span(
    operation: &str,
    submission_id: i64,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "submission_lifecycle",
        operation = operation,
        submission.id = submission_id,
        correlation.id = correlation_id,
    )
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = LifecycleMetrics::new();
        metrics.record_submitted();
        metrics.record_rejected();
        metrics.record_rejected();

        let stats = metrics.get_stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.withdrawn, 0);
    }
}
