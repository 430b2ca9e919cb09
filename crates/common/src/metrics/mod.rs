//! Metrics and observability utilities
//!
//! Two layers:
//! - Process-wide metrics through the `metrics` facade (no-op until a recorder is installed)
//! - [`CallProfile`], a per-operation accumulator of catalog call time and error counts

use crate::errors::ErrorCode;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Metrics prefix for all CiteForge metrics
pub const METRICS_PREFIX: &str = "citeforge";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_catalog_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total catalog API calls, by outcome"
    );

    describe_histogram!(
        format!("{}_catalog_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Catalog API latency of successful calls, retries included"
    );

    describe_counter!(
        format!("{}_catalog_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Failed catalog attempts, by error kind"
    );

    describe_counter!(
        format!("{}_works_yielded_total", METRICS_PREFIX),
        Unit::Count,
        "Work records handed to callers, by source"
    );

    describe_counter!(
        format!("{}_works_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Work records dropped during a crawl, by source"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a finished catalog call
pub fn record_catalog_call(duration_secs: f64, success: bool) {
    let outcome = if success { "success" } else { "absent" };

    counter!(
        format!("{}_catalog_requests_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    if success {
        histogram!(format!("{}_catalog_request_duration_seconds", METRICS_PREFIX))
            .record(duration_secs);
    }
}

/// Helper to record one failed attempt
pub fn record_catalog_error(kind: ErrorCode) {
    counter!(
        format!("{}_catalog_errors_total", METRICS_PREFIX),
        "kind" => kind.label()
    )
    .increment(1);
}

/// Helper to record a record leaving a crawl
pub fn record_work(source: &'static str, yielded: bool) {
    let name = if yielded {
        format!("{}_works_yielded_total", METRICS_PREFIX)
    } else {
        format!("{}_works_skipped_total", METRICS_PREFIX)
    };
    counter!(name, "source" => source).increment(1);
}

#[derive(Debug, Default)]
struct ProfileState {
    total_time: Duration,
    call_count: u64,
    errors: BTreeMap<ErrorCode, u64>,
}

/// Per-operation call profile
///
/// Cloning yields another handle to the same counters. A crawl creates a fresh
/// profile and hands a clone to its request executor, which is the only writer.
#[derive(Debug, Clone, Default)]
pub struct CallProfile {
    state: Arc<Mutex<ProfileState>>,
}

/// Snapshot of a [`CallProfile`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSummary {
    pub total_time_secs: f64,
    pub api_calls: u64,
    pub average_time_secs: f64,
    pub errors: BTreeMap<String, u64>,
}

impl CallProfile {
    /// Create an empty profile
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProfileState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a successful call and its elapsed time
    pub fn track_call(&self, elapsed: Duration) {
        let mut state = self.lock();
        state.total_time += elapsed;
        state.call_count += 1;
    }

    /// Record one failed attempt of the given kind
    pub fn track_error(&self, kind: ErrorCode) {
        *self.lock().errors.entry(kind).or_insert(0) += 1;
    }

    /// Number of successful calls
    pub fn call_count(&self) -> u64 {
        self.lock().call_count
    }

    /// Count of failed attempts of one kind
    pub fn error_count(&self, kind: ErrorCode) -> u64 {
        self.lock().errors.get(&kind).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> ProfileSummary {
        let state = self.lock();
        let total = state.total_time.as_secs_f64();
        let average = if state.call_count > 0 {
            total / state.call_count as f64
        } else {
            0.0
        };

        ProfileSummary {
            total_time_secs: total,
            api_calls: state.call_count,
            average_time_secs: average,
            errors: state
                .errors
                .iter()
                .map(|(kind, count)| (kind.label().to_string(), *count))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_summary() {
        let profile = CallProfile::new();
        profile.track_call(Duration::from_millis(200));
        profile.track_call(Duration::from_millis(400));
        profile.track_error(ErrorCode::RateLimited);
        profile.track_error(ErrorCode::RateLimited);
        profile.track_error(ErrorCode::ServerError);

        let summary = profile.summary();
        assert_eq!(summary.api_calls, 2);
        assert!((summary.total_time_secs - 0.6).abs() < 1e-9);
        assert!((summary.average_time_secs - 0.3).abs() < 1e-9);
        assert_eq!(summary.errors.get("rate_limited"), Some(&2));
        assert_eq!(summary.errors.get("server_error"), Some(&1));
    }

    #[test]
    fn test_empty_profile_average() {
        let summary = CallProfile::new().summary();
        assert_eq!(summary.api_calls, 0);
        assert_eq!(summary.average_time_secs, 0.0);
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_clones_share_counters() {
        let profile = CallProfile::new();
        let handle = profile.clone();
        handle.track_error(ErrorCode::ClientError);
        handle.track_call(Duration::from_millis(10));
        assert_eq!(profile.error_count(ErrorCode::ClientError), 1);
        assert_eq!(profile.call_count(), 1);
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: the facade must be a no-op
        record_catalog_call(0.1, true);
        record_catalog_error(ErrorCode::TransientTransportError);
        record_work("bfs", false);
    }
}
