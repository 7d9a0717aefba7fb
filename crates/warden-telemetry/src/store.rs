//! The persistent telemetry store: durable record storage, indexed
//! queries, percentile aggregation, and regression detection.
//!
//! Record volume for one agent process is modest, so queries scan the
//! record set rather than issuing relational queries — the same choice the
//! donor runtime's audit log storage makes over its `KvStore` tier.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use warden_storage::{KvStore, MemoryKvStore};

use crate::error::TelemetryResult;
use crate::record::{CallRole, CallStatus, CallTelemetry};

const NS_RECORDS: &str = "telemetry:records";

/// Run an async future synchronously.
///
/// The backing `KvStore` is in-process (no network round trip), so
/// bridging the sync store API to the async `KvStore` trait is safe here.
fn block_on<F>(f: F) -> F::Output
where
    F: std::future::Future + Send,
    F::Output: Send,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => std::thread::scope(|s| s.spawn(|| handle.block_on(f)).join().expect("task panicked")),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to create tokio runtime")
            .block_on(f),
    }
}

/// Filter parameters for [`TelemetryStore::query_telemetry`].
#[derive(Debug, Clone, Default)]
pub struct TelemetryFilter {
    /// Restrict to one trace id.
    pub trace_id: Option<String>,
    /// Restrict to one model id.
    pub model_id: Option<String>,
    /// Restrict to one provider.
    pub provider: Option<String>,
    /// Restrict to one role.
    pub role: Option<CallRole>,
    /// Restrict to one status.
    pub status: Option<CallStatus>,
    /// Earliest `started_at` (inclusive).
    pub start_time: Option<DateTime<Utc>>,
    /// Latest `started_at` (inclusive).
    pub end_time: Option<DateTime<Utc>>,
    /// Cap the number of returned records (most recent first).
    pub limit: Option<usize>,
}

impl TelemetryFilter {
    fn matches(&self, record: &CallTelemetry) -> bool {
        if let Some(trace_id) = &self.trace_id {
            if &record.trace_id != trace_id {
                return false;
            }
        }
        if let Some(model_id) = &self.model_id {
            if &record.model_id != model_id {
                return false;
            }
        }
        if let Some(provider) = &self.provider {
            if &record.provider != provider {
                return false;
            }
        }
        if let Some(role) = self.role {
            if record.role != role {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if record.started_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if record.started_at > end {
                return false;
            }
        }
        true
    }
}

/// One aggregated row in a routing scoreboard.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingScoreboardEntry {
    /// The model id this row aggregates.
    pub model_id: String,
    /// The role this row aggregates.
    pub role: CallRole,
    /// Number of calls observed in the window.
    pub count: usize,
    /// Fraction of calls with a non-success status, in `[0, 1]`.
    pub failure_rate: f64,
    /// 50th percentile latency in milliseconds.
    pub p50_latency_ms: u64,
    /// 95th percentile latency in milliseconds.
    pub p95_latency_ms: u64,
    /// 99th percentile latency in milliseconds.
    pub p99_latency_ms: u64,
    /// Average prompt tokens across the window.
    pub avg_prompt_tokens: f64,
    /// Average completion tokens across the window.
    pub avg_completion_tokens: f64,
}

/// Severity of a detected regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressionSeverity {
    /// The change exceeds the configured threshold.
    Warning,
    /// The change exceeds more than twice the configured threshold.
    Critical,
}

/// Which metric regressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressionMetric {
    /// p95 latency regressed.
    LatencyP95,
    /// Failure rate regressed.
    FailureRate,
}

/// A detected regression between a baseline and current window.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionAlert {
    /// The model id this alert concerns.
    pub model_id: String,
    /// The role this alert concerns.
    pub role: CallRole,
    /// Which metric regressed.
    pub metric: RegressionMetric,
    /// The baseline value.
    pub baseline_value: f64,
    /// The current value.
    pub current_value: f64,
    /// `current_value - baseline_value`.
    pub change: f64,
    /// Alert severity.
    pub severity: RegressionSeverity,
}

/// Regression detection thresholds.
#[derive(Debug, Clone, Copy)]
pub struct RegressionThresholds {
    /// Minimum p95 latency increase (milliseconds) to flag a regression.
    pub latency_p95_ms: f64,
    /// Minimum failure-rate increase (percentage points, 0-100) to flag a
    /// regression.
    pub failure_rate_points: f64,
}

const MIN_BASELINE_SAMPLES: usize = 10;

/// Compute the percentile of a pre-sorted ascending slice.
///
/// `index = ceil(p/100 * n) - 1`, clamped to `[0, n-1]`.
fn percentile(sorted_ascending: &[u64], p: f64) -> u64 {
    if sorted_ascending.is_empty() {
        return 0;
    }
    let n = sorted_ascending.len();
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::arithmetic_side_effects
    )]
    let raw_index = (p / 100.0 * n as f64).ceil() as i64 - 1;
    #[allow(clippy::cast_possible_truncation, clippy::arithmetic_side_effects)]
    let index = raw_index.clamp(0, n as i64 - 1) as usize;
    sorted_ascending[index]
}

/// Durable storage for [`CallTelemetry`] records.
pub struct TelemetryStore {
    kv: Arc<dyn KvStore>,
    next_id: AtomicU64,
}

impl TelemetryStore {
    /// Open (or create) a telemetry store backed by an embedded
    /// `SurrealKV` instance at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the on-disk store cannot be opened.
    #[cfg(feature = "kv")]
    pub fn open(path: impl AsRef<Path>) -> TelemetryResult<Self> {
        let kv = warden_storage::SurrealKvStore::open(path)?;
        Ok(Self::with_backend(Arc::new(kv)))
    }

    /// Create an in-memory store, for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryKvStore::new()))
    }

    /// Wrap an arbitrary [`KvStore`] backend.
    #[must_use]
    pub fn with_backend(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            next_id: AtomicU64::new(1),
        }
    }

    fn scan_all(&self) -> TelemetryResult<Vec<CallTelemetry>> {
        let entries = block_on(self.kv.list(NS_RECORDS))?;
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            records.push(serde_json::from_slice(&entry.value)?);
        }
        records.sort_by_key(|r: &CallTelemetry| r.id);
        Ok(records)
    }

    /// Persist a telemetry record, assigning it a monotonic id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to write.
    pub fn store_telemetry(&self, mut record: CallTelemetry) -> TelemetryResult<CallTelemetry> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.id = id;
        let bytes = serde_json::to_vec(&record)?;
        block_on(self.kv.set(NS_RECORDS, &id.to_string(), bytes))?;
        Ok(record)
    }

    /// Query stored records by filter. Results are ordered oldest-first
    /// unless `limit` is set, in which case the most recent `limit`
    /// matches are returned, oldest-first within that window.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    pub fn query_telemetry(&self, filter: &TelemetryFilter) -> TelemetryResult<Vec<CallTelemetry>> {
        let mut matches: Vec<CallTelemetry> =
            self.scan_all()?.into_iter().filter(|r| filter.matches(r)).collect();

        if let Some(limit) = filter.limit {
            if matches.len() > limit {
                let drop = matches.len().saturating_sub(limit);
                matches.drain(0..drop);
            }
        }

        Ok(matches)
    }

    /// Count stored records matching a status, convenience accessor beyond
    /// `query_telemetry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    pub fn count_by_status(&self, status: CallStatus) -> TelemetryResult<usize> {
        Ok(self.scan_all()?.into_iter().filter(|r| r.status == status).count())
    }

    /// Return the `n` most recent records, oldest-first, convenience
    /// accessor beyond `query_telemetry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    pub fn latest(&self, n: usize) -> TelemetryResult<Vec<CallTelemetry>> {
        let mut all = self.scan_all()?;
        if all.len() > n {
            let drop = all.len().saturating_sub(n);
            all.drain(0..drop);
        }
        Ok(all)
    }

    /// Build a routing scoreboard over the trailing `hours` window,
    /// grouped by `(model_id, role)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    pub fn build_routing_scoreboard(&self, hours: i64) -> TelemetryResult<Vec<RoutingScoreboardEntry>> {
        // Safety: chrono `DateTime` minus `Duration`, not a primitive arithmetic op.
        #[allow(clippy::arithmetic_side_effects)]
        let cutoff = Utc::now() - Duration::hours(hours);
        let records: Vec<CallTelemetry> =
            self.scan_all()?.into_iter().filter(|r| r.started_at >= cutoff).collect();
        Ok(aggregate_by_model_role(&records))
    }

    /// Delete records older than `days`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read or write.
    pub fn cleanup_old_telemetry(&self, days: i64) -> TelemetryResult<usize> {
        // Safety: chrono `DateTime` minus `Duration`, not a primitive arithmetic op.
        #[allow(clippy::arithmetic_side_effects)]
        let cutoff = Utc::now() - Duration::days(days);
        let all = self.scan_all()?;
        let mut removed = 0usize;
        for record in all {
            if record.started_at < cutoff {
                block_on(self.kv.delete(NS_RECORDS, &record.id.to_string()))?;
                removed = removed.saturating_add(1);
            }
        }
        Ok(removed)
    }

    /// Compare a recent `current_hours` window against an older
    /// `baseline_hours` trailing window and flag `(model_id, role)` pairs
    /// whose p95 latency or failure rate has regressed beyond `thresholds`.
    ///
    /// The baseline window is `[now - baseline_hours, now - current_hours)`:
    /// the longer trailing history *excluding* the current window, so a
    /// recent spike is compared against what came before it rather than
    /// diluting itself into its own baseline.
    ///
    /// Baseline pairs with fewer than 10 samples are excluded (too noisy
    /// to trust). Alerts are sorted by `change` descending.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to read.
    pub fn detect_regressions(
        &self,
        baseline_hours: i64,
        current_hours: i64,
        thresholds: RegressionThresholds,
    ) -> TelemetryResult<Vec<RegressionAlert>> {
        let all = self.scan_all()?;
        let now = Utc::now();
        // Safety: chrono `DateTime` minus `Duration`, not a primitive arithmetic op.
        #[allow(clippy::arithmetic_side_effects)]
        let baseline_cutoff = now - Duration::hours(baseline_hours);
        #[allow(clippy::arithmetic_side_effects)]
        let current_cutoff = now - Duration::hours(current_hours);

        let baseline_records: Vec<CallTelemetry> = all
            .iter()
            .filter(|r| r.started_at >= baseline_cutoff && r.started_at < current_cutoff)
            .cloned()
            .collect();
        let current_scoreboard = self.build_routing_scoreboard(current_hours)?;

        let baseline_by_key = group_by_model_role(&baseline_records);

        let mut alerts = Vec::new();
        for current in &current_scoreboard {
            let Some(baseline_records) = baseline_by_key.get(&(current.model_id.clone(), current.role))
            else {
                continue;
            };
            if baseline_records.len() < MIN_BASELINE_SAMPLES {
                continue;
            }
            let baseline_entry = aggregate_one(&current.model_id, current.role, baseline_records);

            #[allow(clippy::cast_precision_loss, clippy::arithmetic_side_effects)]
            let latency_change = current.p95_latency_ms as f64 - baseline_entry.p95_latency_ms as f64;
            if latency_change > thresholds.latency_p95_ms {
                alerts.push(RegressionAlert {
                    model_id: current.model_id.clone(),
                    role: current.role,
                    metric: RegressionMetric::LatencyP95,
                    baseline_value: baseline_entry.p95_latency_ms as f64,
                    current_value: current.p95_latency_ms as f64,
                    change: latency_change,
                    severity: severity_for(latency_change, thresholds.latency_p95_ms),
                });
            }

            #[allow(clippy::arithmetic_side_effects)]
            let failure_change = (current.failure_rate - baseline_entry.failure_rate) * 100.0;
            if failure_change > thresholds.failure_rate_points {
                #[allow(clippy::arithmetic_side_effects)]
                let baseline_failure_pct = baseline_entry.failure_rate * 100.0;
                #[allow(clippy::arithmetic_side_effects)]
                let current_failure_pct = current.failure_rate * 100.0;
                alerts.push(RegressionAlert {
                    model_id: current.model_id.clone(),
                    role: current.role,
                    metric: RegressionMetric::FailureRate,
                    baseline_value: baseline_failure_pct,
                    current_value: current_failure_pct,
                    change: failure_change,
                    severity: severity_for(failure_change, thresholds.failure_rate_points),
                });
            }
        }

        alerts.sort_by(|a, b| b.change.partial_cmp(&a.change).unwrap_or(std::cmp::Ordering::Equal));
        Ok(alerts)
    }
}

fn severity_for(change: f64, threshold: f64) -> RegressionSeverity {
    #[allow(clippy::arithmetic_side_effects)]
    let doubled = threshold * 2.0;
    if threshold > 0.0 && change > doubled {
        RegressionSeverity::Critical
    } else {
        RegressionSeverity::Warning
    }
}

fn group_by_model_role(records: &[CallTelemetry]) -> HashMap<(String, CallRole), Vec<CallTelemetry>> {
    let mut grouped: HashMap<(String, CallRole), Vec<CallTelemetry>> = HashMap::new();
    for record in records {
        grouped
            .entry((record.model_id.clone(), record.role))
            .or_default()
            .push(record.clone());
    }
    grouped
}

fn aggregate_one(model_id: &str, role: CallRole, records: &[CallTelemetry]) -> RoutingScoreboardEntry {
    let mut latencies: Vec<u64> = records.iter().filter_map(|r| r.latency_ms).collect();
    latencies.sort_unstable();

    let count = records.len();
    #[allow(clippy::cast_precision_loss, clippy::arithmetic_side_effects)]
    let failure_rate = if count == 0 {
        0.0
    } else {
        records.iter().filter(|r| r.status != CallStatus::Success).count() as f64 / count as f64
    };

    let prompt_sum: u64 = records.iter().filter_map(|r| r.prompt_tokens).sum();
    let completion_sum: u64 = records.iter().filter_map(|r| r.completion_tokens).sum();
    #[allow(clippy::cast_precision_loss, clippy::arithmetic_side_effects)]
    let (avg_prompt_tokens, avg_completion_tokens) = if count == 0 {
        (0.0, 0.0)
    } else {
        (prompt_sum as f64 / count as f64, completion_sum as f64 / count as f64)
    };

    RoutingScoreboardEntry {
        model_id: model_id.to_string(),
        role,
        count,
        failure_rate,
        p50_latency_ms: percentile(&latencies, 50.0),
        p95_latency_ms: percentile(&latencies, 95.0),
        p99_latency_ms: percentile(&latencies, 99.0),
        avg_prompt_tokens,
        avg_completion_tokens,
    }
}

fn aggregate_by_model_role(records: &[CallTelemetry]) -> Vec<RoutingScoreboardEntry> {
    let grouped = group_by_model_role(records);
    let mut entries: Vec<RoutingScoreboardEntry> = grouped
        .iter()
        .map(|((model_id, role), records)| aggregate_one(model_id, *role, records))
        .collect();
    entries.sort_by(|a, b| a.model_id.cmp(&b.model_id).then(format!("{:?}", a.role).cmp(&format!("{:?}", b.role))));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(model: &str, role: CallRole, status: CallStatus, latency_ms: u64, started_at: DateTime<Utc>) -> CallTelemetry {
        let mut record = CallTelemetry::started("t", "r", model, "provider", role, started_at);
        record.status = status;
        record.completed_at = Some(started_at);
        record.latency_ms = Some(latency_ms);
        record
    }

    #[test]
    fn store_assigns_monotonic_ids() {
        let store = TelemetryStore::in_memory();
        let a = store
            .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, 10, Utc::now()))
            .unwrap();
        let b = store
            .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, 10, Utc::now()))
            .unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn query_filters_by_model_and_status() {
        let store = TelemetryStore::in_memory();
        store
            .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, 10, Utc::now()))
            .unwrap();
        store
            .store_telemetry(record("claude", CallRole::Dispatcher, CallStatus::Failure, 20, Utc::now()))
            .unwrap();

        let filter = TelemetryFilter {
            model_id: Some("gpt".to_string()),
            ..Default::default()
        };
        let results = store.query_telemetry(&filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].model_id, "gpt");
    }

    #[test]
    fn percentile_matches_spec_formula() {
        let sorted = vec![10, 20, 30, 40, 50];
        assert_eq!(percentile(&sorted, 50.0), 30);
        assert_eq!(percentile(&sorted, 100.0), 50);
    }

    #[test]
    fn cleanup_removes_old_records_and_counts() {
        let store = TelemetryStore::in_memory();
        #[allow(clippy::arithmetic_side_effects)]
        let old = Utc::now() - Duration::days(40);
        store
            .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, 10, old))
            .unwrap();
        store
            .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, 10, Utc::now()))
            .unwrap();

        let removed = store.cleanup_old_telemetry(30).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.scan_all().unwrap().len(), 1);
    }

    #[test]
    fn build_routing_scoreboard_computes_percentiles_and_failure_rate() {
        let store = TelemetryStore::in_memory();
        for latency in [100, 200, 300, 400, 500] {
            store
                .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, latency, Utc::now()))
                .unwrap();
        }
        store
            .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Failure, 600, Utc::now()))
            .unwrap();

        let board = store.build_routing_scoreboard(1).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].count, 6);
        assert!((board[0].failure_rate - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn detect_regressions_flags_critical_latency_jump() {
        let store = TelemetryStore::in_memory();
        #[allow(clippy::arithmetic_side_effects)]
        let old = Utc::now() - Duration::hours(100);
        for _ in 0..12 {
            store
                .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, 100, old))
                .unwrap();
        }
        for _ in 0..12 {
            store
                .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, 300, Utc::now()))
                .unwrap();
        }

        let alerts = store
            .detect_regressions(
                168,
                24,
                RegressionThresholds {
                    latency_p95_ms: 50.0,
                    failure_rate_points: 10.0,
                },
            )
            .unwrap();

        assert!(!alerts.is_empty());
        let latency_alert = alerts.iter().find(|a| a.metric == RegressionMetric::LatencyP95).unwrap();
        assert_eq!(latency_alert.severity, RegressionSeverity::Critical);
    }

    #[test]
    fn detect_regressions_excludes_small_baseline_samples() {
        let store = TelemetryStore::in_memory();
        #[allow(clippy::arithmetic_side_effects)]
        let old = Utc::now() - Duration::hours(100);
        for _ in 0..3 {
            store
                .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, 100, old))
                .unwrap();
        }
        for _ in 0..12 {
            store
                .store_telemetry(record("gpt", CallRole::Dispatcher, CallStatus::Success, 300, Utc::now()))
                .unwrap();
        }

        let alerts = store
            .detect_regressions(
                168,
                24,
                RegressionThresholds {
                    latency_p95_ms: 50.0,
                    failure_rate_points: 10.0,
                },
            )
            .unwrap();
        assert!(alerts.is_empty());
    }
}
