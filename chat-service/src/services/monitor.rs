//! In-memory request monitor backing the admin analytics endpoints.
//!
//! Keeps a bounded ring buffer of recent request records. Process-local:
//! numbers reset on restart and are not coordinated across instances.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// Maximum retained request records.
const MAX_RECORDS: usize = 10_000;

/// Window used for the rolling health snapshot.
const HEALTH_WINDOW: usize = 100;

/// Requests slower than this are logged as slow.
const SLOW_REQUEST_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub method: String,
    pub status: u16,
    pub duration_secs: f64,
}

#[derive(Debug)]
struct MonitorInner {
    records: VecDeque<RequestRecord>,
    started_at: DateTime<Utc>,
}

/// Bounded request history with aggregate views.
#[derive(Debug)]
pub struct RequestMonitor {
    inner: Mutex<MonitorInner>,
}

impl RequestMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MonitorInner {
                records: VecDeque::with_capacity(MAX_RECORDS),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn record(&self, endpoint: &str, method: &str, status: u16, duration_secs: f64) {
        if duration_secs > SLOW_REQUEST_SECONDS {
            tracing::warn!(
                endpoint = endpoint,
                duration_secs = duration_secs,
                "Slow response"
            );
        }
        if status >= 500 {
            tracing::error!(endpoint = endpoint, status = status, "Server error response");
        }

        let mut inner = self.inner.lock().expect("monitor lock poisoned");
        if inner.records.len() == MAX_RECORDS {
            inner.records.pop_front();
        }
        inner.records.push_back(RequestRecord {
            timestamp: Utc::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status,
            duration_secs,
        });
    }

    pub fn uptime_hours(&self) -> f64 {
        let inner = self.inner.lock().expect("monitor lock poisoned");
        (Utc::now() - inner.started_at).num_seconds() as f64 / 3600.0
    }

    /// Rolling snapshot over the most recent records.
    pub fn health_snapshot(&self) -> serde_json::Value {
        let inner = self.inner.lock().expect("monitor lock poisoned");
        let recent: Vec<&RequestRecord> = inner
            .records
            .iter()
            .rev()
            .take(HEALTH_WINDOW)
            .collect();

        let (avg_response_time, error_rate) = if recent.is_empty() {
            (0.0, 0.0)
        } else {
            let avg =
                recent.iter().map(|r| r.duration_secs).sum::<f64>() / recent.len() as f64;
            let errors = recent.iter().filter(|r| r.status >= 400).count();
            (avg, errors as f64 / recent.len() as f64)
        };

        json!({
            "active_connections": recent.len(),
            "average_response_time": avg_response_time,
            "error_rate": error_rate,
            "total_requests": inner.records.len(),
            "uptime_hours": (Utc::now() - inner.started_at).num_seconds() as f64 / 3600.0,
        })
    }

    /// Usage aggregates for the last `hours`.
    pub fn usage_analytics(&self, hours: i64) -> serde_json::Value {
        let inner = self.inner.lock().expect("monitor lock poisoned");
        let cutoff = Utc::now() - Duration::hours(hours);
        let recent: Vec<&RequestRecord> = inner
            .records
            .iter()
            .filter(|r| r.timestamp > cutoff)
            .collect();

        let mut endpoint_usage: BTreeMap<String, u64> = BTreeMap::new();
        let mut hourly_distribution: BTreeMap<String, u64> = BTreeMap::new();
        let mut error_summary: BTreeMap<String, u64> = BTreeMap::new();

        for record in &recent {
            *endpoint_usage.entry(record.endpoint.clone()).or_default() += 1;
            *hourly_distribution
                .entry(record.timestamp.format("%H").to_string())
                .or_default() += 1;
            if record.status >= 400 {
                *error_summary
                    .entry(format!("{}_{}", record.status, record.endpoint))
                    .or_default() += 1;
            }
        }

        json!({
            "time_period_hours": hours,
            "total_requests": recent.len(),
            "unique_endpoints": endpoint_usage.len(),
            "endpoint_usage": endpoint_usage,
            "hourly_distribution": hourly_distribution,
            "error_summary": error_summary,
            "uptime_hours": (Utc::now() - inner.started_at).num_seconds() as f64 / 3600.0,
        })
    }

    /// Error aggregates for the last `hours`.
    pub fn error_summary(&self, hours: i64) -> serde_json::Value {
        let inner = self.inner.lock().expect("monitor lock poisoned");
        let cutoff = Utc::now() - Duration::hours(hours);
        let errors: Vec<&RequestRecord> = inner
            .records
            .iter()
            .filter(|r| r.timestamp > cutoff && r.status >= 400)
            .collect();

        let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_endpoint: BTreeMap<String, u64> = BTreeMap::new();
        for record in &errors {
            *by_status.entry(record.status.to_string()).or_default() += 1;
            *by_endpoint.entry(record.endpoint.clone()).or_default() += 1;
        }

        let recent_errors: Vec<&&RequestRecord> =
            errors.iter().rev().take(10).collect();

        json!({
            "time_period_hours": hours,
            "total_errors": errors.len(),
            "error_types": by_status,
            "affected_endpoints": by_endpoint,
            "recent_errors": recent_errors,
        })
    }

    /// Drop all retained records.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("monitor lock poisoned");
        inner.records.clear();
    }
}

impl Default for RequestMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_feed_analytics() {
        let monitor = RequestMonitor::new();
        monitor.record("/api/v1/chat", "POST", 200, 0.5);
        monitor.record("/api/v1/chat", "POST", 200, 1.5);
        monitor.record("/api/crops", "GET", 500, 0.1);

        let analytics = monitor.usage_analytics(24);
        assert_eq!(analytics["total_requests"], 3);
        assert_eq!(analytics["unique_endpoints"], 2);
        assert_eq!(analytics["endpoint_usage"]["/api/v1/chat"], 2);
        assert_eq!(analytics["error_summary"]["500_/api/crops"], 1);
    }

    #[test]
    fn error_summary_only_counts_errors() {
        let monitor = RequestMonitor::new();
        monitor.record("/api/v1/chat", "POST", 200, 0.5);
        monitor.record("/api/v1/chat", "POST", 429, 0.0);
        monitor.record("/api/crops", "GET", 500, 0.1);

        let summary = monitor.error_summary(24);
        assert_eq!(summary["total_errors"], 2);
        assert_eq!(summary["error_types"]["429"], 1);
        assert_eq!(summary["affected_endpoints"]["/api/crops"], 1);
    }

    #[test]
    fn health_snapshot_computes_error_rate() {
        let monitor = RequestMonitor::new();
        for _ in 0..3 {
            monitor.record("/api/v1/chat", "POST", 200, 1.0);
        }
        monitor.record("/api/v1/chat", "POST", 500, 1.0);

        let health = monitor.health_snapshot();
        assert_eq!(health["active_connections"], 4);
        assert_eq!(health["error_rate"], 0.25);
        assert_eq!(health["average_response_time"], 1.0);
    }

    #[test]
    fn clear_empties_history() {
        let monitor = RequestMonitor::new();
        monitor.record("/api/v1/chat", "POST", 200, 0.5);
        monitor.clear();

        let analytics = monitor.usage_analytics(24);
        assert_eq!(analytics["total_requests"], 0);
    }
}
