//! Load and lifecycle metrics.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use viewer_core::{InstanceId, LoadKind, ProductId};

/// Metrics for a single viewer instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceMetrics {
    /// Product shown by the viewer.
    pub product_id: String,
    /// Time from first load start to `Ready` (milliseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_ready_ms: Option<u64>,
    /// Initial load attempts, including retries.
    pub attempts: u32,
    /// Attempts that ran out of budget.
    pub timeouts: u32,
    /// Failed attempts by error kind.
    pub failures: BTreeMap<String, u32>,
    /// Variant switches that completed.
    pub switches_ok: u32,
    /// Variant switches that were rolled back.
    pub switches_failed: u32,
    /// Render-loop pauses (off-screen or hidden tab).
    pub pauses: u32,
    /// Whether the instance has been disposed.
    pub disposed: bool,
}

/// Snapshot of every instance's metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerMetrics {
    /// Per-instance metrics, keyed by instance id.
    pub instances: BTreeMap<String, InstanceMetrics>,
}

/// Collector for viewer metrics.
///
/// Shared by every instance on a page; recording is a short lock with no
/// I/O, so it is safe to call from completion paths.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    instances: Mutex<BTreeMap<InstanceId, InstanceMetrics>>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<InstanceId, InstanceMetrics>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, id: &InstanceId, f: impl FnOnce(&mut InstanceMetrics)) {
        let mut instances = self.lock();
        f(instances.entry(id.clone()).or_default());
    }

    /// Record a newly registered viewer.
    pub fn record_registered(&self, id: &InstanceId, product_id: &ProductId) {
        self.update(id, |m| m.product_id = product_id.to_string());
    }

    /// Record the start of a load attempt.
    pub fn record_load_started(&self, id: &InstanceId, kind: LoadKind) {
        if kind == LoadKind::Initial {
            self.update(id, |m| m.attempts += 1);
        }
    }

    /// Record a successful load.
    ///
    /// Only the first initial load sets time-to-ready.
    pub fn record_ready(&self, id: &InstanceId, kind: LoadKind, elapsed: Duration) {
        self.update(id, |m| match kind {
            LoadKind::Initial => {
                m.time_to_ready_ms
                    .get_or_insert(elapsed.as_millis() as u64);
            }
            LoadKind::VariantSwitch => m.switches_ok += 1,
        });
    }

    /// Record a failed attempt; `error_kind` is the error's short kind.
    pub fn record_failure(&self, id: &InstanceId, kind: LoadKind, error_kind: &str) {
        self.update(id, |m| {
            if error_kind == "timeout" {
                m.timeouts += 1;
            }
            *m.failures.entry(error_kind.to_string()).or_insert(0) += 1;
            if kind == LoadKind::VariantSwitch {
                m.switches_failed += 1;
            }
        });
    }

    /// Record a render-loop pause.
    pub fn record_pause(&self, id: &InstanceId) {
        self.update(id, |m| m.pauses += 1);
    }

    /// Record disposal.
    pub fn record_disposed(&self, id: &InstanceId) {
        self.update(id, |m| m.disposed = true);
    }

    /// Metrics for one instance.
    pub fn instance(&self, id: &InstanceId) -> Option<InstanceMetrics> {
        self.lock().get(id).cloned()
    }

    /// Snapshot of every instance.
    pub fn snapshot(&self) -> ViewerMetrics {
        ViewerMetrics {
            instances: self
                .lock()
                .iter()
                .map(|(id, m)| (id.to_string(), m.clone()))
                .collect(),
        }
    }
}

impl ViewerMetrics {
    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as JSON (pretty printed).
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Total failed attempts of a given kind across instances.
    pub fn failures_of(&self, error_kind: &str) -> u32 {
        self.instances
            .values()
            .filter_map(|m| m.failures.get(error_kind))
            .sum()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        for (id, m) in &self.instances {
            let ready = match m.time_to_ready_ms {
                Some(ms) => format!("ready in {}ms", ms),
                None => "never ready".to_string(),
            };
            let mut line = format!(
                "{}: {} | attempts: {} | switches: {} ok, {} failed",
                id, ready, m.attempts, m.switches_ok, m.switches_failed
            );
            if !m.failures.is_empty() {
                let failures: Vec<String> = m
                    .failures
                    .iter()
                    .map(|(kind, n)| format!("{}={}", kind, n))
                    .collect();
                line.push_str(&format!(" | failures: {}", failures.join(" ")));
            }
            if m.disposed {
                line.push_str(" [disposed]");
            }
            lines.push(line);
        }

        lines.join("\n")
    }
}
