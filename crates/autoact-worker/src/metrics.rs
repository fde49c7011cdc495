// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process execution metrics with a Prometheus text rendering.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const ELAPSED_BUCKETS_SECS: [f64; 9] = [1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0];

/// Elapsed-time histograms for completed actions, labelled by operation
/// name and outcome. Cloning shares the underlying registry.
#[derive(Clone, Default)]
pub struct ActionMetrics {
    inner: Arc<Mutex<BTreeMap<(String, String), HistogramSeries>>>,
}

#[derive(Debug, Default, Clone)]
struct HistogramSeries {
    sum: f64,
    count: u64,
    buckets: [u64; ELAPSED_BUCKETS_SECS.len()],
}

impl HistogramSeries {
    fn observe(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        for (idx, upper_bound) in ELAPSED_BUCKETS_SECS.iter().enumerate() {
            if value <= *upper_bound {
                self.buckets[idx] += 1;
            }
        }
    }
}

impl ActionMetrics {
    /// Record the total elapsed seconds from action creation to its
    /// terminal transition.
    pub fn observe_elapsed(&self, name: &str, outcome: &str, elapsed_secs: f64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .entry((name.to_string(), outcome.to_string()))
                .or_default()
                .observe(elapsed_secs);
        }
    }

    /// Total observations for one (name, outcome) series.
    pub fn count(&self, name: &str, outcome: &str) -> u64 {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .get(&(name.to_string(), outcome.to_string()))
                    .map(|s| s.count)
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let series: Vec<((String, String), HistogramSeries)> = self
            .inner
            .lock()
            .map(|inner| inner.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let mut out = String::new();
        out.push_str(
            "# HELP autoact_action_elapsed_seconds Seconds from action creation to terminal state.\n",
        );
        out.push_str("# TYPE autoact_action_elapsed_seconds histogram\n");
        for ((name, outcome), hist) in series {
            for (idx, upper_bound) in ELAPSED_BUCKETS_SECS.iter().enumerate() {
                out.push_str(&format!(
                    "autoact_action_elapsed_seconds_bucket{{name=\"{}\",outcome=\"{}\",le=\"{}\"}} {}\n",
                    name, outcome, upper_bound, hist.buckets[idx]
                ));
            }
            out.push_str(&format!(
                "autoact_action_elapsed_seconds_bucket{{name=\"{}\",outcome=\"{}\",le=\"+Inf\"}} {}\n",
                name, outcome, hist.count
            ));
            out.push_str(&format!(
                "autoact_action_elapsed_seconds_sum{{name=\"{}\",outcome=\"{}\"}} {:.6}\n",
                name, outcome, hist.sum
            ));
            out.push_str(&format!(
                "autoact_action_elapsed_seconds_count{{name=\"{}\",outcome=\"{}\"}} {}\n",
                name, outcome, hist.count
            ));
        }
        out
    }
}
