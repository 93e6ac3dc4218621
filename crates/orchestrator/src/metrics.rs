// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Planning metrics.
//!
//! [`PlanningMetrics`] collects wall-clock durations of enumeration and
//! search together with candidate and iteration counts, for comparing
//! cost models and search settings on the same cluster.

use placement_planner::{CandidateTable, SearchReport};
use std::time::Duration;

/// Candidates found for a single call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RpcMetrics {
    pub rpc_name: String,
    pub num_candidates: usize,
    /// Time cost of the fastest candidate, nanoseconds.
    pub fastest_time_cost: u64,
}

/// Aggregate metrics for a planning session.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PlanningMetrics {
    pub enumeration_duration: Duration,
    pub search_duration: Duration,
    pub rpc_metrics: Vec<RpcMetrics>,
    /// Product of the candidate counts.
    pub search_space: u128,
    pub outer_iterations: usize,
    pub inner_iterations: usize,
    pub valid_count: usize,
    pub budget_exhausted: bool,
    /// Number of searches run in this session.
    pub searches: usize,
}

impl PlanningMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of candidate enumeration.
    pub fn record_enumeration(&mut self, table: &CandidateTable, duration: Duration) {
        self.enumeration_duration = duration;
        self.search_space = table.search_space();
        self.rpc_metrics = table
            .iter()
            .map(|(rpc, candidates)| RpcMetrics {
                rpc_name: rpc.rpc_name.clone(),
                num_candidates: candidates.len(),
                fastest_time_cost: candidates.first().map_or(0, |c| c.time_cost),
            })
            .collect();
    }

    /// Records the outcome of one search; later searches overwrite the counts.
    pub fn record_search(&mut self, report: &SearchReport, duration: Duration) {
        self.search_duration = duration;
        self.outer_iterations = report.outer_iterations;
        self.inner_iterations = report.inner_iterations;
        self.valid_count = report.valid_count;
        self.budget_exhausted = report.budget_exhausted;
        self.searches += 1;
    }

    /// Total candidates across all calls.
    pub fn total_candidates(&self) -> usize {
        self.rpc_metrics.iter().map(|m| m.num_candidates).sum()
    }

    /// Assignments visited per second of search.
    pub fn assignments_per_second(&self) -> f64 {
        let secs = self.search_duration.as_secs_f64();
        if secs <= 0.0 || self.outer_iterations == 0 {
            return 0.0;
        }
        self.outer_iterations as f64 / secs
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let counts: Vec<String> = self
            .rpc_metrics
            .iter()
            .map(|m| format!("{}={}", m.rpc_name, m.num_candidates))
            .collect();
        format!(
            "Planning: enumeration {:.2}ms ({} candidates: {}), \
             search {:.2}ms ({} assignments of {}, {} adds, {} valid, {:.0} assign/s){}",
            self.enumeration_duration.as_secs_f64() * 1000.0,
            self.total_candidates(),
            counts.join(", "),
            self.search_duration.as_secs_f64() * 1000.0,
            self.outer_iterations,
            self.search_space,
            self.inner_iterations,
            self.valid_count,
            self.assignments_per_second(),
            if self.budget_exhausted {
                ", budget exhausted"
            } else {
                ""
            },
        )
    }
}
