// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Placement plan: the output of the search.
//!
//! A plan assigns exactly one [`RpcExecution`] to every call of the
//! dataflow graph. It is the contract between the planner and whatever
//! launches the workers.

use crate::search::{SearchConfig, SearchReport};
use crate::{PlannerError, RpcExecution};
use memory_accounting::GroupedRpcExecutions;
use std::collections::HashSet;

const GIB: f64 = (1u64 << 30) as f64;

/// The chosen placement of every call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlacementPlan {
    /// One execution per call, in declaration order.
    pub executions: Vec<RpcExecution>,
    /// Σ time cost, nanoseconds.
    pub total_time_cost: u64,
    /// Grouped memory cost, bytes.
    pub grouped_mem_cost: u64,
    /// The limit the plan was searched under, bytes.
    pub mem_limit: u64,
    /// The search stopped on its iteration cap; a faster plan may exist.
    pub budget_exhausted: bool,
    /// Valid assignments seen by the search.
    pub valid_assignments: usize,
}

impl PlacementPlan {
    /// Takes the best assignment out of a search report.
    ///
    /// # Errors
    /// [`PlannerError::NoFeasiblePlan`] when the search found nothing, with
    /// the deepest overrun as diagnostic.
    pub fn from_report(report: SearchReport, config: &SearchConfig) -> Result<Self, PlannerError> {
        let mem_limit = config.mem_limit()?.as_bytes();
        let diagnostic = report.diagnostic();
        let best = report
            .best
            .ok_or(PlannerError::NoFeasiblePlan { diagnostic })?;
        let plan = Self {
            executions: best.executions,
            total_time_cost: best.time_cost,
            grouped_mem_cost: best.mem_cost,
            mem_limit,
            budget_exhausted: report.budget_exhausted,
            valid_assignments: report.valid_count,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn num_rpcs(&self) -> usize {
        self.executions.len()
    }

    /// Looks up the execution chosen for a call.
    pub fn execution_for(&self, rpc_name: &str) -> Option<&RpcExecution> {
        self.executions.iter().find(|e| e.rpc_name() == rpc_name)
    }

    /// Recomputes the grouped memory cost of the chosen executions.
    pub fn regroup(&self, config: &SearchConfig) -> GroupedRpcExecutions {
        let mut grouped = GroupedRpcExecutions::new(config.overlap_rule);
        for e in &self.executions {
            grouped.add(e);
        }
        grouped
    }

    /// Validates the plan.
    ///
    /// Checks:
    /// - Plan is non-empty.
    /// - Each call appears once.
    /// - Recorded totals match the executions.
    /// - Grouped memory stays within the limit.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.executions.is_empty() {
            return Err(PlannerError::EmptyRpcSet);
        }

        let mut seen = HashSet::new();
        for e in &self.executions {
            if !seen.insert(e.rpc_name()) {
                return Err(PlannerError::InvalidPlan(format!(
                    "'{}' is placed more than once",
                    e.rpc_name()
                )));
            }
        }

        let time: u64 = self.executions.iter().map(|e| e.time_cost).sum();
        if time != self.total_time_cost {
            return Err(PlannerError::InvalidPlan(format!(
                "recorded time {} ns but executions sum to {time} ns",
                self.total_time_cost
            )));
        }

        if self.grouped_mem_cost > self.mem_limit {
            return Err(PlannerError::InvalidPlan(format!(
                "grouped memory {} bytes exceeds the {} byte limit",
                self.grouped_mem_cost, self.mem_limit
            )));
        }
        Ok(())
    }

    /// Returns a human-readable summary of the plan.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Plan: {} calls, {:.3} ms total, {:.2}/{:.2} GiB grouped{}\n",
            self.num_rpcs(),
            self.total_time_cost as f64 / 1e6,
            self.grouped_mem_cost as f64 / GIB,
            self.mem_limit as f64 / GIB,
            if self.budget_exhausted {
                " (search budget exhausted)"
            } else {
                ""
            },
        );
        for e in &self.executions {
            out.push_str(&format!("  {e}\n"));
        }
        out
    }
}
