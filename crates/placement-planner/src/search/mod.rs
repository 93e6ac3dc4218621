// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Backtracking search over one-candidate-per-call assignments.
//!
//! Calls are visited in [`priority_order`]. Each assignment is evaluated by
//! adding its executions, in that order, to a fresh
//! [`GroupedRpcExecutions`]; the first call that pushes the grouped memory
//! above `gpu_mem_cap × mem_margin` marks the assignment infeasible at that
//! depth. The [`Odometer`] then advances at that depth, skipping every
//! assignment sharing the failing prefix, since adding executions never
//! lowers grouped memory.
//!
//! The walk ends when the odometer wraps past the first call or after
//! `max_inner_iterations` execution adds.

pub mod odometer;
pub mod priority;

pub use odometer::Odometer;
pub use priority::{priority_order, top_k_mean};

use crate::{CandidateTable, PlannerError, RpcExecution};
use memory_accounting::{GroupedRpcExecutions, MemoryBudget, OverlapRule};
use std::fmt;

const GIB: f64 = (1u64 << 30) as f64;

/// Search parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchConfig {
    pub gpu_mem_cap: MemoryBudget,
    /// Slack over the cap tolerated during search (offload headroom).
    pub mem_margin: f64,
    /// Cap on execution adds across the whole search.
    pub max_inner_iterations: usize,
    /// Window for the priority heuristic.
    pub priority_top_k: usize,
    pub overlap_rule: OverlapRule,
    /// Valid assignments kept verbatim in the report.
    pub record_valid_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            gpu_mem_cap: MemoryBudget::from_gib(80),
            mem_margin: 1.2,
            max_inner_iterations: 200_000,
            priority_top_k: 10,
            overlap_rule: OverlapRule::Any,
            record_valid_limit: 0,
        }
    }
}

impl SearchConfig {
    /// The pruning threshold, `gpu_mem_cap × mem_margin`.
    pub fn mem_limit(&self) -> Result<MemoryBudget, PlannerError> {
        Ok(self.gpu_mem_cap.scaled(self.mem_margin)?)
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        self.mem_limit()?;
        if self.max_inner_iterations == 0 {
            return Err(PlannerError::InvalidConfig(
                "max_inner_iterations must be at least 1".into(),
            ));
        }
        if self.priority_top_k == 0 {
            return Err(PlannerError::InvalidConfig(
                "priority_top_k must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One execution per call, in table (declaration) order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Assignment {
    pub executions: Vec<RpcExecution>,
    /// Σ time cost, nanoseconds.
    pub time_cost: u64,
    /// Grouped memory cost, bytes.
    pub mem_cost: u64,
}

/// The deepest point an infeasible assignment reached.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Overrun {
    /// Calls placed before the overrun, including the offending one.
    pub depth: usize,
    pub execution: RpcExecution,
    pub group: usize,
    pub mem_cost: u64,
    pub mem_limit: u64,
}

impl fmt::Display for Overrun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "placing '{}' on {} {} (call {} in placement order) raised group #{} \
             and the total grouped memory to {:.2} GiB, over the {:.2} GiB limit",
            self.execution.rpc.rpc_name,
            self.execution.device_mesh,
            self.execution.parallel_strategy,
            self.depth,
            self.group,
            self.mem_cost as f64 / GIB,
            self.mem_limit as f64 / GIB,
        )
    }
}

/// Everything the search learned.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchReport {
    /// Assignments fully evaluated or pruned.
    pub outer_iterations: usize,
    /// Execution adds performed.
    pub inner_iterations: usize,
    pub valid_count: usize,
    /// The iteration cap stopped the walk before it finished.
    pub budget_exhausted: bool,
    /// Minimum-time valid assignment (first found wins ties).
    pub best: Option<Assignment>,
    /// The first `record_valid_limit` valid assignments.
    pub recorded: Vec<Assignment>,
    /// Deepest overrun seen, lowest memory among equals.
    pub deepest_overrun: Option<Overrun>,
}

impl SearchReport {
    /// Describes why no assignment was found.
    pub fn diagnostic(&self) -> String {
        let cause = match &self.deepest_overrun {
            Some(o) => o.to_string(),
            None => "no assignment was evaluated".to_string(),
        };
        if self.budget_exhausted {
            format!(
                "{cause}; search stopped after {} execution adds without exhausting the space",
                self.inner_iterations
            )
        } else {
            cause
        }
    }

    pub fn summary(&self) -> String {
        let best = match &self.best {
            Some(b) => format!(
                "best {:.3} ms at {:.2} GiB",
                b.time_cost as f64 / 1e6,
                b.mem_cost as f64 / GIB
            ),
            None => "no valid assignment".to_string(),
        };
        format!(
            "Search: {} valid of {} visited ({} adds){}, {}",
            self.valid_count,
            self.outer_iterations,
            self.inner_iterations,
            if self.budget_exhausted { ", budget exhausted" } else { "" },
            best,
        )
    }
}

/// Walks the assignment space of `table`.
///
/// Never fails because of memory: infeasibility is reported through
/// [`SearchReport::best`] being `None`.
pub fn search(table: &CandidateTable, config: &SearchConfig) -> Result<SearchReport, PlannerError> {
    config.validate()?;
    let limit = config.mem_limit()?.as_bytes();
    let n = table.num_rpcs();

    let order = priority_order(table, config.priority_top_k);
    let rows: Vec<&[RpcExecution]> = order.iter().map(|&i| table.candidates(i)).collect();
    let mut odometer = Odometer::new(rows.iter().map(|r| r.len()).collect()).ok_or_else(|| {
        PlannerError::InvalidConfig("every call needs at least one candidate".into())
    })?;

    let mut report = SearchReport::default();
    loop {
        report.outer_iterations += 1;
        let mut grouped = GroupedRpcExecutions::new(config.overlap_rule);
        let mut time_cost = 0u64;
        let mut mem_cost = 0u64;
        let mut failed_at = None;

        for (depth, (row, &cursor)) in rows.iter().zip(odometer.index()).enumerate() {
            let execution = &row[cursor];
            time_cost += execution.time_cost;
            let group = grouped.add(execution);
            report.inner_iterations += 1;
            mem_cost = grouped.total_mem_cost();
            if mem_cost > limit {
                failed_at = Some(depth);
                record_overrun(&mut report, depth + 1, execution, group, mem_cost, limit);
                break;
            }
        }

        if failed_at.is_none() {
            report.valid_count += 1;
            let improves = report.best.as_ref().map_or(true, |b| time_cost < b.time_cost);
            if improves || report.recorded.len() < config.record_valid_limit {
                let assignment = assemble(&order, &rows, odometer.index(), time_cost, mem_cost);
                if report.recorded.len() < config.record_valid_limit {
                    report.recorded.push(assignment.clone());
                }
                if improves {
                    tracing::debug!(
                        "new best assignment {:?}: {:.3} ms, {:.2} GiB",
                        odometer.index(),
                        time_cost as f64 / 1e6,
                        mem_cost as f64 / GIB
                    );
                    report.best = Some(assignment);
                }
            }
        }

        if !odometer.advance(failed_at.unwrap_or(n - 1)) {
            break;
        }
        if report.inner_iterations >= config.max_inner_iterations {
            report.budget_exhausted = true;
            tracing::warn!(
                "search budget of {} execution adds exhausted after {} assignments; \
                 result may be suboptimal",
                config.max_inner_iterations,
                report.outer_iterations
            );
            break;
        }
    }

    tracing::info!("{}", report.summary());
    Ok(report)
}

fn record_overrun(
    report: &mut SearchReport,
    depth: usize,
    execution: &RpcExecution,
    group: usize,
    mem_cost: u64,
    mem_limit: u64,
) {
    let replace = match &report.deepest_overrun {
        None => true,
        Some(o) => depth > o.depth || (depth == o.depth && mem_cost < o.mem_cost),
    };
    if replace {
        report.deepest_overrun = Some(Overrun {
            depth,
            execution: execution.clone(),
            group,
            mem_cost,
            mem_limit,
        });
    }
}

/// Re-orders the priority-ordered cursors back into table order.
fn assemble(
    order: &[usize],
    rows: &[&[RpcExecution]],
    index: &[usize],
    time_cost: u64,
    mem_cost: u64,
) -> Assignment {
    let mut slots: Vec<Option<RpcExecution>> = vec![None; order.len()];
    for (pos, &table_row) in order.iter().enumerate() {
        slots[table_row] = Some(rows[pos][index[pos]].clone());
    }
    Assignment {
        executions: slots.into_iter().flatten().collect(),
        time_cost,
        mem_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_mesh::{DeviceMesh, ParallelStrategy};
    use rpc_graph::{InterfaceType, ModelName, Rpc};

    const GIB: u64 = 1 << 30;

    fn exe(rpc: &str, role: &str, mesh: &str, time: u64, mem_gib: u64) -> RpcExecution {
        let device_mesh = DeviceMesh::parse(mesh, 8).unwrap();
        let n = device_mesh.device_count();
        RpcExecution {
            rpc: Rpc {
                rpc_name: rpc.into(),
                model_name: ModelName::new(role, 0),
                interface_type: InterfaceType::Inference,
            },
            device_mesh,
            parallel_strategy: ParallelStrategy::new(n, 1, 1).unwrap(),
            time_cost: time,
            mem: mem_gib * GIB,
            static_mem: mem_gib * GIB / 2,
        }
    }

    fn config(cap_gib: u64) -> SearchConfig {
        SearchConfig {
            gpu_mem_cap: MemoryBudget::from_gib(cap_gib),
            mem_margin: 1.0,
            record_valid_limit: 100,
            ..Default::default()
        }
    }

    fn two_by_two() -> CandidateTable {
        CandidateTable::from_rows(vec![
            (
                exe("a", "actor", "node01", 0, 0).rpc,
                vec![
                    exe("a", "actor", "node01", 10, 60),
                    exe("a", "actor", "node01:0,1,2,3", 20, 30),
                ],
            ),
            (
                exe("b", "critic", "node01", 0, 0).rpc,
                vec![
                    exe("b", "critic", "node01", 5, 50),
                    exe("b", "critic", "node01:4,5,6,7", 8, 30),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_counts_all_valid_when_unconstrained() {
        let report = search(&two_by_two(), &config(1000)).unwrap();
        assert_eq!(report.valid_count, 4);
        assert_eq!(report.outer_iterations, 4);
        assert_eq!(report.recorded.len(), 4);
        assert!(!report.budget_exhausted);
        let best = report.best.unwrap();
        assert_eq!(best.time_cost, 15);
        assert_eq!(best.executions[0].rpc_name(), "a");
        assert_eq!(best.executions[1].rpc_name(), "b");
    }

    #[test]
    fn test_memory_picks_slower_disjoint_plan() {
        // Anything on the full node overlaps the other call; only the disjoint
        // halves (30 + 30 GiB) fit.
        let report = search(&two_by_two(), &config(64)).unwrap();
        let best = report.best.unwrap();
        assert_eq!(best.time_cost, 28);
        assert_eq!(best.mem_cost, 60 * GIB);
        assert_eq!(report.valid_count, 1);
        for exe in &best.executions {
            assert_ne!(exe.device_mesh.to_string(), "node01");
        }
    }

    #[test]
    fn test_infeasible_reports_deepest_overrun() {
        let report = search(&two_by_two(), &config(20)).unwrap();
        assert!(report.best.is_none());
        assert_eq!(report.valid_count, 0);
        let overrun = report.deepest_overrun.clone().unwrap();
        assert_eq!(overrun.depth, 1);
        assert_eq!(overrun.mem_cost, 30 * GIB);
        assert!(report.diagnostic().contains("over the 20.00 GiB limit"));
    }

    #[test]
    fn test_pruning_skips_suffixes() {
        // The first-placed call never fits; each of its candidates is tried once.
        let table = CandidateTable::from_rows(vec![
            (
                exe("big", "actor", "node01", 0, 0).rpc,
                vec![
                    exe("big", "actor", "node01", 100, 90),
                    exe("big", "actor", "node01:0,1,2,3", 200, 95),
                ],
            ),
            (
                exe("small", "ref", "node01", 0, 0).rpc,
                vec![
                    exe("small", "ref", "node01:0", 1, 1),
                    exe("small", "ref", "node01:1", 2, 1),
                    exe("small", "ref", "node01:2", 3, 1),
                ],
            ),
        ])
        .unwrap();
        let report = search(&table, &config(80)).unwrap();
        assert_eq!(report.outer_iterations, 2);
        assert_eq!(report.inner_iterations, 2);
        assert!(report.best.is_none());
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut cfg = config(1000);
        cfg.max_inner_iterations = 3;
        let report = search(&two_by_two(), &cfg).unwrap();
        assert!(report.budget_exhausted);
        assert_eq!(report.inner_iterations, 4);
        assert_eq!(report.valid_count, 2);
        assert!(report.best.is_some());
        assert!(report.summary().contains("budget exhausted"));
    }

    #[test]
    fn test_margin_relaxes_limit() {
        let mut cfg = config(50);
        assert!(search(&two_by_two(), &cfg).unwrap().best.is_none());
        cfg.mem_margin = 1.2;
        // Limit 60 GiB admits the disjoint halves.
        assert_eq!(search(&two_by_two(), &cfg).unwrap().valid_count, 1);
    }

    #[test]
    fn test_deterministic() {
        let a = search(&two_by_two(), &config(64)).unwrap();
        let b = search(&two_by_two(), &config(64)).unwrap();
        assert_eq!(a.recorded, b.recorded);
        assert_eq!(a.best, b.best);
        assert_eq!(a.outer_iterations, b.outer_iterations);
    }

    #[test]
    fn test_invalid_config() {
        let mut cfg = config(80);
        cfg.max_inner_iterations = 0;
        assert!(matches!(
            search(&two_by_two(), &cfg),
            Err(PlannerError::InvalidConfig(_))
        ));
        let mut cfg = config(80);
        cfg.mem_margin = -1.0;
        assert!(search(&two_by_two(), &cfg).is_err());
    }
}
