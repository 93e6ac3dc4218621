// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # placement-planner
//!
//! Chooses, for every call of a PPO dataflow graph, a sub-mesh and a
//! parallel strategy so that the summed time cost is minimal and the
//! grouped memory of all placements fits on the devices.
//!
//! # Pipeline
//!
//! | Stage | Entry point | Output |
//! |---|---|---|
//! | Enumerate | [`CandidateTable::build`] | Feasible placements per call, fastest first |
//! | Order | [`priority_order`] | Expensive calls first |
//! | Search | [`search`] | [`SearchReport`] with the best assignment |
//! | Finalise | [`PlacementPlan::from_report`] | Validated [`PlacementPlan`] |
//!
//! # Example
//! ```no_run
//! use cost_model::{AnalyticEstimator, ModelConfigRegistry};
//! use device_mesh::DeviceMesh;
//! use placement_planner::{plan_placements, CandidateTable, EnumerationConfig, SearchConfig};
//! use rpc_graph::{DataflowGraph, InterfaceType, ModelRpc};
//! use std::path::Path;
//!
//! let registry = ModelConfigRegistry::load_dir(Path::new("./models")).unwrap();
//! let graph = DataflowGraph::new(vec![ModelRpc::new(
//!     "actor_gen", "actor", "llama-7b", InterfaceType::Generate, 128, 131072,
//! )])
//! .validate()
//! .unwrap();
//! let mesh = DeviceMesh::parse("node[01-02]", 8).unwrap();
//! let table = CandidateTable::build(
//!     &graph, &registry, &mesh, &AnalyticEstimator::default(), &EnumerationConfig::default(),
//! )
//! .unwrap();
//! let plan = plan_placements(&table, &SearchConfig::default()).unwrap();
//! println!("{}", plan.summary());
//! ```

mod enumerate;
mod error;
mod execution;
mod plan;
pub mod search;

pub use enumerate::{enumerate_rpc_executions, CandidateTable, EnumerationConfig};
pub use error::PlannerError;
pub use execution::RpcExecution;
pub use plan::PlacementPlan;
pub use search::{priority_order, search, Assignment, Odometer, Overrun, SearchConfig, SearchReport};

/// Searches `table` and returns the fastest memory-feasible plan.
pub fn plan_placements(
    table: &CandidateTable,
    config: &SearchConfig,
) -> Result<PlacementPlan, PlannerError> {
    tracing::info!(
        "searching {} calls, {} assignments under {} × {}",
        table.num_rpcs(),
        table.search_space(),
        config.gpu_mem_cap,
        config.mem_margin,
    );
    let report = search(table, config)?;
    PlacementPlan::from_report(report, config)
}
