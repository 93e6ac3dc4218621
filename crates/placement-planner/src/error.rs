// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for placement enumeration and search.

/// Errors that can occur while planning placements.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// No calls were given to place.
    #[error("cannot plan an empty set of RPCs")]
    EmptyRpcSet,

    /// A call has no placement that passes the legality and memory filters.
    #[error("RPC '{rpc}' has no feasible placement on {mesh}: {detail}")]
    NoCandidates {
        rpc: String,
        mesh: String,
        detail: String,
    },

    /// Every assignment the search visited exceeded the memory limit.
    #[error("no feasible placement plan: {diagnostic}")]
    NoFeasiblePlan { diagnostic: String },

    /// Search or enumeration parameters are out of range.
    #[error("invalid planner configuration: {0}")]
    InvalidConfig(String),

    /// A plan failed its consistency checks.
    #[error("invalid placement plan: {0}")]
    InvalidPlan(String),

    #[error(transparent)]
    Mesh(#[from] device_mesh::MeshError),

    #[error(transparent)]
    Graph(#[from] rpc_graph::GraphError),

    #[error(transparent)]
    Cost(#[from] cost_model::CostError),

    #[error(transparent)]
    Memory(#[from] memory_accounting::MemoryError),
}
