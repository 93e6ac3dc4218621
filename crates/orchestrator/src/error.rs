// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for planning sessions.

/// Errors that can occur while configuring or running a planning session.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The device mesh name could not be parsed.
    #[error("mesh error: {0}")]
    MeshError(#[from] device_mesh::MeshError),

    /// The dataflow graph is malformed.
    #[error("graph error: {0}")]
    GraphError(#[from] rpc_graph::GraphError),

    /// Model configs could not be loaded or a model type is unknown.
    #[error("cost model error: {0}")]
    CostError(#[from] cost_model::CostError),

    /// The memory cap could not be parsed.
    #[error("memory error: {0}")]
    MemoryError(#[from] memory_accounting::MemoryError),

    /// Enumeration or search failed.
    #[error("planner error: {0}")]
    PlannerError(#[from] placement_planner::PlannerError),
}
