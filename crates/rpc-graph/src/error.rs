// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for RPC descriptors and dataflow graphs.

/// Errors that can occur when building or expanding an RPC graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The graph contains no RPCs.
    #[error("dataflow graph contains no RPCs")]
    EmptyGraph,

    /// Two RPCs share a name.
    #[error("duplicate RPC name '{0}'")]
    DuplicateRpc(String),

    /// An RPC descriptor is malformed.
    #[error("invalid RPC '{rpc}': {detail}")]
    InvalidRpc { rpc: String, detail: String },

    /// An edge names an RPC that does not exist.
    #[error("RPC '{rpc}' references unknown RPC '{target}'")]
    DanglingEdge { rpc: String, target: String },

    /// The single-epoch graph is not acyclic.
    #[error("dependency cycle among RPCs: {}", .0.join(", "))]
    Cycle(Vec<String>),

    /// A model name string could not be parsed.
    #[error("invalid model name '{0}': expected 'role' or 'role@replica'")]
    InvalidModelName(String),

    /// Epoch expansion parameters are out of range.
    #[error("invalid epoch configuration: {0}")]
    InvalidEpochConfig(String),
}
