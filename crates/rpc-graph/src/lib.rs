// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # rpc-graph
//!
//! Describes the model calls of one RLHF training iteration and how they
//! depend on each other.
//!
//! - [`InterfaceType`]: what a call does: generate, inference, train step.
//! - [`ModelName`]: which model replica a call runs on (`actor@0`, ...).
//! - [`ModelRpc`]: the full call descriptor (batch bounds, data keys,
//!   edges, model type).
//! - [`Rpc`]: the hashable identity projection used by the planner.
//! - [`DataflowGraph`]: the single-epoch call graph, with a **type-state
//!   pattern** (`Loaded` → `Validated`).
//! - [`RpcInstance`]: one call in one epoch of the expanded multi-epoch
//!   graph, see [`DataflowGraph::expand_epochs`].
//!
//! # Example
//! ```
//! use rpc_graph::{DataflowGraph, InterfaceType, ModelRpc};
//!
//! let gen = ModelRpc::new("actor_gen", "actor", "llama-7b", InterfaceType::Generate, 128, 128 * 1024)
//!     .with_outputs(&["seq"]);
//! let train = ModelRpc::new("actor_train", "actor", "llama-7b", InterfaceType::TrainStep, 128, 128 * 1024)
//!     .with_inputs(&["seq"]);
//!
//! let graph = DataflowGraph::new(vec![gen, train]).validate().unwrap();
//! let instances = graph.expand_epochs(3, 1).unwrap();
//! assert_eq!(instances.len(), 6);
//! assert_eq!(instances[2].name(), "actor_gen:1");
//! ```

mod epoch;
mod error;
pub mod graph;
mod rpc;

pub use epoch::{InstanceRef, RpcInstance};
pub use error::GraphError;
pub use graph::DataflowGraph;
pub use rpc::{InterfaceType, ModelName, ModelRpc, Rpc};
