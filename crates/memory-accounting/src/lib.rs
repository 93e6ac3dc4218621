// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-accounting
//!
//! Memory bookkeeping for placement search.
//!
//! - [`MemoryBudget`]: a per-device ceiling with human-readable parsing
//!   (`"80G"`, `"40GiB"`, ...).
//! - [`GroupedRpcExecutions`]: partitions placed executions into groups of
//!   overlapping device meshes and prices each group as shared memory.
//! - [`MemoryFootprint`]: what an execution must expose to be grouped.
//!
//! # Example
//! ```
//! use device_mesh::DeviceMesh;
//! use memory_accounting::{GroupedRpcExecutions, MemoryFootprint, OverlapRule};
//! use rpc_graph::ModelName;
//!
//! struct Placed(DeviceMesh, ModelName, u64, u64);
//!
//! impl MemoryFootprint for Placed {
//!     fn device_mesh(&self) -> &DeviceMesh { &self.0 }
//!     fn model_name(&self) -> &ModelName { &self.1 }
//!     fn mem(&self) -> u64 { self.2 }
//!     fn static_mem(&self) -> u64 { self.3 }
//! }
//!
//! let gen = Placed(DeviceMesh::parse("node01", 8).unwrap(), ModelName::new("actor", 0), 50, 14);
//! let train = Placed(DeviceMesh::parse("node01", 8).unwrap(), ModelName::new("actor", 0), 40, 30);
//!
//! let mut grouped = GroupedRpcExecutions::new(OverlapRule::Any);
//! grouped.add(&gen);
//! grouped.add(&train);
//! // One copy of the actor: max static 30 + max active 36.
//! assert_eq!(grouped.total_mem_cost(), 66);
//! ```

mod budget;
mod error;
mod grouped;

pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use grouped::{ExecutionGroup, GroupedRpcExecutions, MemoryFootprint, ModelMemory, OverlapRule};
