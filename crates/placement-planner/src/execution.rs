// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! One priced placement of one call.

use device_mesh::{DeviceMesh, ParallelStrategy};
use memory_accounting::MemoryFootprint;
use rpc_graph::{ModelName, Rpc};
use std::fmt;
use std::hash::{Hash, Hasher};

const GIB: f64 = (1u64 << 30) as f64;

/// A call placed on a sub-mesh with a parallel strategy, plus its costs.
///
/// Identity is `(rpc_name, device_mesh, parallel_strategy)`: costs are
/// derived data and do not take part in equality or hashing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RpcExecution {
    pub rpc: Rpc,
    pub device_mesh: DeviceMesh,
    pub parallel_strategy: ParallelStrategy,
    /// Nanoseconds.
    pub time_cost: u64,
    /// Peak per-device bytes.
    pub mem: u64,
    /// Resident per-device bytes.
    pub static_mem: u64,
}

impl RpcExecution {
    pub fn rpc_name(&self) -> &str {
        &self.rpc.rpc_name
    }

    /// Peak memory beyond the resident part.
    pub fn active_mem(&self) -> u64 {
        self.mem.saturating_sub(self.static_mem)
    }
}

impl PartialEq for RpcExecution {
    fn eq(&self, other: &Self) -> bool {
        self.rpc.rpc_name == other.rpc.rpc_name
            && self.device_mesh == other.device_mesh
            && self.parallel_strategy == other.parallel_strategy
    }
}

impl Eq for RpcExecution {}

impl Hash for RpcExecution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rpc.rpc_name.hash(state);
        self.device_mesh.hash(state);
        self.parallel_strategy.hash(state);
    }
}

impl MemoryFootprint for RpcExecution {
    fn device_mesh(&self) -> &DeviceMesh {
        &self.device_mesh
    }

    fn model_name(&self) -> &ModelName {
        &self.rpc.model_name
    }

    fn mem(&self) -> u64 {
        self.mem
    }

    fn static_mem(&self) -> u64 {
        self.static_mem
    }
}

impl fmt::Display for RpcExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} {}: {:.3} ms, {:.2} GiB ({:.2} GiB static)",
            self.rpc.rpc_name,
            self.device_mesh,
            self.parallel_strategy,
            self.time_cost as f64 / 1e6,
            self.mem as f64 / GIB,
            self.static_mem as f64 / GIB,
        )
    }
}
