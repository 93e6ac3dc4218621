// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The estimator contract the planner consumes.
//!
//! Implementations must be deterministic: the planner sorts candidates by
//! the returned time cost and relies on identical inputs producing identical
//! orderings across runs.

use crate::{CostError, ModelConfig};
use device_mesh::{DeviceMesh, ParallelStrategy};
use rpc_graph::Rpc;

/// Everything an estimator may look at for one placement.
#[derive(Debug, Clone, Copy)]
pub struct CostQuery<'a> {
    pub rpc: &'a Rpc,
    pub model: &'a ModelConfig,
    pub mesh: &'a DeviceMesh,
    pub strategy: ParallelStrategy,
    /// Sequences per call.
    pub batch_size: usize,
    /// Prompt (or full sample) length per sequence.
    pub seq_len: usize,
    /// PPO mini-batches per train step.
    pub n_ppo_minibatches: usize,
    /// Tokens generated per sequence by generate calls.
    pub gen_len: usize,
    /// Parameters live in host memory between calls.
    pub offload: bool,
}

impl CostQuery<'_> {
    /// Rejects queries no estimator can answer.
    pub fn check(&self) -> Result<(), CostError> {
        if self.strategy.world_size() != self.mesh.device_count() {
            return Err(CostError::InvalidQuery(format!(
                "strategy {} needs {} devices but mesh {} has {}",
                self.strategy,
                self.strategy.world_size(),
                self.mesh,
                self.mesh.device_count()
            )));
        }
        if self.batch_size == 0 || self.seq_len == 0 {
            return Err(CostError::InvalidQuery(format!(
                "empty workload for '{}' (batch {}, seq_len {})",
                self.rpc.rpc_name, self.batch_size, self.seq_len
            )));
        }
        if self.rpc.interface_type.is_training() && self.n_ppo_minibatches == 0 {
            return Err(CostError::InvalidQuery(
                "train steps need at least one mini-batch".into(),
            ));
        }
        Ok(())
    }
}

/// Per-device memory of one placement, bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct MemoryCost {
    /// Peak footprint.
    pub mem: u64,
    /// Resident part: parameters, gradients, optimizer state.
    pub static_mem: u64,
}

impl MemoryCost {
    /// Peak memory beyond the resident part.
    pub fn active(&self) -> u64 {
        self.mem.saturating_sub(self.static_mem)
    }

    /// Multiplies both parts by a safety factor.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            mem: (self.mem as f64 * factor) as u64,
            static_mem: (self.static_mem as f64 * factor) as u64,
        }
    }
}

/// Estimates the time and memory of placing a call.
pub trait CostEstimator {
    /// Per-device memory footprint.
    fn estimate_memory(&self, query: &CostQuery<'_>) -> Result<MemoryCost, CostError>;

    /// Wall-clock time of one call, nanoseconds.
    fn estimate_time(&self, query: &CostQuery<'_>) -> Result<u64, CostError>;
}

impl<E: CostEstimator + ?Sized> CostEstimator for &E {
    fn estimate_memory(&self, query: &CostQuery<'_>) -> Result<MemoryCost, CostError> {
        (**self).estimate_memory(query)
    }

    fn estimate_time(&self, query: &CostQuery<'_>) -> Result<u64, CostError> {
        (**self).estimate_time(query)
    }
}
