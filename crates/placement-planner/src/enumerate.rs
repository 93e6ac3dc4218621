// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Candidate enumeration: every legal, memory-feasible placement of a call.
//!
//! For each sub-mesh × strategy pair the enumerator applies, in order:
//!
//! 1. **Batch divisibility**: a train step needs at least two sequences
//!    per data/pipeline replica per PPO mini-batch
//!    (`batch >= 2·dp·pp·minibatches`); other calls need one
//!    (`batch >= dp·pp`).
//! 2. **Train fan-out**: train steps reject `mp·dp > 8`.
//! 3. **Pipeline depth**: reject `pp > max(nodes, 8)`, where `nodes` is
//!    the node count of the whole mesh being enumerated, not of the
//!    candidate sub-mesh.
//! 4. **Memory**: the estimate, scaled by `mem_index`, must stay strictly
//!    below the per-device cap.
//!
//! Survivors are priced with the estimator's time model.

use crate::{PlannerError, RpcExecution};
use cost_model::{CostEstimator, CostQuery, ModelConfig, ModelConfigRegistry};
use device_mesh::{find_parallel_strategies, find_sub_device_meshes, DeviceMesh, ParallelStrategy};
use memory_accounting::MemoryBudget;
use rpc_graph::{graph::Validated, DataflowGraph, InterfaceType, ModelRpc, Rpc};

/// Upper bound on `mp·dp` for train steps.
const MAX_TRAIN_FANOUT: usize = 8;

/// Floor of the pipeline-depth bound.
const MIN_PIPELINE_BOUND: usize = 8;

/// Global scalars that shape enumeration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnumerationConfig {
    /// Per-device memory ceiling.
    pub gpu_mem_cap: MemoryBudget,
    /// Safety factor applied to memory estimates.
    pub mem_index: f64,
    pub n_ppo_minibatches: usize,
    /// Tokens generated per sequence.
    pub num_gen_tokens: usize,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            gpu_mem_cap: MemoryBudget::from_gib(80),
            mem_index: 1.0,
            n_ppo_minibatches: 4,
            num_gen_tokens: 256,
        }
    }
}

impl EnumerationConfig {
    pub fn validate(&self) -> Result<(), PlannerError> {
        if !self.mem_index.is_finite() || self.mem_index <= 0.0 {
            return Err(PlannerError::InvalidConfig(format!(
                "mem_index must be positive, got {}",
                self.mem_index
            )));
        }
        if self.n_ppo_minibatches == 0 {
            return Err(PlannerError::InvalidConfig(
                "n_ppo_minibatches must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    BatchTooSmall,
    TrainFanout,
    PipelineTooDeep,
    OverMemory,
}

fn check_legality(
    rpc: &ModelRpc,
    s: &ParallelStrategy,
    pipeline_bound: usize,
    n_minibatches: usize,
) -> Option<Rejection> {
    let replicas = s.num_dp * s.num_pp;
    let min_batch = match rpc.interface_type {
        InterfaceType::TrainStep => 2 * replicas * n_minibatches,
        InterfaceType::Generate | InterfaceType::Inference => replicas,
    };
    if rpc.min_n_seqs < min_batch {
        return Some(Rejection::BatchTooSmall);
    }
    if rpc.interface_type == InterfaceType::TrainStep && s.num_mp * s.num_dp > MAX_TRAIN_FANOUT {
        return Some(Rejection::TrainFanout);
    }
    if s.num_pp > pipeline_bound {
        return Some(Rejection::PipelineTooDeep);
    }
    None
}

/// Returns every feasible placement of `rpc` on `device_mesh`, in
/// enumeration order (sub-mesh order, then strategy order).
///
/// Callers sort by time cost; see [`CandidateTable`].
pub fn enumerate_rpc_executions<E: CostEstimator + ?Sized>(
    rpc: &ModelRpc,
    model: &ModelConfig,
    device_mesh: &DeviceMesh,
    estimator: &E,
    config: &EnumerationConfig,
) -> Result<Vec<RpcExecution>, PlannerError> {
    config.validate()?;
    let identity = Rpc::from(rpc);
    let mut rejected = [0usize; 4];
    let mut feasible = Vec::new();
    let pipeline_bound = device_mesh.node_count().max(MIN_PIPELINE_BOUND);

    for sub_mesh in find_sub_device_meshes(device_mesh) {
        for strategy in find_parallel_strategies(&sub_mesh) {
            if let Some(reason) =
                check_legality(rpc, &strategy, pipeline_bound, config.n_ppo_minibatches)
            {
                rejected[reason as usize] += 1;
                continue;
            }

            let query = CostQuery {
                rpc: &identity,
                model,
                mesh: &sub_mesh,
                strategy,
                batch_size: rpc.min_n_seqs,
                seq_len: rpc.seq_len(),
                n_ppo_minibatches: config.n_ppo_minibatches,
                gen_len: config.num_gen_tokens,
                offload: rpc.model_name.is_offloaded(),
            };

            let memory = estimator.estimate_memory(&query)?.scaled(config.mem_index);
            if !config.gpu_mem_cap.fits(memory.mem) {
                rejected[Rejection::OverMemory as usize] += 1;
                continue;
            }

            let time_cost = estimator.estimate_time(&query)?;
            feasible.push(RpcExecution {
                rpc: identity.clone(),
                device_mesh: sub_mesh.clone(),
                parallel_strategy: strategy,
                time_cost,
                mem: memory.mem,
                static_mem: memory.static_mem,
            });
        }
    }

    tracing::debug!(
        "'{}': {} feasible; rejected batch={} fanout={} pipeline={} memory={}",
        rpc.name,
        feasible.len(),
        rejected[Rejection::BatchTooSmall as usize],
        rejected[Rejection::TrainFanout as usize],
        rejected[Rejection::PipelineTooDeep as usize],
        rejected[Rejection::OverMemory as usize],
    );
    Ok(feasible)
}

/// Sorted candidate lists for every call of a graph.
///
/// Rows follow the graph's declaration order; each row is sorted by
/// ascending time cost, ties keeping enumeration order.
#[derive(Debug, Clone)]
pub struct CandidateTable {
    rows: Vec<(Rpc, Vec<RpcExecution>)>,
}

impl CandidateTable {
    /// Enumerates and sorts candidates for every call in `graph`.
    ///
    /// # Errors
    /// - [`cost_model::CostError::UnknownModelType`] (wrapped) if a call's
    ///   model type is not registered.
    /// - [`PlannerError::NoCandidates`] if some call cannot be placed at all.
    pub fn build<E: CostEstimator + ?Sized>(
        graph: &DataflowGraph<Validated>,
        registry: &ModelConfigRegistry,
        device_mesh: &DeviceMesh,
        estimator: &E,
        config: &EnumerationConfig,
    ) -> Result<Self, PlannerError> {
        let mut rows = Vec::with_capacity(graph.num_rpcs());
        for rpc in graph.rpcs() {
            let model = registry.get(&rpc.model_type)?;
            let mut candidates =
                enumerate_rpc_executions(rpc, model, device_mesh, estimator, config)?;
            if candidates.is_empty() {
                return Err(PlannerError::NoCandidates {
                    rpc: rpc.name.clone(),
                    mesh: device_mesh.to_string(),
                    detail: format!(
                        "no sub-mesh and strategy keeps {} seqs under {}",
                        rpc.min_n_seqs, config.gpu_mem_cap
                    ),
                });
            }
            candidates.sort_by_key(|c| c.time_cost);
            tracing::info!(
                "'{}': {} candidates, fastest {}",
                rpc.name,
                candidates.len(),
                candidates[0]
            );
            rows.push((Rpc::from(rpc), candidates));
        }
        Self::from_rows(rows)
    }

    /// Builds a table from pre-computed rows, sorting each by time cost.
    pub fn from_rows(mut rows: Vec<(Rpc, Vec<RpcExecution>)>) -> Result<Self, PlannerError> {
        if rows.is_empty() {
            return Err(PlannerError::EmptyRpcSet);
        }
        for (rpc, candidates) in &mut rows {
            if candidates.is_empty() {
                return Err(PlannerError::NoCandidates {
                    rpc: rpc.rpc_name.clone(),
                    mesh: "<table>".into(),
                    detail: "empty candidate list".into(),
                });
            }
            candidates.sort_by_key(|c| c.time_cost);
        }
        Ok(Self { rows })
    }

    pub fn num_rpcs(&self) -> usize {
        self.rows.len()
    }

    pub fn rpc(&self, i: usize) -> &Rpc {
        &self.rows[i].0
    }

    pub fn candidates(&self, i: usize) -> &[RpcExecution] {
        &self.rows[i].1
    }

    /// Looks up a row by call name.
    pub fn candidates_for(&self, rpc_name: &str) -> Option<&[RpcExecution]> {
        self.rows
            .iter()
            .find(|(r, _)| r.rpc_name == rpc_name)
            .map(|(_, c)| c.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rpc, &[RpcExecution])> {
        self.rows.iter().map(|(r, c)| (r, c.as_slice()))
    }

    /// Candidate count per call, in row order.
    pub fn counts(&self) -> Vec<usize> {
        self.rows.iter().map(|(_, c)| c.len()).collect()
    }

    /// Size of the full assignment space.
    pub fn search_space(&self) -> u128 {
        self.rows.iter().map(|(_, c)| c.len() as u128).product()
    }
}
