// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Closed-form time and memory estimates from model dimensions.
//!
//! # Memory (per device)
//!
//! | Call | Static | Active |
//! |---|---|---|
//! | generate | bf16 weights | KV cache + prefill buffers + last-token logits |
//! | inference | bf16 weights | two hidden buffers + fp32 logits |
//! | train step | bf16 weights + grads, fp32 Adam state sharded over DP | stored activations of one mini-batch + fp32 logits |
//!
//! Offloaded models keep nothing resident: their weights move into the
//! active part.
//!
//! # Time
//!
//! Compute is `FLOPs / (devices × peak × MFU)` inflated by the pipeline
//! bubble. Tensor-parallel all-reduces, data-parallel gradient all-reduces
//! and pipeline point-to-point transfers are ring-modelled over NVLink inside
//! a node and InfiniBand across nodes. Decoding is memory-bound: every token
//! streams the device's weights and KV cache from HBM.

use crate::{CostError, CostEstimator, CostQuery, GpuSpec, MemoryCost};
use rpc_graph::InterfaceType;

/// Bytes per activation element per layer during training (bf16, with
/// attention recomputation disabled).
const TRAIN_ACT_BYTES_PER_HIDDEN: f64 = 34.0;

/// Micro-batches per pipeline stage in one mini-batch.
const MICRO_BATCHES_PER_STAGE: f64 = 2.0;

/// Deterministic estimator driven only by model dimensions and [`GpuSpec`].
#[derive(Debug, Clone, Default)]
pub struct AnalyticEstimator {
    gpu: GpuSpec,
}

/// Quantities shared by the memory and time models.
struct Workload {
    params: f64,
    layers: f64,
    hidden: f64,
    kv_width: f64,
    head_width: f64,
    dp: f64,
    pp: f64,
    mp: f64,
    batch: f64,
    seq_len: f64,
    gen_len: f64,
    minibatches: f64,
    multi_node: bool,
}

impl Workload {
    fn new(q: &CostQuery<'_>) -> Self {
        Self {
            params: q.model.param_count() as f64,
            layers: q.model.n_layers as f64,
            hidden: q.model.hidden_dim as f64,
            kv_width: (q.model.kv_heads() * q.model.head_dim()) as f64,
            head_width: q.model.head_width() as f64,
            dp: q.strategy.num_dp as f64,
            pp: q.strategy.num_pp as f64,
            mp: q.strategy.num_mp as f64,
            batch: q.batch_size as f64,
            seq_len: q.seq_len as f64,
            gen_len: q.gen_len as f64,
            minibatches: q.n_ppo_minibatches.max(1) as f64,
            multi_node: q.mesh.node_count() > 1,
        }
    }

    /// Parameters held by one device.
    fn shard_params(&self) -> f64 {
        self.params / (self.pp * self.mp)
    }

    fn layers_per_stage(&self) -> f64 {
        (self.layers / self.pp).ceil()
    }

    /// Tokens one data-parallel replica processes per call.
    fn replica_tokens(&self) -> f64 {
        self.batch * self.seq_len / self.dp
    }

    fn world(&self) -> f64 {
        self.dp * self.pp * self.mp
    }

    fn forward_flops_per_token(&self) -> f64 {
        2.0 * self.params + 4.0 * self.layers * self.hidden * self.seq_len
    }

    fn bubble(&self) -> f64 {
        1.0 + (self.pp - 1.0) / (self.pp * MICRO_BATCHES_PER_STAGE)
    }
}

impl AnalyticEstimator {
    pub fn new(gpu: GpuSpec) -> Self {
        Self { gpu }
    }

    pub fn gpu(&self) -> &GpuSpec {
        &self.gpu
    }

    fn cross_node_gbps(&self, w: &Workload) -> f64 {
        if w.multi_node {
            self.gpu.inter_node_gbps
        } else {
            self.gpu.intra_node_gbps
        }
    }

    /// Ring all-reduce of `bytes` over `n` ranks, seconds.
    fn all_reduce(&self, bytes: f64, n: f64, gbps: f64) -> f64 {
        if n <= 1.0 {
            return 0.0;
        }
        2.0 * (n - 1.0) / n * bytes / (gbps * 1e9) + self.gpu.collective_latency_us * 1e-6
    }

    fn transfer(&self, bytes: f64, gbps: f64) -> f64 {
        bytes / (gbps * 1e9)
    }

    /// Forward pass over `tokens` per replica: compute, TP and PP traffic.
    fn forward_seconds(&self, w: &Workload, tokens: f64, passes: f64) -> f64 {
        let compute = passes * w.forward_flops_per_token() * tokens * w.dp
            / (w.world() * self.gpu.effective_flops())
            * w.bubble();
        let act_bytes = tokens * w.hidden * 2.0;
        let tp = passes
            * 2.0
            * w.layers_per_stage()
            * self.all_reduce(act_bytes, w.mp, self.gpu.intra_node_gbps);
        let pp = passes * (w.pp - 1.0) * self.transfer(act_bytes / w.mp, self.cross_node_gbps(w));
        compute + tp + pp
    }

    fn offload_seconds(&self, q: &CostQuery<'_>, w: &Workload) -> f64 {
        if q.offload {
            self.transfer(2.0 * w.shard_params(), self.gpu.host_gbps)
        } else {
            0.0
        }
    }
}

impl CostEstimator for AnalyticEstimator {
    fn estimate_memory(&self, q: &CostQuery<'_>) -> Result<MemoryCost, CostError> {
        q.check()?;
        let w = Workload::new(q);
        let weights = 2.0 * w.shard_params();

        let (resident, active) = match q.rpc.interface_type {
            InterfaceType::TrainStep => {
                let grads = 2.0 * w.shard_params();
                let adam = 12.0 * w.shard_params() / w.dp;
                let tokens = w.replica_tokens() / w.minibatches;
                let acts = tokens * w.hidden * TRAIN_ACT_BYTES_PER_HIDDEN * w.layers_per_stage()
                    / w.mp;
                let logits = tokens * w.head_width * 4.0 / w.mp;
                (weights + grads + adam, acts + logits)
            }
            InterfaceType::Inference => {
                let tokens = w.replica_tokens();
                let buffers = tokens * w.hidden * 2.0 * 2.0 / w.mp;
                let logits = tokens * w.head_width * 4.0 / w.mp;
                (weights, buffers + logits)
            }
            InterfaceType::Generate => {
                let seqs = w.batch / w.dp;
                let kv = 2.0
                    * w.layers_per_stage()
                    * seqs
                    * (w.seq_len + w.gen_len)
                    * w.kv_width
                    * 2.0
                    / w.mp;
                let prefill = w.replica_tokens() * w.hidden * 2.0 * 2.0 / w.mp;
                let logits = seqs * w.head_width * 4.0 / w.mp;
                (weights, kv + prefill + logits)
            }
        };

        let (static_mem, active) = if q.offload {
            (0.0, active + resident)
        } else {
            (resident, active)
        };

        Ok(MemoryCost {
            mem: (static_mem + active).ceil() as u64,
            static_mem: static_mem.ceil() as u64,
        })
    }

    fn estimate_time(&self, q: &CostQuery<'_>) -> Result<u64, CostError> {
        q.check()?;
        let w = Workload::new(q);

        let seconds = match q.rpc.interface_type {
            InterfaceType::TrainStep => {
                // Forward + backward = three forward passes worth of FLOPs.
                let compute = self.forward_seconds(&w, w.replica_tokens(), 3.0);
                let grad_sync = w.minibatches
                    * self.all_reduce(2.0 * w.shard_params(), w.dp, self.cross_node_gbps(&w));
                let latency = w.minibatches
                    * 4.0
                    * w.layers_per_stage()
                    * if w.mp > 1.0 {
                        self.gpu.collective_latency_us * 1e-6
                    } else {
                        0.0
                    };
                compute + grad_sync + latency
            }
            InterfaceType::Inference => {
                self.forward_seconds(&w, w.replica_tokens(), 1.0) + self.offload_seconds(q, &w)
            }
            InterfaceType::Generate => {
                let prefill = self.forward_seconds(&w, w.replica_tokens(), 1.0);
                let seqs = w.batch / w.dp;
                let ctx = w.seq_len + w.gen_len / 2.0;
                let kv_bytes = 2.0 * w.layers * seqs * ctx * w.kv_width * 2.0 / w.mp;
                let streamed = 2.0 * w.params / w.mp + kv_bytes;
                let memory_bound = streamed / (self.gpu.hbm_gbps * 1e9);
                let compute_bound = 2.0 * w.params * seqs / (w.mp * self.gpu.effective_flops());
                let tp = if w.mp > 1.0 {
                    2.0 * w.layers * self.gpu.collective_latency_us * 1e-6
                } else {
                    0.0
                };
                let pp = (w.pp - 1.0) * self.gpu.collective_latency_us * 1e-6;
                let step = memory_bound.max(compute_bound) + tp + pp;
                prefill + w.gen_len * step + self.offload_seconds(q, &w)
            }
        };

        Ok(((seconds * 1e9).round() as u64).max(1))
    }
}
