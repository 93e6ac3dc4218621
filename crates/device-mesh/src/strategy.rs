// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Parallel strategies and their enumeration.
//!
//! A [`ParallelStrategy`] splits a mesh's devices three ways:
//!
//! ```text
//! device_count = num_dp × num_pp × num_mp
//! ```
//!
//! Legality depends only on the mesh shape:
//! - `num_mp` is a power of two dividing the GPUs-per-node of the mesh, so
//!   tensor-parallel groups never straddle nodes.
//! - One pipeline stage holds `num_dp × num_mp` devices; a stage must either
//!   tile a node evenly or cover whole nodes.
//!
//! RPC-specific filtering (batch size, fan-out limits) happens in the
//! placement planner, not here.

use crate::{DeviceMesh, MeshError};
use std::fmt;

/// A `(data, pipeline, tensor-model)` parallel degree triple.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ParallelStrategy {
    pub num_dp: usize,
    pub num_pp: usize,
    pub num_mp: usize,
}

impl ParallelStrategy {
    /// Creates a strategy; every degree must be at least 1.
    pub fn new(num_dp: usize, num_pp: usize, num_mp: usize) -> Result<Self, MeshError> {
        if num_dp == 0 || num_pp == 0 || num_mp == 0 {
            return Err(MeshError::InvalidStrategy(format!(
                "degrees must be >= 1, got dp={num_dp} pp={num_pp} mp={num_mp}"
            )));
        }
        Ok(Self {
            num_dp,
            num_pp,
            num_mp,
        })
    }

    /// Total devices the strategy occupies.
    pub fn world_size(&self) -> usize {
        self.num_dp * self.num_pp * self.num_mp
    }

    /// Devices in one pipeline stage.
    pub fn stage_size(&self) -> usize {
        self.num_dp * self.num_mp
    }
}

impl fmt::Display for ParallelStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(dp={}, pp={}, mp={})",
            self.num_dp, self.num_pp, self.num_mp
        )
    }
}

/// Returns every legal strategy for `mesh`, ordered by ascending
/// `num_mp`, then ascending `num_pp`.
pub fn find_parallel_strategies(mesh: &DeviceMesh) -> Vec<ParallelStrategy> {
    let n = mesh.device_count();
    let width = mesh.gpus_per_mesh_node();
    let mut out = Vec::new();

    let mut num_mp = 1;
    while num_mp <= width && width % num_mp == 0 {
        let rest = n / num_mp;
        for num_pp in (1..=rest).filter(|pp| rest % pp == 0) {
            let s = ParallelStrategy {
                num_dp: rest / num_pp,
                num_pp,
                num_mp,
            };
            let stage = s.stage_size();
            if width % stage == 0 || stage % width == 0 {
                out.push(s);
            }
        }
        num_mp *= 2;
    }

    out
}
