// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Multi-epoch expansion of the dataflow graph.
//!
//! Each call is instantiated once per epoch. Within an epoch the edges are
//! those of the validated graph. Across epochs, every sink of epoch `e`
//! gates every source of epoch `e + interval`:
//!
//! ```text
//! epoch 0:  gen:0 ─▶ train:0 ─┐
//!                             ▼          (interval = 1)
//! epoch 1:            gen:1 ─▶ train:1 ─┐
//!                                       ▼
//! epoch 2:                      gen:2 ─▶ train:2
//! ```
//!
//! With `interval > 1`, up to `interval` epochs can be in flight at once.

use crate::graph::{DataflowGraph, Validated};
use crate::{GraphError, ModelRpc, Rpc};
use std::fmt;

/// A reference to one call in one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct InstanceRef {
    pub rpc: String,
    pub epoch_id: usize,
}

impl InstanceRef {
    pub fn new(rpc: &str, epoch_id: usize) -> Self {
        Self {
            rpc: rpc.to_string(),
            epoch_id,
        }
    }

    /// `"{rpc}:{epoch_id}"`.
    pub fn name(&self) -> String {
        format!("{}:{}", self.rpc, self.epoch_id)
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rpc, self.epoch_id)
    }
}

/// One call in one epoch, with its resolved neighbours.
///
/// Cross-epoch neighbours come first in `parents` / `children`, followed by
/// the intra-epoch ones in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RpcInstance {
    pub rpc: Rpc,
    pub epoch_id: usize,
    pub parents: Vec<InstanceRef>,
    pub children: Vec<InstanceRef>,
}

impl RpcInstance {
    /// `"{rpc}:{epoch_id}"`.
    pub fn name(&self) -> String {
        format!("{}:{}", self.rpc.rpc_name, self.epoch_id)
    }

    /// Returns a reference usable as another instance's neighbour.
    pub fn instance_ref(&self) -> InstanceRef {
        InstanceRef::new(&self.rpc.rpc_name, self.epoch_id)
    }

    pub fn parent_names(&self) -> Vec<String> {
        self.parents.iter().map(InstanceRef::name).collect()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children.iter().map(InstanceRef::name).collect()
    }
}

impl fmt::Display for RpcInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <- [{}] -> [{}]",
            self.name(),
            self.parent_names().join(", "),
            self.child_names().join(", ")
        )
    }
}

impl DataflowGraph<Validated> {
    /// Instantiates the graph `num_epoch` times and wires sinks of epoch
    /// `e` to sources of epoch `e + interval`.
    ///
    /// Instances are returned epoch-major, calls in declaration order
    /// within an epoch.
    ///
    /// # Errors
    /// [`GraphError::InvalidEpochConfig`] if `num_epoch` or `interval` is 0.
    pub fn expand_epochs(
        &self,
        num_epoch: usize,
        interval: usize,
    ) -> Result<Vec<RpcInstance>, GraphError> {
        if num_epoch == 0 {
            return Err(GraphError::InvalidEpochConfig(
                "num_epoch must be at least 1".into(),
            ));
        }
        if interval == 0 {
            return Err(GraphError::InvalidEpochConfig(
                "epoch_dependency_interval must be at least 1".into(),
            ));
        }

        let sources: Vec<&ModelRpc> = self.sources().collect();
        let sinks: Vec<&ModelRpc> = self.sinks().collect();
        let refs = |rpcs: &[&ModelRpc], epoch: usize| -> Vec<InstanceRef> {
            rpcs.iter().map(|r| InstanceRef::new(&r.name, epoch)).collect()
        };

        let mut out = Vec::with_capacity(num_epoch * self.num_rpcs());
        for epoch_id in 0..num_epoch {
            for rpc in self.rpcs() {
                let mut parents = Vec::new();
                if rpc.is_source() && epoch_id >= interval {
                    parents.extend(refs(&sinks, epoch_id - interval));
                }
                parents.extend(rpc.parents.iter().map(|p| InstanceRef::new(p, epoch_id)));

                let mut children = Vec::new();
                if rpc.is_sink() && epoch_id + interval < num_epoch {
                    children.extend(refs(&sources, epoch_id + interval));
                }
                children.extend(rpc.children.iter().map(|c| InstanceRef::new(c, epoch_id)));

                out.push(RpcInstance {
                    rpc: Rpc::from(rpc),
                    epoch_id,
                    parents,
                    children,
                });
            }
        }

        tracing::info!(
            "expanded {} calls over {} epochs (interval {}): {} instances",
            self.num_rpcs(),
            num_epoch,
            interval,
            out.len()
        );
        Ok(out)
    }
}
