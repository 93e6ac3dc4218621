// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Grouped memory accounting for placements whose meshes overlap.
//!
//! Placements that share devices share those devices' memory. Executions
//! are added one at a time; each joins the **first** existing group its
//! mesh overlaps (per [`OverlapRule`]) or starts a new group.
//!
//! Within a group, each model keeps the maximum resident (static) and the
//! maximum active memory seen across its executions, so two calls on the
//! same model share one copy of its parameters:
//!
//! ```text
//! group cost = Σ_model max_static(model) + max_model max_active(model)
//! total      = Σ_group group cost
//! ```
//!
//! Only one call runs at a time on a device, hence the max over active
//! memory. Groups are never merged after the fact: an execution that
//! overlaps two existing groups joins only the first one, which can
//! under-count memory relative to a full transitive closure.

use device_mesh::{is_all_overlap, is_any_overlap, DeviceMesh};
use rpc_graph::ModelName;
use std::collections::BTreeMap;

/// Anything with a placement and a memory footprint.
pub trait MemoryFootprint {
    fn device_mesh(&self) -> &DeviceMesh;
    fn model_name(&self) -> &ModelName;
    /// Peak per-device memory, bytes.
    fn mem(&self) -> u64;
    /// Resident part of [`mem`](Self::mem), bytes.
    fn static_mem(&self) -> u64;

    fn active_mem(&self) -> u64 {
        self.mem().saturating_sub(self.static_mem())
    }
}

/// When an execution joins an existing group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapRule {
    /// Its mesh overlaps at least one member's mesh.
    #[default]
    Any,
    /// Its mesh overlaps every member's mesh.
    All,
}

impl OverlapRule {
    fn joins(&self, members: &[&DeviceMesh], candidate: &DeviceMesh) -> bool {
        match self {
            Self::Any => is_any_overlap(members, candidate),
            Self::All => is_all_overlap(members, candidate),
        }
    }
}

/// Per-model maxima inside one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelMemory {
    pub static_mem: u64,
    pub active_mem: u64,
}

/// Executions whose meshes overlap.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGroup {
    meshes: Vec<DeviceMesh>,
    models: BTreeMap<ModelName, ModelMemory>,
    mem_cost: u64,
}

impl ExecutionGroup {
    fn seed(mesh: &DeviceMesh, model: &ModelName, entry: ModelMemory) -> Self {
        let mut group = Self::default();
        group.meshes.push(mesh.clone());
        group.models.insert(model.clone(), entry);
        group.recompute();
        group
    }

    fn absorb(&mut self, mesh: &DeviceMesh, model: &ModelName, entry: ModelMemory) {
        if !self.meshes.contains(mesh) {
            self.meshes.push(mesh.clone());
        }
        self.models
            .entry(model.clone())
            .and_modify(|m| {
                m.static_mem = m.static_mem.max(entry.static_mem);
                m.active_mem = m.active_mem.max(entry.active_mem);
            })
            .or_insert(entry);
        self.recompute();
    }

    fn recompute(&mut self) {
        let statics: u64 = self.models.values().map(|m| m.static_mem).sum();
        let peak_active = self.models.values().map(|m| m.active_mem).max().unwrap_or(0);
        self.mem_cost = statics + peak_active;
    }

    /// Distinct member meshes in join order.
    pub fn meshes(&self) -> &[DeviceMesh] {
        &self.meshes
    }

    pub fn models(&self) -> &BTreeMap<ModelName, ModelMemory> {
        &self.models
    }

    /// Σ per-model static maxima + max per-model active maximum.
    pub fn mem_cost(&self) -> u64 {
        self.mem_cost
    }
}

/// The group partition of a set of accepted executions.
#[derive(Debug, Clone, Default)]
pub struct GroupedRpcExecutions {
    rule: OverlapRule,
    groups: Vec<ExecutionGroup>,
}

impl GroupedRpcExecutions {
    pub fn new(rule: OverlapRule) -> Self {
        Self {
            rule,
            groups: Vec::new(),
        }
    }

    /// Adds an execution and returns the index of the group it landed in.
    pub fn add<E: MemoryFootprint + ?Sized>(&mut self, execution: &E) -> usize {
        let mesh = execution.device_mesh();
        let entry = ModelMemory {
            static_mem: execution.static_mem(),
            active_mem: execution.active_mem(),
        };

        let joined = self.groups.iter().position(|g| {
            let members: Vec<&DeviceMesh> = g.meshes.iter().collect();
            self.rule.joins(&members, mesh)
        });

        match joined {
            Some(i) => {
                self.groups[i].absorb(mesh, execution.model_name(), entry);
                i
            }
            None => {
                self.groups
                    .push(ExecutionGroup::seed(mesh, execution.model_name(), entry));
                self.groups.len() - 1
            }
        }
    }

    /// Sum of all group costs.
    pub fn total_mem_cost(&self) -> u64 {
        self.groups.iter().map(ExecutionGroup::mem_cost).sum()
    }

    pub fn groups(&self) -> &[ExecutionGroup] {
        &self.groups
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn rule(&self) -> OverlapRule {
        self.rule
    }

    /// Discards all groups, keeping the rule.
    pub fn clear(&mut self) {
        self.groups.clear();
    }
}
