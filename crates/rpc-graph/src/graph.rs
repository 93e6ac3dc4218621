// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dataflow graph: the model calls of one training iteration as a DAG.
//!
//! # Type-State Pattern
//!
//! ```text
//! DataflowGraph<Loaded>    : calls as declared, edges not checked.
//!       │  .validate()
//!       ▼
//! DataflowGraph<Validated> : edges complete, symmetric and acyclic.
//! ```
//!
//! Edges come from two places: the explicit `parents` / `children` lists
//! on each [`ModelRpc`], and data keys (a call producing a key is a parent
//! of every call consuming it). Validation merges both and makes every
//! edge appear on both of its endpoints, ordered by declaration.

use crate::{GraphError, ModelRpc};
use std::collections::{HashMap, VecDeque};
use std::fmt;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: calls loaded, edges not yet checked.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph checked and ready for planning.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── DataflowGraph ──────────────────────────────────────────────────

/// The single-epoch call graph.
#[derive(Debug, Clone)]
pub struct DataflowGraph<S: GraphState = Loaded> {
    rpcs: Vec<ModelRpc>,
    /// Indices into `rpcs` in topological order (empty until validated).
    topo: Vec<usize>,
    _state: std::marker::PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl DataflowGraph<Loaded> {
    /// Creates a new graph in the `Loaded` state.
    pub fn new(rpcs: Vec<ModelRpc>) -> Self {
        Self {
            rpcs,
            topo: Vec::new(),
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - The graph is non-empty and call names are unique.
    /// - Every call has `min_n_seqs > 0` and `max_n_tokens >= min_n_seqs`.
    /// - Explicit edges name existing calls and never point at themselves.
    /// - The merged edge set is acyclic.
    pub fn validate(mut self) -> Result<DataflowGraph<Validated>, GraphError> {
        if self.rpcs.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        let mut index = HashMap::with_capacity(self.rpcs.len());
        for (i, rpc) in self.rpcs.iter().enumerate() {
            if index.insert(rpc.name.clone(), i).is_some() {
                return Err(GraphError::DuplicateRpc(rpc.name.clone()));
            }
            if rpc.min_n_seqs == 0 {
                return Err(GraphError::InvalidRpc {
                    rpc: rpc.name.clone(),
                    detail: "min_n_seqs must be positive".into(),
                });
            }
            if rpc.max_n_tokens < rpc.min_n_seqs {
                return Err(GraphError::InvalidRpc {
                    rpc: rpc.name.clone(),
                    detail: format!(
                        "max_n_tokens ({}) is smaller than min_n_seqs ({})",
                        rpc.max_n_tokens, rpc.min_n_seqs
                    ),
                });
            }
        }

        let n = self.rpcs.len();
        // edges[p][c] == true  <=>  p is a parent of c.
        let mut edges = vec![vec![false; n]; n];

        for (i, rpc) in self.rpcs.iter().enumerate() {
            for (targets, upstream) in [(&rpc.parents, true), (&rpc.children, false)] {
                for target in targets {
                    let j = *index.get(target).ok_or_else(|| GraphError::DanglingEdge {
                        rpc: rpc.name.clone(),
                        target: target.clone(),
                    })?;
                    if j == i {
                        return Err(GraphError::InvalidRpc {
                            rpc: rpc.name.clone(),
                            detail: "call lists itself as a neighbour".into(),
                        });
                    }
                    if upstream {
                        edges[j][i] = true;
                    } else {
                        edges[i][j] = true;
                    }
                }
            }
        }

        // Key-derived edges.
        for (c, consumer) in self.rpcs.iter().enumerate() {
            for key in &consumer.input_keys {
                let mut produced = false;
                for (p, producer) in self.rpcs.iter().enumerate() {
                    if p != c && producer.output_keys.contains(key) {
                        edges[p][c] = true;
                        produced = true;
                    }
                }
                if !produced {
                    tracing::debug!(
                        "input key '{}' of '{}' is not produced by any call",
                        key,
                        consumer.name
                    );
                }
            }
        }

        let names: Vec<String> = self.rpcs.iter().map(|r| r.name.clone()).collect();
        for (i, rpc) in self.rpcs.iter_mut().enumerate() {
            rpc.parents = (0..n).filter(|&p| edges[p][i]).map(|p| names[p].clone()).collect();
            rpc.children = (0..n).filter(|&c| edges[i][c]).map(|c| names[c].clone()).collect();
        }

        let topo = topological_sort(&edges);
        if topo.len() != n {
            let mut stuck: Vec<String> = (0..n)
                .filter(|i| !topo.contains(i))
                .map(|i| self.rpcs[i].name.clone())
                .collect();
            stuck.sort();
            return Err(GraphError::Cycle(stuck));
        }

        tracing::info!(
            "dataflow graph validated: {} calls, {} edges",
            n,
            edges.iter().flatten().filter(|e| **e).count()
        );

        Ok(DataflowGraph {
            rpcs: self.rpcs,
            topo,
            _state: std::marker::PhantomData,
        })
    }
}

/// Kahn's algorithm; ties are broken by declaration order.
fn topological_sort(edges: &[Vec<bool>]) -> Vec<usize> {
    let n = edges.len();
    let mut in_degree: Vec<usize> = (0..n)
        .map(|c| (0..n).filter(|&p| edges[p][c]).count())
        .collect();
    let mut ready: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(p) = ready.pop_front() {
        order.push(p);
        for c in 0..n {
            if edges[p][c] {
                in_degree[c] -= 1;
                if in_degree[c] == 0 {
                    ready.push_back(c);
                }
            }
        }
    }
    order
}

// ── Validated state ────────────────────────────────────────────────

impl DataflowGraph<Validated> {
    /// Returns the number of calls.
    pub fn num_rpcs(&self) -> usize {
        self.rpcs.len()
    }

    /// Returns the calls in declaration order.
    pub fn rpcs(&self) -> &[ModelRpc] {
        &self.rpcs
    }

    /// Looks up a call by name.
    pub fn rpc(&self, name: &str) -> Option<&ModelRpc> {
        self.rpcs.iter().find(|r| r.name == name)
    }

    /// Calls with no parents in the epoch, in declaration order.
    pub fn sources(&self) -> impl Iterator<Item = &ModelRpc> {
        self.rpcs.iter().filter(|r| r.is_source())
    }

    /// Calls with no children in the epoch, in declaration order.
    pub fn sinks(&self) -> impl Iterator<Item = &ModelRpc> {
        self.rpcs.iter().filter(|r| r.is_sink())
    }

    /// Returns the calls in a dependency-respecting order.
    pub fn topological_order(&self) -> impl Iterator<Item = &ModelRpc> {
        self.topo.iter().map(|&i| &self.rpcs[i])
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        format!(
            "Dataflow graph: {} calls, sources [{}], sinks [{}]",
            self.num_rpcs(),
            join_names(self.sources()),
            join_names(self.sinks()),
        )
    }
}

fn join_names<'a>(rpcs: impl Iterator<Item = &'a ModelRpc>) -> String {
    rpcs.map(|r| r.name.as_str()).collect::<Vec<_>>().join(", ")
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> fmt::Display for DataflowGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DataflowGraph ({} calls):", self.rpcs.len())?;
        for rpc in &self.rpcs {
            writeln!(f, "  {}", rpc.summary())?;
        }
        Ok(())
    }
}
