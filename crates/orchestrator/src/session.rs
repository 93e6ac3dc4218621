// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Planning session with a type-state–enforced pipeline.
//!
//! ```text
//! PlanningSession<Idle>
//!     │  .enumerate()
//!     ▼
//! PlanningSession<Enumerated>
//!     │  .search() / .plan() / .epoch_graph()
//!     ▼
//!   SearchReport / PlacementPlan / Vec<RpcInstance>
//! ```
//!
//! Each state transition consumes the old value and returns a new one,
//! so searching before enumeration is a compile error.

use crate::{OrchestratorError, PlannerConfig, PlanningMetrics};
use cost_model::{AnalyticEstimator, CostEstimator, ModelConfigRegistry};
use device_mesh::DeviceMesh;
use placement_planner::{CandidateTable, PlacementPlan, SearchConfig, SearchReport};
use rpc_graph::{graph::Validated, DataflowGraph, RpcInstance};
use std::time::Instant;

// ── Type-state markers ─────────────────────────────────────────

/// Session is configured; no candidates yet.
#[derive(Debug)]
pub struct Idle;

/// Candidates are enumerated and the session can search.
#[derive(Debug)]
pub struct Enumerated;

/// Sealed trait for session states.
pub trait SessionState: std::fmt::Debug {}
impl SessionState for Idle {}
impl SessionState for Enumerated {}

// ── Session ────────────────────────────────────────────────────

/// One planning run over one cluster and one dataflow graph.
///
/// # Example
/// ```no_run
/// use orchestrator::{PlannerConfig, PlanningSession};
/// use std::path::Path;
///
/// # fn example() -> Result<(), orchestrator::OrchestratorError> {
/// let config = PlannerConfig::from_file(Path::new("ppo.toml"))?;
/// let mut session = PlanningSession::new(config)?.enumerate()?;
/// let plan = session.plan()?;
/// println!("{}", plan.summary());
/// println!("{}", session.metrics().summary());
/// # Ok(())
/// # }
/// ```
pub struct PlanningSession<S: SessionState = Idle> {
    config: PlannerConfig,
    mesh: DeviceMesh,
    graph: DataflowGraph<Validated>,
    registry: ModelConfigRegistry,
    estimator: Box<dyn CostEstimator>,
    search_config: SearchConfig,
    table: Option<CandidateTable>,
    metrics: PlanningMetrics,
    _state: std::marker::PhantomData<S>,
}

// ── Idle → Enumerated ──────────────────────────────────────────

impl PlanningSession<Idle> {
    /// Creates a session from the given configuration.
    ///
    /// Parses the mesh and memory cap, loads model configs and validates
    /// the dataflow graph. The analytic estimator is used unless replaced
    /// with [`with_estimator`](Self::with_estimator).
    pub fn new(config: PlannerConfig) -> Result<Self, OrchestratorError> {
        let mesh = config.parse_mesh()?;
        let search_config = config.search_config()?;
        let registry = config.build_registry()?;
        let graph = config.build_graph()?;
        tracing::info!("cluster {mesh}: {} devices", mesh.device_count());
        tracing::info!("{}", graph.summary());

        let estimator = Box::new(AnalyticEstimator::new(config.resolve_gpu()));
        Ok(Self {
            config,
            mesh,
            graph,
            registry,
            estimator,
            search_config,
            table: None,
            metrics: PlanningMetrics::new(),
            _state: std::marker::PhantomData,
        })
    }

    /// Replaces the cost estimator.
    pub fn with_estimator(mut self, estimator: impl CostEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    /// Enumerates candidates for every call.
    /// Transitions to the `Enumerated` state.
    pub fn enumerate(mut self) -> Result<PlanningSession<Enumerated>, OrchestratorError> {
        let enumeration = self.config.enumeration_config()?;
        let start = Instant::now();
        let table = CandidateTable::build(
            &self.graph,
            &self.registry,
            &self.mesh,
            self.estimator.as_ref(),
            &enumeration,
        )?;
        self.metrics.record_enumeration(&table, start.elapsed());
        tracing::info!(
            "enumerated {} candidates, {} assignments",
            self.metrics.total_candidates(),
            table.search_space()
        );

        Ok(PlanningSession {
            config: self.config,
            mesh: self.mesh,
            graph: self.graph,
            registry: self.registry,
            estimator: self.estimator,
            search_config: self.search_config,
            table: Some(table),
            metrics: self.metrics,
            _state: std::marker::PhantomData,
        })
    }
}

// ── Enumerated: search ─────────────────────────────────────────

impl PlanningSession<Enumerated> {
    /// Returns the sorted candidate table.
    pub fn table(&self) -> &CandidateTable {
        self.table
            .as_ref()
            .expect("table exists in Enumerated state")
    }

    /// Runs the search and returns its full report.
    pub fn search(&mut self) -> Result<SearchReport, OrchestratorError> {
        let start = Instant::now();
        let report = placement_planner::search(self.table(), &self.search_config)?;
        self.metrics.record_search(&report, start.elapsed());
        Ok(report)
    }

    /// Runs the search and returns the fastest feasible plan.
    pub fn plan(&mut self) -> Result<PlacementPlan, OrchestratorError> {
        let report = self.search()?;
        let plan = PlacementPlan::from_report(report, &self.search_config)?;
        tracing::info!("{}", plan.summary());
        Ok(plan)
    }
}

// ── Any state ──────────────────────────────────────────────────

impl<S: SessionState> PlanningSession<S> {
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn mesh(&self) -> &DeviceMesh {
        &self.mesh
    }

    pub fn graph(&self) -> &DataflowGraph<Validated> {
        &self.graph
    }

    pub fn registry(&self) -> &ModelConfigRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &PlanningMetrics {
        &self.metrics
    }

    /// Expands the graph over `num_epoch` iterations linked every
    /// `epoch_dependency_interval` epochs.
    pub fn epoch_graph(&self) -> Result<Vec<RpcInstance>, OrchestratorError> {
        Ok(self
            .graph
            .expand_epochs(self.config.num_epoch, self.config.epoch_dependency_interval)?)
    }
}

impl<S: SessionState> std::fmt::Debug for PlanningSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningSession")
            .field("state", &std::any::type_name::<S>())
            .field("mesh", &self.mesh.to_string())
            .field("rpcs", &self.graph.num_rpcs())
            .field("has_table", &self.table.is_some())
            .finish()
    }
}
