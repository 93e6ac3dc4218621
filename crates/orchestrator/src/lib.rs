// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # orchestrator
//!
//! Ties the planner crates together behind a TOML configuration.
//!
//! The orchestrator takes:
//! - A cluster mesh name parsed by `device-mesh`.
//! - The calls of one PPO iteration, validated by `rpc-graph`.
//! - Model architecture configs and an estimator from `cost-model`.
//!
//! And produces a `PlacementPlan` from `placement-planner`, together with
//! timing and search metrics.
//!
//! # Type-State Pipeline
//! ```text
//! PlanningSession<Idle> → PlanningSession<Enumerated>
//! ```

mod config;
mod error;
mod metrics;
mod session;

pub use config::PlannerConfig;
pub use error::OrchestratorError;
pub use metrics::{PlanningMetrics, RpcMetrics};
pub use session::{Enumerated, Idle, PlanningSession, SessionState};
