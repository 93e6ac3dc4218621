// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # cost-model
//!
//! Time and memory estimates for placing a model call on a device mesh.
//!
//! - [`CostEstimator`]: the contract the placement planner consumes.
//! - [`CostQuery`]: one placement: call, model, mesh, strategy, workload.
//! - [`MemoryCost`]: per-device peak and resident memory.
//! - [`ModelConfig`] / [`ModelConfigRegistry`]: architecture dimensions
//!   keyed by model type, loadable from JSON.
//! - [`AnalyticEstimator`]: a closed-form reference estimator over a
//!   [`GpuSpec`].
//!
//! Estimators are pure: identical queries yield identical answers.

mod analytic;
mod config;
mod error;
mod estimator;
mod hardware;

pub use analytic::AnalyticEstimator;
pub use config::{ModelConfig, ModelConfigRegistry};
pub use error::CostError;
pub use estimator::{CostEstimator, CostQuery, MemoryCost};
pub use hardware::GpuSpec;
