// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for cost estimation and model-config loading.

/// Errors that can occur when loading model configs or estimating costs.
#[derive(Debug, thiserror::Error)]
pub enum CostError {
    /// No config is registered for the requested model type.
    #[error("unknown model type '{0}'")]
    UnknownModelType(String),

    /// A model config is internally inconsistent.
    #[error("invalid config for model type '{model_type}': {detail}")]
    InvalidModelConfig { model_type: String, detail: String },

    /// The estimator was asked about an impossible placement.
    #[error("invalid cost query: {0}")]
    InvalidQuery(String),

    /// A config file could not be read.
    #[error("failed to read model config: {0}")]
    Io(#[from] std::io::Error),

    /// A config file is not valid JSON.
    #[error("failed to parse model config: {0}")]
    Json(#[from] serde_json::Error),
}
