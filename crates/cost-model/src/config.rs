// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model architecture configs and the registry that maps model types to
//! them.
//!
//! Configs are JSON and accept both the short field names used here and the
//! HuggingFace `config.json` names:
//!
//! ```json
//! {
//!   "num_hidden_layers": 32,
//!   "hidden_size": 4096,
//!   "intermediate_size": 11008,
//!   "num_attention_heads": 32,
//!   "num_key_value_heads": 32,
//!   "vocab_size": 32000
//! }
//! ```

use crate::CostError;
use std::collections::BTreeMap;
use std::path::Path;

/// Transformer dimensions the estimator needs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModelConfig {
    #[serde(alias = "num_hidden_layers")]
    pub n_layers: usize,
    #[serde(alias = "hidden_size")]
    pub hidden_dim: usize,
    #[serde(alias = "intermediate_size")]
    pub intermediate_dim: usize,
    #[serde(alias = "num_attention_heads")]
    pub n_q_heads: usize,
    /// Defaults to `n_q_heads` (no grouped-query attention).
    #[serde(default, alias = "num_key_value_heads")]
    pub n_kv_heads: Option<usize>,
    pub vocab_size: usize,
    #[serde(default, alias = "tie_word_embeddings")]
    pub tied_embedding: bool,
    /// Scalar value head instead of an LM head (critic / reward models).
    #[serde(default)]
    pub is_critic: bool,
}

impl ModelConfig {
    /// Checks the dimensions are non-zero and heads divide the hidden size.
    pub fn validate(&self, model_type: &str) -> Result<(), CostError> {
        let invalid = |detail: String| CostError::InvalidModelConfig {
            model_type: model_type.to_string(),
            detail,
        };
        if self.n_layers == 0 || self.hidden_dim == 0 || self.n_q_heads == 0 {
            return Err(invalid("layers, hidden size and heads must be positive".into()));
        }
        if self.vocab_size == 0 || self.intermediate_dim == 0 {
            return Err(invalid("vocab and intermediate size must be positive".into()));
        }
        if self.hidden_dim % self.n_q_heads != 0 {
            return Err(invalid(format!(
                "hidden size {} is not divisible by {} heads",
                self.hidden_dim, self.n_q_heads
            )));
        }
        let kv = self.kv_heads();
        if kv == 0 || self.n_q_heads % kv != 0 {
            return Err(invalid(format!(
                "{} query heads cannot be grouped over {kv} kv heads",
                self.n_q_heads
            )));
        }
        Ok(())
    }

    pub fn kv_heads(&self) -> usize {
        self.n_kv_heads.unwrap_or(self.n_q_heads)
    }

    pub fn head_dim(&self) -> usize {
        self.hidden_dim / self.n_q_heads
    }

    /// Output width of the final projection.
    pub fn head_width(&self) -> usize {
        if self.is_critic {
            1
        } else {
            self.vocab_size
        }
    }

    /// Parameters in one transformer block (GQA attention + SwiGLU MLP + norms).
    pub fn layer_params(&self) -> u64 {
        let h = self.hidden_dim as u64;
        let kv = (self.kv_heads() * self.head_dim()) as u64;
        let attn = 2 * h * h + 2 * h * kv;
        let mlp = 3 * h * self.intermediate_dim as u64;
        attn + mlp + 2 * h
    }

    /// Embedding plus output head.
    pub fn embedding_params(&self) -> u64 {
        let h = self.hidden_dim as u64;
        let embed = self.vocab_size as u64 * h;
        let head = if self.tied_embedding && !self.is_critic {
            0
        } else {
            self.head_width() as u64 * h
        };
        embed + head
    }

    /// Total parameter count.
    pub fn param_count(&self) -> u64 {
        self.n_layers as u64 * self.layer_params()
            + self.embedding_params()
            + self.hidden_dim as u64
    }
}

/// Model type → architecture config.
#[derive(Debug, Clone, Default)]
pub struct ModelConfigRegistry {
    configs: BTreeMap<String, ModelConfig>,
}

impl ModelConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a config after validating it. Replaces any previous entry.
    pub fn insert(&mut self, model_type: &str, config: ModelConfig) -> Result<(), CostError> {
        config.validate(model_type)?;
        if self.configs.insert(model_type.to_string(), config).is_some() {
            tracing::warn!("model type '{model_type}' registered twice, keeping the latest");
        }
        Ok(())
    }

    /// Looks up a config; unknown types are a configuration error.
    pub fn get(&self, model_type: &str) -> Result<&ModelConfig, CostError> {
        self.configs
            .get(model_type)
            .ok_or_else(|| CostError::UnknownModelType(model_type.to_string()))
    }

    pub fn contains(&self, model_type: &str) -> bool {
        self.configs.contains_key(model_type)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn model_types(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    /// Parses a JSON object `{ "<model type>": { ...config... }, ... }`.
    pub fn from_json(json: &str) -> Result<Self, CostError> {
        let raw: BTreeMap<String, ModelConfig> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (model_type, config) in raw {
            registry.insert(&model_type, config)?;
        }
        Ok(registry)
    }

    /// Loads every `*.json` file in `dir`, keyed by file stem.
    pub fn load_dir(dir: &Path) -> Result<Self, CostError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            let Some(model_type) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path)?;
            let config: ModelConfig = serde_json::from_str(&content)?;
            registry.insert(model_type, config)?;
        }

        tracing::info!(
            "loaded {} model configs from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }
}
