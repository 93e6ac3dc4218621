// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Planner configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! device_mesh = "node[01-02]"
//! gpus_per_node = 8
//! gpu_mem_cap = "80G"
//! n_ppo_minibatches = 4
//! num_epoch = 5
//!
//! [models.llama-7b]
//! n_layers = 32
//! hidden_dim = 4096
//! intermediate_dim = 11008
//! n_q_heads = 32
//! vocab_size = 32000
//!
//! [[rpcs]]
//! name = "actor_gen"
//! model_name = "actor"
//! model_type = "llama-7b"
//! interface_type = "generate"
//! min_n_seqs = 128
//! max_n_tokens = 131072
//! output_keys = ["seq"]
//! ```

use crate::OrchestratorError;
use cost_model::{GpuSpec, ModelConfig, ModelConfigRegistry};
use device_mesh::DeviceMesh;
use memory_accounting::{MemoryBudget, OverlapRule};
use placement_planner::{EnumerationConfig, SearchConfig};
use rpc_graph::{graph::Validated, DataflowGraph, ModelRpc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration for a planning session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlannerConfig {
    /// Cluster mesh name, e.g. `"node[01-04]"`.
    pub device_mesh: String,
    pub gpus_per_node: usize,
    /// Per-device memory cap (human-readable, e.g. `"80G"`).
    pub gpu_mem_cap: String,
    /// Safety factor applied to every memory estimate.
    #[serde(default = "default_mem_index")]
    pub mem_index: f64,
    /// Slack over the cap tolerated by the search.
    #[serde(default = "default_search_mem_margin")]
    pub search_mem_margin: f64,
    #[serde(default = "default_max_search_iterations")]
    pub max_search_iterations: usize,
    #[serde(default = "default_priority_top_k")]
    pub priority_top_k: usize,
    #[serde(default = "default_n_ppo_minibatches")]
    pub n_ppo_minibatches: usize,
    #[serde(default = "default_num_gen_tokens")]
    pub num_gen_tokens: usize,
    #[serde(default = "default_num_epoch")]
    pub num_epoch: usize,
    #[serde(default = "default_epoch_dependency_interval")]
    pub epoch_dependency_interval: usize,
    #[serde(default)]
    pub overlap_rule: OverlapRule,
    /// Valid assignments to keep in the search report.
    #[serde(default)]
    pub record_valid_limit: usize,
    /// Directory of `<model type>.json` architecture configs.
    #[serde(default)]
    pub model_config_dir: Option<PathBuf>,
    /// Inline architecture configs; override files of the same type.
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
    /// Hardware for the analytic estimator (A100-80GB if absent).
    #[serde(default)]
    pub gpu: Option<GpuSpec>,
    /// The calls of one training iteration.
    #[serde(default)]
    pub rpcs: Vec<ModelRpc>,
}

fn default_mem_index() -> f64 {
    1.0
}

fn default_search_mem_margin() -> f64 {
    1.2
}

fn default_max_search_iterations() -> usize {
    200_000
}

fn default_priority_top_k() -> usize {
    10
}

fn default_n_ppo_minibatches() -> usize {
    4
}

fn default_num_gen_tokens() -> usize {
    256
}

fn default_num_epoch() -> usize {
    5
}

fn default_epoch_dependency_interval() -> usize {
    1
}

impl PlannerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, OrchestratorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::ConfigError(format!(
                "cannot read config '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, OrchestratorError> {
        toml::from_str(toml_str)
            .map_err(|e| OrchestratorError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, OrchestratorError> {
        toml::to_string_pretty(self)
            .map_err(|e| OrchestratorError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Parses the cluster mesh name.
    pub fn parse_mesh(&self) -> Result<DeviceMesh, OrchestratorError> {
        Ok(DeviceMesh::parse(&self.device_mesh, self.gpus_per_node)?)
    }

    /// Parses the memory cap string into a [`MemoryBudget`].
    pub fn parse_budget(&self) -> Result<MemoryBudget, OrchestratorError> {
        MemoryBudget::parse(&self.gpu_mem_cap)
            .map_err(|e| OrchestratorError::ConfigError(format!("invalid gpu_mem_cap: {e}")))
    }

    pub fn enumeration_config(&self) -> Result<EnumerationConfig, OrchestratorError> {
        let config = EnumerationConfig {
            gpu_mem_cap: self.parse_budget()?,
            mem_index: self.mem_index,
            n_ppo_minibatches: self.n_ppo_minibatches,
            num_gen_tokens: self.num_gen_tokens,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn search_config(&self) -> Result<SearchConfig, OrchestratorError> {
        let config = SearchConfig {
            gpu_mem_cap: self.parse_budget()?,
            mem_margin: self.search_mem_margin,
            max_inner_iterations: self.max_search_iterations,
            priority_top_k: self.priority_top_k,
            overlap_rule: self.overlap_rule,
            record_valid_limit: self.record_valid_limit,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads `model_config_dir` (if set) and layers the inline configs on top.
    pub fn build_registry(&self) -> Result<ModelConfigRegistry, OrchestratorError> {
        let mut registry = match &self.model_config_dir {
            Some(dir) => ModelConfigRegistry::load_dir(dir)?,
            None => ModelConfigRegistry::new(),
        };
        for (model_type, config) in &self.models {
            registry.insert(model_type, config.clone())?;
        }
        Ok(registry)
    }

    /// Validates the configured calls into a dataflow graph.
    pub fn build_graph(&self) -> Result<DataflowGraph<Validated>, OrchestratorError> {
        Ok(DataflowGraph::new(self.rpcs.clone()).validate()?)
    }

    /// Resolves the GPU spec for the analytic estimator.
    pub fn resolve_gpu(&self) -> GpuSpec {
        self.gpu.clone().unwrap_or_default()
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            device_mesh: "node01".to_string(),
            gpus_per_node: 8,
            gpu_mem_cap: "80G".to_string(),
            mem_index: default_mem_index(),
            search_mem_margin: default_search_mem_margin(),
            max_search_iterations: default_max_search_iterations(),
            priority_top_k: default_priority_top_k(),
            n_ppo_minibatches: default_n_ppo_minibatches(),
            num_gen_tokens: default_num_gen_tokens(),
            num_epoch: default_num_epoch(),
            epoch_dependency_interval: default_epoch_dependency_interval(),
            overlap_rule: OverlapRule::Any,
            record_valid_limit: 0,
            model_config_dir: None,
            models: BTreeMap::new(),
            gpu: None,
            rpcs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_graph::InterfaceType;

    const TOML: &str = r#"
device_mesh = "node[01-02]"
gpus_per_node = 8
gpu_mem_cap = "40G"
n_ppo_minibatches = 2
overlap_rule = "all"

[models.tiny]
num_hidden_layers = 2
hidden_size = 256
intermediate_size = 1024
num_attention_heads = 4
vocab_size = 1000

[[rpcs]]
name = "actor_gen"
model_name = "actor"
model_type = "tiny"
interface_type = "generate"
min_n_seqs = 8
max_n_tokens = 2048
output_keys = ["seq"]

[[rpcs]]
name = "actor_train"
model_name = "actor@0"
model_type = "tiny"
interface_type = "train_step"
min_n_seqs = 8
max_n_tokens = 2048
input_keys = ["seq"]
"#;

    #[test]
    fn test_default() {
        let c = PlannerConfig::default();
        assert_eq!(c.gpu_mem_cap, "80G");
        assert_eq!(c.search_mem_margin, 1.2);
        assert_eq!(c.max_search_iterations, 200_000);
        assert_eq!(c.num_epoch, 5);
        assert_eq!(c.overlap_rule, OverlapRule::Any);
        assert_eq!(c.resolve_gpu(), GpuSpec::a100_80g());
    }

    #[test]
    fn test_from_toml() {
        let c = PlannerConfig::from_toml(TOML).unwrap();
        assert_eq!(c.parse_mesh().unwrap().device_count(), 16);
        assert_eq!(c.parse_budget().unwrap(), MemoryBudget::from_gib(40));
        assert_eq!(c.overlap_rule, OverlapRule::All);
        assert_eq!(c.priority_top_k, 10);
        assert_eq!(c.rpcs.len(), 2);
        assert_eq!(c.rpcs[1].interface_type, InterfaceType::TrainStep);
        assert_eq!(c.rpcs[0].model_name, c.rpcs[1].model_name);
    }

    #[test]
    fn test_builders() {
        let c = PlannerConfig::from_toml(TOML).unwrap();
        let registry = c.build_registry().unwrap();
        assert!(registry.contains("tiny"));
        let graph = c.build_graph().unwrap();
        assert_eq!(graph.num_rpcs(), 2);
        assert_eq!(c.enumeration_config().unwrap().n_ppo_minibatches, 2);
        assert_eq!(c.search_config().unwrap().overlap_rule, OverlapRule::All);
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = PlannerConfig::from_toml(TOML).unwrap();
        let toml = c.to_toml().unwrap();
        let back = PlannerConfig::from_toml(&toml).unwrap();
        assert_eq!(back.device_mesh, c.device_mesh);
        assert_eq!(back.rpcs, c.rpcs);
        assert_eq!(back.models, c.models);
    }

    #[test]
    fn test_invalid_values() {
        let bad_cap = PlannerConfig {
            gpu_mem_cap: "lots".into(),
            ..Default::default()
        };
        assert!(matches!(
            bad_cap.parse_budget(),
            Err(OrchestratorError::ConfigError(_))
        ));

        let bad_margin = PlannerConfig {
            search_mem_margin: 0.0,
            ..Default::default()
        };
        assert!(bad_margin.search_config().is_err());

        let bad_mesh = PlannerConfig {
            device_mesh: "node[03-01]".into(),
            ..Default::default()
        };
        assert!(matches!(
            bad_mesh.parse_mesh(),
            Err(OrchestratorError::MeshError(_))
        ));

        assert!(PlannerConfig::from_toml("device_mesh = 3").is_err());
    }

    #[test]
    fn test_empty_graph() {
        assert!(matches!(
            PlannerConfig::default().build_graph(),
            Err(OrchestratorError::GraphError(_))
        ));
    }
}
