// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RPC descriptors.
//!
//! A [`ModelRpc`] is one model call in the training dataflow: which model
//! replica runs it, what kind of call it is, how large its batch is, and
//! which data it consumes and produces. The planner only needs the
//! lightweight [`Rpc`] projection for identity and grouping.

use crate::GraphError;
use std::fmt;
use std::str::FromStr;

/// The kind of work a model call performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    /// Autoregressive generation (rollout).
    Generate,
    /// A single forward pass (log-probs, values, rewards).
    Inference,
    /// Forward + backward + optimizer step over PPO mini-batches.
    TrainStep,
}

impl InterfaceType {
    /// Parses an interface type, accepting common aliases.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generate" | "gen" | "generation" => Some(Self::Generate),
            "inference" | "inf" | "forward" => Some(Self::Inference),
            "train_step" | "trainstep" | "train" => Some(Self::TrainStep),
            _ => None,
        }
    }

    /// Returns the canonical lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Inference => "inference",
            Self::TrainStep => "train_step",
        }
    }

    /// Returns `true` for calls that update parameters.
    pub fn is_training(&self) -> bool {
        matches!(self, Self::TrainStep)
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model replica: its role in the pipeline plus a replica index.
///
/// Serialised as `"role"` (replica 0) or `"role@N"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelName {
    pub role: String,
    pub replica_id: usize,
}

impl ModelName {
    pub fn new(role: &str, replica_id: usize) -> Self {
        Self {
            role: role.to_string(),
            replica_id,
        }
    }

    /// Frozen models whose parameters live off-device between calls.
    pub fn is_offloaded(&self) -> bool {
        matches!(self.role.as_str(), "ref" | "reward")
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.replica_id)
    }
}

impl FromStr for ModelName {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (role, replica_id) = match s.split_once('@') {
            Some((role, id)) => (
                role,
                id.parse()
                    .map_err(|_| GraphError::InvalidModelName(s.to_string()))?,
            ),
            None => (s, 0),
        };
        if role.is_empty() {
            return Err(GraphError::InvalidModelName(s.to_string()));
        }
        Ok(Self::new(role, replica_id))
    }
}

impl TryFrom<String> for ModelName {
    type Error = GraphError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ModelName> for String {
    fn from(m: ModelName) -> Self {
        m.to_string()
    }
}

/// A model call in the single-epoch dataflow graph.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModelRpc {
    /// Unique call name (e.g. `"actor_gen"`).
    pub name: String,
    /// Model replica the call runs on.
    pub model_name: ModelName,
    /// Architecture key into the model-config registry.
    pub model_type: String,
    /// Kind of call.
    pub interface_type: InterfaceType,
    /// Sequences per call (the batch size the planner sizes for).
    pub min_n_seqs: usize,
    /// Upper bound on tokens per call.
    pub max_n_tokens: usize,
    /// Data keys consumed.
    #[serde(default)]
    pub input_keys: Vec<String>,
    /// Data keys produced.
    #[serde(default)]
    pub output_keys: Vec<String>,
    /// Upstream calls within the same epoch.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Downstream calls within the same epoch.
    #[serde(default)]
    pub children: Vec<String>,
}

impl ModelRpc {
    /// Creates a call on replica 0 of `role` with no edges.
    pub fn new(
        name: &str,
        role: &str,
        model_type: &str,
        interface_type: InterfaceType,
        min_n_seqs: usize,
        max_n_tokens: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            model_name: ModelName::new(role, 0),
            model_type: model_type.to_string(),
            interface_type,
            min_n_seqs,
            max_n_tokens,
            input_keys: Vec::new(),
            output_keys: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_replica(mut self, replica_id: usize) -> Self {
        self.model_name.replica_id = replica_id;
        self
    }

    pub fn with_inputs(mut self, keys: &[&str]) -> Self {
        self.input_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_outputs(mut self, keys: &[&str]) -> Self {
        self.output_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_parents(mut self, names: &[&str]) -> Self {
        self.parents = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_children(mut self, names: &[&str]) -> Self {
        self.children = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Per-sequence length the cost model sizes for: `max_n_tokens / min_n_seqs`.
    ///
    /// Only meaningful once the graph has validated `min_n_seqs > 0`.
    pub fn seq_len(&self) -> usize {
        self.max_n_tokens / self.min_n_seqs.max(1)
    }

    /// Returns `true` if this call has no upstream calls in its epoch.
    pub fn is_source(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns `true` if this call has no downstream calls in its epoch.
    pub fn is_sink(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        format!(
            "{} [{} on {}] {} seqs, {} tokens, model type '{}'",
            self.name,
            self.interface_type,
            self.model_name,
            self.min_n_seqs,
            self.max_n_tokens,
            self.model_type,
        )
    }
}

/// The identity of a call as seen by the placement search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Rpc {
    pub rpc_name: String,
    pub model_name: ModelName,
    pub interface_type: InterfaceType,
}

impl From<&ModelRpc> for Rpc {
    fn from(rpc: &ModelRpc) -> Self {
        Self {
            rpc_name: rpc.name.clone(),
            model_name: rpc.model_name.clone(),
            interface_type: rpc.interface_type,
        }
    }
}

impl fmt::Display for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.rpc_name, self.model_name, self.interface_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_from_str() {
        assert_eq!(InterfaceType::from_str_loose("gen"), Some(InterfaceType::Generate));
        assert_eq!(InterfaceType::from_str_loose("Inference"), Some(InterfaceType::Inference));
        assert_eq!(InterfaceType::from_str_loose("train_step"), Some(InterfaceType::TrainStep));
        assert_eq!(InterfaceType::from_str_loose("sample"), None);
    }

    #[test]
    fn test_interface_display() {
        assert_eq!(InterfaceType::TrainStep.to_string(), "train_step");
        assert!(InterfaceType::TrainStep.is_training());
        assert!(!InterfaceType::Generate.is_training());
    }

    #[test]
    fn test_model_name_parse() {
        let m: ModelName = "critic@2".parse().unwrap();
        assert_eq!(m, ModelName::new("critic", 2));
        let m: ModelName = "actor".parse().unwrap();
        assert_eq!(m.replica_id, 0);
        assert!("@1".parse::<ModelName>().is_err());
        assert!("actor@x".parse::<ModelName>().is_err());
    }

    #[test]
    fn test_offloaded_roles() {
        assert!(ModelName::new("ref", 0).is_offloaded());
        assert!(ModelName::new("reward", 0).is_offloaded());
        assert!(!ModelName::new("actor", 0).is_offloaded());
        assert!(!ModelName::new("critic", 0).is_offloaded());
    }

    #[test]
    fn test_seq_len() {
        let rpc = ModelRpc::new("a", "actor", "m", InterfaceType::Generate, 64, 64 * 512);
        assert_eq!(rpc.seq_len(), 512);
    }

    #[test]
    fn test_rpc_projection() {
        let rpc = ModelRpc::new("actor_train", "actor", "m", InterfaceType::TrainStep, 8, 1024)
            .with_replica(1);
        let r = Rpc::from(&rpc);
        assert_eq!(r.rpc_name, "actor_train");
        assert_eq!(r.model_name, ModelName::new("actor", 1));
        assert_eq!(r.interface_type, InterfaceType::TrainStep);
        assert_eq!(r.to_string(), "actor_train(actor@1, train_step)");
    }

    #[test]
    fn test_rpc_ordering() {
        let gen = Rpc::from(&ModelRpc::new("a", "actor", "m", InterfaceType::Generate, 8, 1024));
        let train = Rpc::from(&ModelRpc::new("a", "actor", "m", InterfaceType::TrainStep, 8, 1024));
        assert!(InterfaceType::Generate < InterfaceType::TrainStep);
        assert!(gen < train);

        let mut set = std::collections::BTreeSet::new();
        set.insert(train.clone());
        set.insert(gen.clone());
        set.insert(gen.clone());
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![gen, train]);
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{
            "name": "ref_inf",
            "model_name": "ref",
            "model_type": "llama-7b",
            "interface_type": "inference",
            "min_n_seqs": 32,
            "max_n_tokens": 16384,
            "input_keys": ["seq"]
        }"#;
        let rpc: ModelRpc = serde_json::from_str(json).unwrap();
        assert_eq!(rpc.model_name, ModelName::new("ref", 0));
        assert_eq!(rpc.interface_type, InterfaceType::Inference);
        assert!(rpc.output_keys.is_empty());
        assert!(rpc.parents.is_empty());
    }

    #[test]
    fn test_serde_rejects_bad_model_name() {
        let json = r#"{
            "name": "x", "model_name": "actor@?", "model_type": "m",
            "interface_type": "generate", "min_n_seqs": 1, "max_n_tokens": 1
        }"#;
        assert!(serde_json::from_str::<ModelRpc>(json).is_err());
    }

    #[test]
    fn test_summary() {
        let rpc = ModelRpc::new("actor_gen", "actor", "llama", InterfaceType::Generate, 16, 4096);
        let s = rpc.summary();
        assert!(s.contains("actor_gen"));
        assert!(s.contains("generate"));
        assert!(s.contains("actor@0"));
    }
}
