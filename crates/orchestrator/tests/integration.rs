// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end planning pipeline.
//!
//! These tests exercise the complete flow from configuration → graph
//! validation → enumeration → search → plan, proving that all six crates
//! compose correctly and that the type-state transitions work end-to-end.

use cost_model::{
    AnalyticEstimator, CostError, CostEstimator, CostQuery, ModelConfig, ModelConfigRegistry,
    MemoryCost,
};
use device_mesh::{find_parallel_strategies, find_sub_device_meshes, DeviceMesh, ParallelStrategy};
use memory_accounting::{GroupedRpcExecutions, MemoryBudget, OverlapRule};
use orchestrator::{OrchestratorError, PlannerConfig, PlanningSession};
use placement_planner::{
    enumerate_rpc_executions, CandidateTable, EnumerationConfig, PlannerError, RpcExecution,
};
use rpc_graph::{DataflowGraph, InterfaceType, ModelRpc, Rpc};

const GIB: u64 = 1 << 30;

// ── Helpers ────────────────────────────────────────────────────

/// A 1.3B-parameter decoder.
fn small_model() -> ModelConfig {
    ModelConfig {
        n_layers: 24,
        hidden_dim: 2048,
        intermediate_dim: 8192,
        n_q_heads: 32,
        n_kv_heads: None,
        vocab_size: 50272,
        tied_embedding: true,
        is_critic: false,
    }
}

fn critic_model() -> ModelConfig {
    ModelConfig {
        is_critic: true,
        ..small_model()
    }
}

/// The six calls of one PPO iteration.
fn ppo_rpcs() -> Vec<ModelRpc> {
    vec![
        ModelRpc::new("actor_gen", "actor", "opt-1.3b", InterfaceType::Generate, 64, 32768)
            .with_outputs(&["seq", "logp"]),
        ModelRpc::new("rew_inf", "reward", "opt-1.3b-critic", InterfaceType::Inference, 64, 32768)
            .with_inputs(&["seq"])
            .with_outputs(&["rewards"]),
        ModelRpc::new("ref_inf", "ref", "opt-1.3b", InterfaceType::Inference, 64, 32768)
            .with_inputs(&["seq"])
            .with_outputs(&["ref_logp"]),
        ModelRpc::new("critic_inf", "critic", "opt-1.3b-critic", InterfaceType::Inference, 64, 32768)
            .with_inputs(&["seq"])
            .with_outputs(&["values"]),
        ModelRpc::new("actor_train", "actor", "opt-1.3b", InterfaceType::TrainStep, 64, 32768)
            .with_inputs(&["seq", "logp", "rewards", "ref_logp", "values"]),
        ModelRpc::new("critic_train", "critic", "opt-1.3b-critic", InterfaceType::TrainStep, 64, 32768)
            .with_inputs(&["seq", "rewards", "values"]),
    ]
}

fn ppo_config(mesh: &str) -> PlannerConfig {
    let mut config = PlannerConfig {
        device_mesh: mesh.into(),
        max_search_iterations: 20_000,
        rpcs: ppo_rpcs(),
        ..Default::default()
    };
    config.models.insert("opt-1.3b".into(), small_model());
    config.models.insert("opt-1.3b-critic".into(), critic_model());
    config
}

fn node01() -> DeviceMesh {
    DeviceMesh::parse("node01", 8).unwrap()
}

/// Same per-device footprint wherever a call is placed.
struct FixedFootprint {
    mem: u64,
    static_mem: u64,
}

impl CostEstimator for FixedFootprint {
    fn estimate_memory(&self, _: &CostQuery<'_>) -> Result<MemoryCost, CostError> {
        Ok(MemoryCost {
            mem: self.mem,
            static_mem: self.static_mem,
        })
    }

    fn estimate_time(&self, q: &CostQuery<'_>) -> Result<u64, CostError> {
        Ok(1_000_000 / q.mesh.device_count() as u64)
    }
}

// ── Mesh and strategy properties ───────────────────────────────

#[test]
fn test_sub_meshes_within_parent() {
    for name in ["node01", "node[01-02]", "node[01-04]"] {
        let mesh = DeviceMesh::parse(name, 8).unwrap();
        let subs = find_sub_device_meshes(&mesh);
        assert!(subs.contains(&mesh), "{name} missing itself");
        for sub in &subs {
            assert!(mesh.contains(sub), "{sub} escapes {mesh}");
            assert!(sub.devices().all(|d| mesh.devices().any(|p| p == d)));
        }
    }
}

#[test]
fn test_strategies_cover_device_count() {
    let mesh = DeviceMesh::parse("node[01-02]", 8).unwrap();
    for sub in find_sub_device_meshes(&mesh) {
        let strategies = find_parallel_strategies(&sub);
        assert!(!strategies.is_empty(), "{sub} has no strategy");
        for s in strategies {
            assert!(s.num_dp >= 1 && s.num_pp >= 1 && s.num_mp >= 1);
            assert_eq!(s.world_size(), sub.device_count());
        }
    }
}

// ── Enumeration ────────────────────────────────────────────────

#[test]
fn test_eight_device_scenario() {
    let estimator = AnalyticEstimator::default();
    let config = EnumerationConfig {
        gpu_mem_cap: MemoryBudget::from_gib(80),
        n_ppo_minibatches: 2,
        ..Default::default()
    };
    let train = ModelRpc::new("a", "actor", "opt-1.3b", InterfaceType::TrainStep, 16, 8192);
    let generate = ModelRpc::new("b", "actor", "opt-1.3b", InterfaceType::Generate, 8, 4096);

    let mut a = enumerate_rpc_executions(&train, &small_model(), &node01(), &estimator, &config)
        .unwrap();
    let mut b = enumerate_rpc_executions(&generate, &small_model(), &node01(), &estimator, &config)
        .unwrap();
    assert!(!a.is_empty());
    assert!(!b.is_empty());
    a.sort_by_key(|e| e.time_cost);
    b.sort_by_key(|e| e.time_cost);

    for e in &a {
        let s = e.parallel_strategy;
        assert!(s.num_dp * s.num_pp <= 4, "train candidate {e}");
        assert!(e.mem < 80 * GIB);
    }
    for e in &b {
        let s = e.parallel_strategy;
        assert!(s.num_dp * s.num_pp <= 8, "generate candidate {e}");
        assert!(e.mem < 80 * GIB);
    }

    let rpcs = vec![train, generate];
    let graph = DataflowGraph::new(rpcs).validate().unwrap();
    let mut registry = ModelConfigRegistry::new();
    registry.insert("opt-1.3b", small_model()).unwrap();
    let table = CandidateTable::build(&graph, &registry, &node01(), &estimator, &config).unwrap();
    for (_, row) in table.iter() {
        assert!(row.windows(2).all(|w| w[0].time_cost <= w[1].time_cost));
    }
    assert_eq!(table.candidates(0).len(), a.len());
    assert_eq!(table.candidates(1).len(), b.len());
}

#[test]
fn test_enumeration_deterministic() {
    let estimator = AnalyticEstimator::default();
    let rpc = ModelRpc::new("g", "actor", "opt-1.3b", InterfaceType::Generate, 32, 16384);
    let mesh = DeviceMesh::parse("node[01-02]", 8).unwrap();
    let config = EnumerationConfig::default();
    let first = enumerate_rpc_executions(&rpc, &small_model(), &mesh, &estimator, &config).unwrap();
    let second = enumerate_rpc_executions(&rpc, &small_model(), &mesh, &estimator, &config).unwrap();
    assert_eq!(first, second);
    assert!(first
        .iter()
        .zip(&second)
        .all(|(x, y)| x.time_cost == y.time_cost && x.mem == y.mem));
}

// ── Grouped memory ─────────────────────────────────────────────

fn execution(rpc: &str, role: &str, mesh: &str, mem: u64, static_mem: u64) -> RpcExecution {
    let device_mesh = DeviceMesh::parse(mesh, 8).unwrap();
    let n = device_mesh.device_count();
    RpcExecution {
        rpc: Rpc::from(&ModelRpc::new(rpc, role, "opt-1.3b", InterfaceType::Inference, 8, 1024)),
        device_mesh,
        parallel_strategy: ParallelStrategy::new(1, 1, n).unwrap(),
        time_cost: 1,
        mem,
        static_mem,
    }
}

#[test]
fn test_grouping_disjoint_and_identical() {
    let mut disjoint = GroupedRpcExecutions::new(OverlapRule::Any);
    disjoint.add(&execution("a", "actor", "node01:0,1,2,3", 30 * GIB, 10 * GIB));
    disjoint.add(&execution("b", "critic", "node01:4,5,6,7", 20 * GIB, 5 * GIB));
    assert_eq!(disjoint.num_groups(), 2);
    let sum: u64 = disjoint.groups().iter().map(|g| g.mem_cost()).sum();
    assert_eq!(disjoint.total_mem_cost(), sum);
    assert_eq!(sum, 50 * GIB);

    let mut identical = GroupedRpcExecutions::new(OverlapRule::Any);
    let e = execution("a", "actor", "node01", 30 * GIB, 10 * GIB);
    identical.add(&e);
    identical.add(&e);
    assert_eq!(identical.num_groups(), 1);
    assert_eq!(identical.total_mem_cost(), 30 * GIB);
}

// ── Full pipeline ──────────────────────────────────────────────

#[test]
fn test_ppo_plan_on_two_nodes() {
    let mut session = PlanningSession::new(ppo_config("node[01-02]"))
        .unwrap()
        .enumerate()
        .unwrap();
    assert_eq!(session.table().num_rpcs(), 6);

    let plan = session.plan().unwrap();
    plan.validate().unwrap();
    assert_eq!(plan.num_rpcs(), 6);
    assert!(plan.grouped_mem_cost <= plan.mem_limit);
    for rpc in ppo_rpcs() {
        let chosen = plan.execution_for(&rpc.name).unwrap();
        assert!(session.mesh().contains(&chosen.device_mesh));
    }
    let order: Vec<&str> = plan.executions.iter().map(|e| e.rpc_name()).collect();
    assert_eq!(order[0], "actor_gen");
    assert_eq!(order[5], "critic_train");

    let metrics = session.metrics();
    assert_eq!(metrics.rpc_metrics.len(), 6);
    assert!(metrics.valid_count >= 1);
    assert!(metrics.inner_iterations <= 20_000 + 6);
}

#[test]
fn test_plan_deterministic() {
    let plan = |_: usize| {
        PlanningSession::new(ppo_config("node01"))
            .unwrap()
            .enumerate()
            .unwrap()
            .plan()
            .unwrap()
    };
    let (a, b) = (plan(0), plan(1));
    assert_eq!(a.executions, b.executions);
    assert_eq!(a.total_time_cost, b.total_time_cost);
    assert_eq!(a.grouped_mem_cost, b.grouped_mem_cost);
}

#[test]
fn test_infeasible_cap_terminates() {
    // Every call fits alone, no pair fits together.
    let mut config = ppo_config("node01");
    config.rpcs.truncate(2);
    config.search_mem_margin = 1.0;
    config.max_search_iterations = 1_000_000;
    let mut session = PlanningSession::new(config)
        .unwrap()
        .with_estimator(FixedFootprint {
            mem: 50 * GIB,
            static_mem: 40 * GIB,
        })
        .enumerate()
        .unwrap();

    let err = session.plan().unwrap_err();
    match err {
        OrchestratorError::PlannerError(PlannerError::NoFeasiblePlan { diagnostic }) => {
            assert!(diagnostic.contains("over the 80.00 GiB limit"), "{diagnostic}");
        }
        other => panic!("expected NoFeasiblePlan, got {other}"),
    }
    let metrics = session.metrics();
    assert_eq!(metrics.valid_count, 0);
    assert!(!metrics.budget_exhausted);
}

#[test]
fn test_budget_exhaustion_reported() {
    let mut config = ppo_config("node01");
    config.max_search_iterations = 50;
    let mut session = PlanningSession::new(config).unwrap().enumerate().unwrap();
    let report = session.search().unwrap();
    assert!(report.budget_exhausted);
    assert!(report.inner_iterations < 50 + 6);
    assert!(session.metrics().budget_exhausted);
}

#[test]
fn test_no_candidates_is_fatal() {
    let mut config = ppo_config("node01");
    config.rpcs.truncate(1);
    let err = PlanningSession::new(config)
        .unwrap()
        .with_estimator(FixedFootprint {
            mem: 90 * GIB,
            static_mem: 10 * GIB,
        })
        .enumerate()
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::PlannerError(PlannerError::NoCandidates { .. })
    ));
}

// ── Epochs ─────────────────────────────────────────────────────

#[test]
fn test_single_rpc_epochs() {
    let mut config = ppo_config("node01");
    config.rpcs = vec![ModelRpc::new(
        "rpc",
        "actor",
        "opt-1.3b",
        InterfaceType::TrainStep,
        16,
        4096,
    )];
    config.num_epoch = 3;
    config.epoch_dependency_interval = 1;

    let session = PlanningSession::new(config).unwrap();
    let instances = session.epoch_graph().unwrap();
    let names: Vec<String> = instances.iter().map(|i| i.name()).collect();
    assert_eq!(names, vec!["rpc:0", "rpc:1", "rpc:2"]);
    assert_eq!(instances[1].parent_names(), vec!["rpc:0".to_string()]);
    assert_eq!(instances[1].child_names(), vec!["rpc:2".to_string()]);
    assert!(instances[0].parent_names().is_empty());
    assert!(instances[2].child_names().is_empty());
}

#[test]
fn test_ppo_epoch_links() {
    let mut config = ppo_config("node01");
    config.num_epoch = 2;
    let session = PlanningSession::new(config).unwrap();
    let instances = session.epoch_graph().unwrap();
    assert_eq!(instances.len(), 12);
    let gen1 = instances.iter().find(|i| i.name() == "actor_gen:1").unwrap();
    let parents = gen1.parent_names();
    assert!(parents.contains(&"actor_train:0".to_string()));
    assert!(parents.contains(&"critic_train:0".to_string()));
}
