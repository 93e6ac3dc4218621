// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: Plan a 7B PPO iteration on clusters of different sizes.
//!
//! Shows how the best placement shifts as the cluster grows and the
//! memory cap shrinks, then prints the full plan and the epoch graph for
//! one setting.
//!
//! ```bash
//! cargo run -p orchestrator --example plan_ppo
//! cargo run -p orchestrator --example plan_ppo -- my_config.toml
//! ```

use anyhow::Context;
use orchestrator::{OrchestratorError, PlannerConfig, PlanningSession};
use placement_planner::PlannerError;
use std::path::Path;

const PPO_7B: &str = r#"
device_mesh = "node[01-02]"
gpus_per_node = 8
gpu_mem_cap = "80G"
n_ppo_minibatches = 4
num_gen_tokens = 256
num_epoch = 2

[models.llama-7b]
num_hidden_layers = 32
hidden_size = 4096
intermediate_size = 11008
num_attention_heads = 32
vocab_size = 32000

[models.llama-7b-critic]
num_hidden_layers = 32
hidden_size = 4096
intermediate_size = 11008
num_attention_heads = 32
vocab_size = 32000
is_critic = true

[[rpcs]]
name = "actor_gen"
model_name = "actor"
model_type = "llama-7b"
interface_type = "generate"
min_n_seqs = 128
max_n_tokens = 65536
output_keys = ["seq", "logp"]

[[rpcs]]
name = "rew_inf"
model_name = "reward"
model_type = "llama-7b-critic"
interface_type = "inference"
min_n_seqs = 128
max_n_tokens = 65536
input_keys = ["seq"]
output_keys = ["rewards"]

[[rpcs]]
name = "ref_inf"
model_name = "ref"
model_type = "llama-7b"
interface_type = "inference"
min_n_seqs = 128
max_n_tokens = 65536
input_keys = ["seq"]
output_keys = ["ref_logp"]

[[rpcs]]
name = "critic_inf"
model_name = "critic"
model_type = "llama-7b-critic"
interface_type = "inference"
min_n_seqs = 128
max_n_tokens = 65536
input_keys = ["seq"]
output_keys = ["values"]

[[rpcs]]
name = "actor_train"
model_name = "actor"
model_type = "llama-7b"
interface_type = "train_step"
min_n_seqs = 128
max_n_tokens = 65536
input_keys = ["seq", "logp", "rewards", "ref_logp", "values"]

[[rpcs]]
name = "critic_train"
model_name = "critic"
model_type = "llama-7b-critic"
interface_type = "train_step"
min_n_seqs = 128
max_n_tokens = 65536
input_keys = ["seq", "rewards", "values"]
"#;

fn main() -> anyhow::Result<()> {
    // Initialise tracing.
    tracing_subscriber::fmt().with_env_filter("info").init();

    let base = match std::env::args().nth(1) {
        Some(path) => PlannerConfig::from_file(Path::new(&path))
            .with_context(|| format!("loading {path}"))?,
        None => PlannerConfig::from_toml(PPO_7B)?,
    };

    // Compare.
    let meshes = ["node01", "node[01-02]", "node[01-04]"];
    let caps = ["40G", "80G"];
    println!(
        "{:<14} {:>6} {:>12} {:>12} {:>10}",
        "Mesh", "Cap", "Time (ms)", "Mem (GiB)", "Valid",
    );
    println!("{}", "-".repeat(58));

    for mesh in meshes {
        for cap in caps {
            let config = PlannerConfig {
                device_mesh: mesh.into(),
                gpu_mem_cap: cap.into(),
                ..base.clone()
            };
            match plan(config) {
                Ok((time_ms, mem_gib, valid)) => println!(
                    "{:<14} {:>6} {:>12.2} {:>12.2} {:>10}",
                    mesh, cap, time_ms, mem_gib, valid,
                ),
                Err(OrchestratorError::PlannerError(PlannerError::NoFeasiblePlan { .. })) => {
                    println!("{:<14} {:>6} {:>12}", mesh, cap, "infeasible")
                }
                Err(e) => println!("{:<14} {:>6} FAIL: {e}", mesh, cap),
            }
        }
    }

    // Full plan for the configured setting.
    println!("\n--- Plan on {} @ {} ---\n", base.device_mesh, base.gpu_mem_cap);
    let mut session = PlanningSession::new(base)?.enumerate()?;
    let plan = session.plan()?;
    println!("{}", plan.summary());
    println!("{}\n", session.metrics().summary());

    for instance in session.epoch_graph()? {
        println!("{instance}");
    }

    Ok(())
}

/// Returns (time in ms, grouped memory in GiB, valid assignments seen).
fn plan(config: PlannerConfig) -> Result<(f64, f64, usize), OrchestratorError> {
    let plan = PlanningSession::new(config)?.enumerate()?.plan()?;
    Ok((
        plan.total_time_cost as f64 / 1e6,
        plan.grouped_mem_cost as f64 / (1u64 << 30) as f64,
        plan.valid_assignments,
    ))
}
