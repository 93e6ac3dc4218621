// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Placement order for the search.
//!
//! Expensive calls go first: their cheap candidates tend to be large, so
//! placing them early makes memory overruns surface at shallow odometer
//! digits, where a single advance prunes the most.

use crate::CandidateTable;

/// Mean time cost of a row's `k` fastest candidates.
///
/// A row shorter than `k` is averaged over its own length; it is not
/// padded with zeros up to `k`.
pub fn top_k_mean(times: impl Iterator<Item = u64>, k: usize) -> f64 {
    let mut sum = 0u128;
    let mut n = 0u128;
    for t in times.take(k.max(1)) {
        sum += t as u128;
        n += 1;
    }
    if n == 0 {
        0.0
    } else {
        sum as f64 / n as f64
    }
}

/// Row indices of `table` ordered by descending top-`k` mean time cost.
/// Equal scores keep declaration order; later calls are not favoured.
pub fn priority_order(table: &CandidateTable, k: usize) -> Vec<usize> {
    let scores: Vec<f64> = table
        .iter()
        .map(|(_, row)| top_k_mean(row.iter().map(|e| e.time_cost), k))
        .collect();
    let mut order: Vec<usize> = (0..table.num_rpcs()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    tracing::debug!(
        "placement order: {}",
        order
            .iter()
            .map(|&i| format!("{} ({:.0} ns)", table.rpc(i).rpc_name, scores[i]))
            .collect::<Vec<_>>()
            .join(" > ")
    );
    order
}
