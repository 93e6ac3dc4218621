// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! GPU and interconnect characteristics used by the analytic estimator.

/// Throughput figures for one GPU type and its interconnect.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GpuSpec {
    pub name: String,
    /// Dense bf16 peak, TFLOP/s.
    pub bf16_tflops: f64,
    /// Fraction of peak achieved by large matmuls.
    pub mfu: f64,
    /// HBM bandwidth, GB/s.
    pub hbm_gbps: f64,
    /// Per-GPU intra-node collective bandwidth (NVLink), GB/s.
    pub intra_node_gbps: f64,
    /// Per-GPU inter-node bandwidth (InfiniBand), GB/s.
    pub inter_node_gbps: f64,
    /// Host-to-device bandwidth for offloaded weights (PCIe), GB/s.
    pub host_gbps: f64,
    /// Fixed cost of launching one collective, microseconds.
    pub collective_latency_us: f64,
}

impl GpuSpec {
    pub fn a100_80g() -> Self {
        Self {
            name: "A100-SXM4-80GB".into(),
            bf16_tflops: 312.0,
            mfu: 0.45,
            hbm_gbps: 2039.0,
            intra_node_gbps: 240.0,
            inter_node_gbps: 25.0,
            host_gbps: 25.0,
            collective_latency_us: 15.0,
        }
    }

    pub fn h100_80g() -> Self {
        Self {
            name: "H100-SXM5-80GB".into(),
            bf16_tflops: 989.0,
            mfu: 0.40,
            hbm_gbps: 3350.0,
            intra_node_gbps: 450.0,
            inter_node_gbps: 50.0,
            host_gbps: 50.0,
            collective_latency_us: 10.0,
        }
    }

    /// Effective matmul throughput, FLOP/s.
    pub fn effective_flops(&self) -> f64 {
        self.bf16_tflops * 1e12 * self.mfu
    }
}

impl Default for GpuSpec {
    fn default() -> Self {
        Self::a100_80g()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_h100_faster_than_a100() {
        let a = GpuSpec::a100_80g();
        let h = GpuSpec::h100_80g();
        assert!(h.effective_flops() > a.effective_flops());
        assert!(h.hbm_gbps > a.hbm_gbps);
    }

    #[test]
    fn test_default_is_a100() {
        assert_eq!(GpuSpec::default(), GpuSpec::a100_80g());
    }

    #[test]
    fn test_serde_roundtrip() {
        let spec = GpuSpec::h100_80g();
        let json = serde_json::to_string(&spec).unwrap();
        let back: GpuSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
