// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Sub-mesh enumeration and overlap tests.
//!
//! # Legal sub-meshes
//!
//! A sub-mesh is either
//! - a contiguous run of 1..=N of the mesh's nodes, keeping the mesh's full
//!   GPU slice on each node, or
//! - a power-of-two GPU slice on a single node, smaller than the mesh's
//!   slice and aligned to its own size (`1x2` starts at an even slot, `1x4`
//!   at a multiple of four, ...).
//!
//! On an 8-GPU node this yields the familiar `1x1`, `1x2`, `1x4`, `1x8`,
//! `Nx8` shapes.

use crate::DeviceMesh;
use std::collections::HashSet;

/// Returns every legal sub-mesh of `mesh`, including `mesh` itself.
///
/// The result is deduplicated and its order is a pure function of the
/// mesh: single-node slices by ascending size (node-major), then node
/// spans by ascending length.
pub fn find_sub_device_meshes(mesh: &DeviceMesh) -> Vec<DeviceMesh> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut push = |m: DeviceMesh| {
        if seen.insert(m.clone()) {
            out.push(m);
        }
    };

    let gpus = mesh.gpu_range();
    let width = mesh.gpus_per_mesh_node();

    // Power-of-two slices strictly narrower than the mesh slice.
    let mut size = 1;
    while size < width {
        for node in mesh.node_range() {
            let mut start = gpus.start.next_multiple_of(size);
            while start + size <= gpus.end {
                push(mesh.sub_mesh(node, 1, start, size));
                start += size;
            }
        }
        size *= 2;
    }

    // Contiguous node spans at full mesh width.
    let nodes = mesh.node_range();
    for span in 1..=mesh.node_count() {
        for first in nodes.start..=nodes.end - span {
            push(mesh.sub_mesh(first, span, gpus.start, width));
        }
    }

    tracing::debug!("mesh {mesh}: {} sub-meshes", out.len());
    out
}

/// Returns `true` if `candidate` overlaps **every** mesh in `meshes`.
///
/// Vacuously `true` for an empty slice.
pub fn is_all_overlap(meshes: &[&DeviceMesh], candidate: &DeviceMesh) -> bool {
    meshes.iter().all(|m| m.overlaps(candidate))
}

/// Returns `true` if `candidate` overlaps **at least one** mesh in `meshes`.
pub fn is_any_overlap(meshes: &[&DeviceMesh], candidate: &DeviceMesh) -> bool {
    meshes.iter().any(|m| m.overlaps(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(name: &str) -> DeviceMesh {
        DeviceMesh::parse(name, 8).unwrap()
    }

    #[test]
    fn test_single_node_count() {
        // 8 × 1x1, 4 × 1x2, 2 × 1x4, 1 × 1x8.
        let subs = find_sub_device_meshes(&mesh("node01"));
        assert_eq!(subs.len(), 15);
    }

    #[test]
    fn test_multi_node_count() {
        // Per node: 8 + 4 + 2 = 14 slices → 28.
        // Spans: two 1-node + one 2-node → 3.
        let subs = find_sub_device_meshes(&mesh("node[01-02]"));
        assert_eq!(subs.len(), 31);
    }

    #[test]
    fn test_contains_self_and_subsets_only() {
        for name in ["node01", "node[01-03]", "node04:4,5,6,7", "node[02-03]:0,1,2,3"] {
            let m = mesh(name);
            let subs = find_sub_device_meshes(&m);
            assert!(subs.contains(&m), "{name} missing itself");
            for s in &subs {
                assert!(m.contains(s), "{s} escapes {name}");
                let all: HashSet<_> = m.devices().collect();
                assert!(s.devices().all(|d| all.contains(&d)));
            }
        }
    }

    #[test]
    fn test_no_duplicates() {
        let subs = find_sub_device_meshes(&mesh("node[01-04]"));
        let unique: HashSet<_> = subs.iter().collect();
        assert_eq!(unique.len(), subs.len());
    }

    #[test]
    fn test_slices_are_aligned() {
        for s in find_sub_device_meshes(&mesh("node[01-02]")) {
            if s.node_count() == 1 && !s.is_whole_nodes() {
                let w = s.gpus_per_mesh_node();
                assert!(w.is_power_of_two());
                assert_eq!(s.gpu_range().start % w, 0, "{s} misaligned");
            }
        }
    }

    #[test]
    fn test_unaligned_parent_slice() {
        // GPUs 2..8: slices must stay inside and remain size-aligned.
        let m = DeviceMesh::new("node", 8, 1, 1, 2, 6).unwrap();
        let subs = find_sub_device_meshes(&m);
        // 1x1: 6, 1x2: {2,4,6} → 3, 1x4: {4} → 1, full: 1.
        assert_eq!(subs.len(), 11);
        assert!(subs.iter().all(|s| m.contains(s)));
    }

    #[test]
    fn test_deterministic_order() {
        let a = find_sub_device_meshes(&mesh("node[01-03]"));
        let b = find_sub_device_meshes(&mesh("node[01-03]"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlap_helpers() {
        let a = mesh("node01:0,1,2,3");
        let b = mesh("node01:2,3");
        let c = mesh("node01:4,5,6,7");
        let probe = mesh("node01:3");

        assert!(is_all_overlap(&[&a, &b], &probe));
        assert!(!is_all_overlap(&[&a, &c], &probe));
        assert!(is_any_overlap(&[&a, &c], &probe));
        assert!(!is_any_overlap(&[&c], &probe));
        assert!(is_all_overlap(&[], &probe));
        assert!(!is_any_overlap(&[], &probe));
    }
}
