// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`DeviceMesh`] type: a rectangular block of GPUs in a cluster.
//!
//! A cluster is a row of identically-sized nodes. A mesh covers a
//! contiguous range of node ids and, on each of those nodes, the same
//! contiguous slice of GPU slots:
//!
//! ```text
//!            gpu 0 1 2 3 4 5 6 7
//! node01         . . . . . . . .
//! node02         . . . . # # # #   <- node[02-03]:4,5,6,7
//! node03         . . . . # # # #
//! ```
//!
//! Two meshes overlap iff they belong to the same cluster (same node-name
//! prefix) and both their node ranges and their GPU slices intersect.

use crate::MeshError;
use std::fmt;
use std::ops::Range;

/// One physical GPU: `(node id, GPU slot)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    pub node: usize,
    pub gpu: usize,
}

/// A rectangular set of GPUs: `n_nodes` consecutive nodes × `n_gpus`
/// consecutive GPU slots on each.
///
/// Meshes are plain values: cheap to clone, hashable, totally ordered.
/// Field order drives the derived `Ord`, which keeps sorted candidate
/// lists deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct DeviceMesh {
    /// Node-name prefix of the cluster (e.g. `"node"`).
    prefix: String,
    /// GPUs installed in every node of the cluster.
    gpus_per_node: usize,
    /// First node id covered.
    node_start: usize,
    /// Number of nodes covered.
    n_nodes: usize,
    /// First GPU slot covered on each node.
    gpu_start: usize,
    /// GPU slots covered on each node.
    n_gpus: usize,
}

impl DeviceMesh {
    /// Creates a mesh, checking it fits the cluster shape.
    pub fn new(
        prefix: &str,
        gpus_per_node: usize,
        node_start: usize,
        n_nodes: usize,
        gpu_start: usize,
        n_gpus: usize,
    ) -> Result<Self, MeshError> {
        validate_prefix(prefix)?;
        if gpus_per_node == 0 {
            return Err(MeshError::InvalidMesh("gpus_per_node must be > 0".into()));
        }
        if n_nodes == 0 || n_gpus == 0 {
            return Err(MeshError::InvalidMesh(format!(
                "mesh must cover at least one device (n_nodes={n_nodes}, n_gpus={n_gpus})"
            )));
        }
        match gpu_start.checked_add(n_gpus) {
            Some(end) if end <= gpus_per_node => {}
            _ => {
                return Err(MeshError::InvalidMesh(format!(
                    "GPU slice of {n_gpus} from slot {gpu_start} exceeds {gpus_per_node} GPUs per node"
                )));
            }
        }
        if node_start.checked_add(n_nodes).is_none() || n_nodes.checked_mul(n_gpus).is_none() {
            return Err(MeshError::InvalidMesh(format!(
                "node range of {n_nodes} from node {node_start} is out of bounds"
            )));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            gpus_per_node,
            node_start,
            n_nodes,
            gpu_start,
            n_gpus,
        })
    }

    /// Creates a mesh covering whole nodes `node_start..node_start + n_nodes`.
    pub fn whole_nodes(
        prefix: &str,
        gpus_per_node: usize,
        node_start: usize,
        n_nodes: usize,
    ) -> Result<Self, MeshError> {
        Self::new(prefix, gpus_per_node, node_start, n_nodes, 0, gpus_per_node)
    }

    /// Parses a mesh name.
    ///
    /// Accepted forms: `prefix[NN-MM]`, `prefix[NN]`, `prefixNN`, each
    /// optionally followed by `:g,g,...` selecting a contiguous GPU slice.
    pub fn parse(name: &str, gpus_per_node: usize) -> Result<Self, MeshError> {
        let name = name.trim();
        let parse_err = |detail: String| MeshError::ParseError {
            name: name.to_string(),
            detail,
        };

        let (head, gpu_part) = match name.split_once(':') {
            Some((h, g)) => (h, Some(g)),
            None => (name, None),
        };

        let (prefix, node_start, n_nodes) = if let Some(open) = head.find('[') {
            let inner = head[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| parse_err("missing closing ']'".into()))?;
            let (first, last) = match inner.split_once('-') {
                Some((a, b)) => (parse_num(a, name)?, parse_num(b, name)?),
                None => {
                    let n = parse_num(inner, name)?;
                    (n, n)
                }
            };
            if last < first {
                return Err(parse_err(format!("empty node range {first}-{last}")));
            }
            let n_nodes = (last - first)
                .checked_add(1)
                .ok_or_else(|| parse_err(format!("node range {first}-{last} is too large")))?;
            (&head[..open], first, n_nodes)
        } else {
            let digits_at = head.trim_end_matches(|c: char| c.is_ascii_digit()).len();
            if digits_at == head.len() {
                return Err(parse_err("missing node number".into()));
            }
            (&head[..digits_at], parse_num(&head[digits_at..], name)?, 1)
        };

        let (gpu_start, n_gpus) = match gpu_part {
            None => (0, gpus_per_node),
            Some(list) => {
                let gpus = list
                    .split(',')
                    .map(|g| parse_num(g, name))
                    .collect::<Result<Vec<_>, _>>()?;
                let first = gpus[0];
                if gpus.iter().enumerate().any(|(i, &g)| first.checked_add(i) != Some(g)) {
                    return Err(parse_err(format!(
                        "GPU list '{list}' is not a contiguous ascending slice"
                    )));
                }
                (first, gpus.len())
            }
        };

        Self::new(prefix, gpus_per_node, node_start, n_nodes, gpu_start, n_gpus).map_err(|e| {
            parse_err(e.to_string())
        })
    }

    /// Builds a sub-mesh of `self` without re-validating the cluster shape.
    pub(crate) fn sub_mesh(
        &self,
        node_start: usize,
        n_nodes: usize,
        gpu_start: usize,
        n_gpus: usize,
    ) -> Self {
        debug_assert!(node_start >= self.node_start);
        debug_assert!(node_start + n_nodes <= self.node_start + self.n_nodes);
        debug_assert!(gpu_start >= self.gpu_start);
        debug_assert!(gpu_start + n_gpus <= self.gpu_start + self.n_gpus);
        Self {
            prefix: self.prefix.clone(),
            gpus_per_node: self.gpus_per_node,
            node_start,
            n_nodes,
            gpu_start,
            n_gpus,
        }
    }

    /// Returns the cluster's node-name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the number of GPUs installed per cluster node.
    pub fn gpus_per_node(&self) -> usize {
        self.gpus_per_node
    }

    /// Returns the number of nodes this mesh spans.
    pub fn node_count(&self) -> usize {
        self.n_nodes
    }

    /// Returns the number of GPUs this mesh uses on each of its nodes.
    pub fn gpus_per_mesh_node(&self) -> usize {
        self.n_gpus
    }

    /// Returns the total number of devices in the mesh.
    pub fn device_count(&self) -> usize {
        self.n_nodes * self.n_gpus
    }

    /// Node ids covered by the mesh.
    pub fn node_range(&self) -> Range<usize> {
        self.node_start..self.node_start + self.n_nodes
    }

    /// GPU slots covered on each node.
    pub fn gpu_range(&self) -> Range<usize> {
        self.gpu_start..self.gpu_start + self.n_gpus
    }

    /// Returns `true` if the mesh uses every GPU of each node it spans.
    pub fn is_whole_nodes(&self) -> bool {
        self.gpu_start == 0 && self.n_gpus == self.gpus_per_node
    }

    /// Iterates the devices in node-major order.
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.node_range()
            .flat_map(move |node| self.gpu_range().map(move |gpu| DeviceId { node, gpu }))
    }

    /// Returns `true` if the two meshes share at least one device.
    pub fn overlaps(&self, other: &DeviceMesh) -> bool {
        self.prefix == other.prefix
            && ranges_intersect(&self.node_range(), &other.node_range())
            && ranges_intersect(&self.gpu_range(), &other.gpu_range())
    }

    /// Returns `true` if every device of `other` is also in `self`.
    pub fn contains(&self, other: &DeviceMesh) -> bool {
        self.prefix == other.prefix
            && self.node_start <= other.node_start
            && other.node_start + other.n_nodes <= self.node_start + self.n_nodes
            && self.gpu_start <= other.gpu_start
            && other.gpu_start + other.n_gpus <= self.gpu_start + self.n_gpus
    }
}

impl fmt::Display for DeviceMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.n_nodes == 1 {
            write!(f, "{}{:02}", self.prefix, self.node_start)?;
        } else {
            write!(
                f,
                "{}[{:02}-{:02}]",
                self.prefix,
                self.node_start,
                self.node_start + self.n_nodes - 1,
            )?;
        }
        if !self.is_whole_nodes() {
            let gpus: Vec<String> = self.gpu_range().map(|g| g.to_string()).collect();
            write!(f, ":{}", gpus.join(","))?;
        }
        Ok(())
    }
}

fn ranges_intersect(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn parse_num(s: &str, name: &str) -> Result<usize, MeshError> {
    s.trim().parse().map_err(|_| MeshError::ParseError {
        name: name.to_string(),
        detail: format!("'{s}' is not a number"),
    })
}

fn validate_prefix(prefix: &str) -> Result<(), MeshError> {
    if prefix.is_empty() {
        return Err(MeshError::InvalidMesh("node-name prefix is empty".into()));
    }
    if prefix.ends_with(|c: char| c.is_ascii_digit()) {
        return Err(MeshError::InvalidMesh(format!(
            "node-name prefix '{prefix}' must not end with a digit"
        )));
    }
    if prefix.contains(['[', ']', ':', ',']) {
        return Err(MeshError::InvalidMesh(format!(
            "node-name prefix '{prefix}' contains a reserved character"
        )));
    }
    Ok(())
}
