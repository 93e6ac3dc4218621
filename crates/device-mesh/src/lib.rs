// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # device-mesh
//!
//! Describes the GPU pool a planning run places model calls onto, and the
//! ways that pool can be cut up.
//!
//! - [`DeviceMesh`]: a rectangular block of GPUs: a contiguous range of
//!   nodes × a contiguous slice of GPU slots on each node.
//! - [`find_sub_device_meshes`]: every legal sub-mesh of a mesh.
//! - [`ParallelStrategy`]: a `(dp, pp, mp)` degree triple.
//! - [`find_parallel_strategies`]: every legal triple for a mesh.
//!
//! # Naming
//!
//! Meshes use the cluster's node naming scheme:
//!
//! ```text
//! node[01-04]        nodes 1..=4, all GPUs
//! node03             node 3, all GPUs
//! node03:4,5,6,7     node 3, GPUs 4–7
//! ```
//!
//! # Example
//! ```
//! use device_mesh::{find_parallel_strategies, find_sub_device_meshes, DeviceMesh};
//!
//! let mesh = DeviceMesh::parse("node01", 8).unwrap();
//! let subs = find_sub_device_meshes(&mesh);
//! assert_eq!(subs.len(), 15);
//! for sub in &subs {
//!     for s in find_parallel_strategies(sub) {
//!         assert_eq!(s.world_size(), sub.device_count());
//!     }
//! }
//! ```

mod error;
mod mesh;
mod partition;
mod strategy;

pub use error::MeshError;
pub use mesh::{DeviceId, DeviceMesh};
pub use partition::{find_sub_device_meshes, is_all_overlap, is_any_overlap};
pub use strategy::{find_parallel_strategies, ParallelStrategy};
