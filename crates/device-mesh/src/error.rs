// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for mesh construction and parsing.

/// Errors that can occur when describing device meshes.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// A mesh name could not be parsed.
    #[error("invalid mesh name '{name}': {detail}")]
    ParseError { name: String, detail: String },

    /// The mesh dimensions are inconsistent with the cluster shape.
    #[error("invalid device mesh: {0}")]
    InvalidMesh(String),

    /// A parallel strategy has a zero degree.
    #[error("invalid parallel strategy: {0}")]
    InvalidStrategy(String),
}
