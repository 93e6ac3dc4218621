// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for memory budgets.

/// Errors that can occur when building a memory budget.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The budget string could not be parsed.
    #[error("invalid memory budget '{input}': {detail}")]
    InvalidBudget { input: String, detail: String },

    /// A zero-byte budget was requested.
    #[error("memory budget must be positive")]
    ZeroBudget,

    /// A safety factor was not a positive finite number.
    #[error("invalid memory scale factor {0}")]
    InvalidFactor(f64),
}
