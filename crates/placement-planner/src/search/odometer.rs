// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Mixed-radix cursor over the assignment space.

/// One cursor per call, each into that call's candidate list.
///
/// # Invariants
/// - `radix[i] >= 1` and `index[i] < radix[i]` for every `i`.
/// - Successive states visited via [`advance`](Self::advance) are strictly
///   increasing in lexicographic order, so the walk terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Odometer {
    index: Vec<usize>,
    radix: Vec<usize>,
}

impl Odometer {
    /// Starts at all-zeros. Returns `None` if any digit has no values.
    pub fn new(radix: Vec<usize>) -> Option<Self> {
        if radix.is_empty() || radix.contains(&0) {
            return None;
        }
        Some(Self {
            index: vec![0; radix.len()],
            radix,
        })
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Increments digit `pivot`, carrying leftwards on overflow, and zeroes
    /// every digit to the right of the one that was incremented.
    ///
    /// Advancing at `pivot < len - 1` skips every state that shares the
    /// prefix `index[..=pivot]`. Returns `false` once the carry runs past
    /// digit 0; the state is then left unchanged.
    pub fn advance(&mut self, pivot: usize) -> bool {
        let mut digit = pivot.min(self.index.len() - 1);
        loop {
            if self.index[digit] + 1 < self.radix[digit] {
                self.index[digit] += 1;
                for d in &mut self.index[digit + 1..] {
                    *d = 0;
                }
                return true;
            }
            if digit == 0 {
                return false;
            }
            digit -= 1;
        }
    }
}
