// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-device memory ceilings and their parsing.

use crate::MemoryError;
use std::fmt;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

/// A hard per-device memory ceiling (e.g. `GPU_MEM_CAP`).
///
/// # Parsing
/// Binary suffixes, case-insensitive, with an optional trailing `B` or `iB`:
/// - `"80G"`, `"80GB"`, `"80GiB"` → 80 × 1024³ bytes
/// - `"512M"` → 512 × 1024² bytes
/// - `"1T"` → 1024⁴ bytes
/// - `"1073741824"` → raw byte count
///
/// # Examples
/// ```
/// use memory_accounting::MemoryBudget;
///
/// let cap = MemoryBudget::parse("80G").unwrap();
/// assert_eq!(cap, MemoryBudget::from_gib(80));
/// assert_eq!(cap.to_string(), "80 GiB");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct MemoryBudget {
    bytes: u64,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    pub fn from_mib(mib: u64) -> Self {
        Self { bytes: mib * MIB }
    }

    pub fn from_gib(gib: u64) -> Self {
        Self { bytes: gib * GIB }
    }

    pub fn as_bytes(&self) -> u64 {
        self.bytes
    }

    /// Budget in GiB, for display.
    pub fn as_gib(&self) -> f64 {
        self.bytes as f64 / GIB as f64
    }

    /// The budget multiplied by `factor` (e.g. a search margin of 1.2).
    pub fn scaled(&self, factor: f64) -> Result<Self, MemoryError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(MemoryError::InvalidFactor(factor));
        }
        Ok(Self {
            bytes: (self.bytes as f64 * factor) as u64,
        })
    }

    /// Returns `true` if `bytes` stays strictly below the budget.
    pub fn fits(&self, bytes: u64) -> bool {
        bytes < self.bytes
    }

    /// Parses a human-readable budget string.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let input = s.trim();
        if input.is_empty() {
            return Err(MemoryError::InvalidBudget {
                input: s.to_string(),
                detail: "empty string".into(),
            });
        }

        let upper = input.to_uppercase();
        let unit_part = upper
            .trim_end_matches("IB")
            .trim_end_matches('B');
        let (digits, multiplier) = match unit_part.chars().last() {
            Some('K') => (&unit_part[..unit_part.len() - 1], KIB),
            Some('M') => (&unit_part[..unit_part.len() - 1], MIB),
            Some('G') => (&unit_part[..unit_part.len() - 1], GIB),
            Some('T') => (&unit_part[..unit_part.len() - 1], TIB),
            _ => (unit_part, 1),
        };

        let value: u64 = digits.trim().parse().map_err(|_| MemoryError::InvalidBudget {
            input: input.to_string(),
            detail: "expected a number followed by an optional K, M, G or T suffix".into(),
        })?;

        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| MemoryError::InvalidBudget {
                input: input.to_string(),
                detail: "overflows 64 bits".into(),
            })?;

        if bytes == 0 {
            return Err(MemoryError::ZeroBudget);
        }

        Ok(Self { bytes })
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (unit, name) in [(TIB, "TiB"), (GIB, "GiB"), (MIB, "MiB"), (KIB, "KiB")] {
            if self.bytes >= unit && self.bytes % unit == 0 {
                return write!(f, "{} {name}", self.bytes / unit);
            }
        }
        if self.bytes >= GIB {
            write!(f, "{:.2} GiB", self.as_gib())
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(MemoryBudget::from_gib(2).as_bytes(), 2 * GIB);
        assert_eq!(MemoryBudget::from_mib(512).as_bytes(), 512 * MIB);
        assert_eq!(MemoryBudget::from_gib(80).as_gib(), 80.0);
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(MemoryBudget::parse("80G").unwrap(), MemoryBudget::from_gib(80));
        assert_eq!(MemoryBudget::parse("80GB").unwrap(), MemoryBudget::from_gib(80));
        assert_eq!(MemoryBudget::parse("80GiB").unwrap(), MemoryBudget::from_gib(80));
        assert_eq!(MemoryBudget::parse("80g").unwrap(), MemoryBudget::from_gib(80));
        assert_eq!(MemoryBudget::parse("512M").unwrap(), MemoryBudget::from_mib(512));
        assert_eq!(MemoryBudget::parse("4K").unwrap().as_bytes(), 4096);
        assert_eq!(MemoryBudget::parse("1T").unwrap().as_bytes(), TIB);
    }

    #[test]
    fn test_parse_raw_bytes() {
        assert_eq!(MemoryBudget::parse("1048576").unwrap().as_bytes(), MIB);
        assert_eq!(MemoryBudget::parse("100B").unwrap().as_bytes(), 100);
        assert_eq!(MemoryBudget::parse("  16G  ").unwrap(), MemoryBudget::from_gib(16));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(MemoryBudget::parse("").is_err());
        assert!(MemoryBudget::parse("abc").is_err());
        assert!(MemoryBudget::parse("1.5G").is_err());
        assert!(matches!(MemoryBudget::parse("0G"), Err(MemoryError::ZeroBudget)));
        assert!(MemoryBudget::parse("99999999999T").is_err());
    }

    #[test]
    fn test_scaled() {
        let cap = MemoryBudget::from_gib(80);
        assert_eq!(cap.scaled(1.0).unwrap(), cap);
        assert_eq!(cap.scaled(1.5).unwrap(), MemoryBudget::from_gib(120));
        assert!(cap.scaled(0.0).is_err());
        assert!(cap.scaled(f64::NAN).is_err());
    }

    #[test]
    fn test_fits_is_strict() {
        let cap = MemoryBudget::from_bytes(100);
        assert!(cap.fits(99));
        assert!(!cap.fits(100));
    }

    #[test]
    fn test_display() {
        assert_eq!(MemoryBudget::from_gib(80).to_string(), "80 GiB");
        assert_eq!(MemoryBudget::from_mib(512).to_string(), "512 MiB");
        assert_eq!(MemoryBudget::from_bytes(2048).to_string(), "2 KiB");
        assert_eq!(MemoryBudget::from_bytes(100).to_string(), "100 B");
    }

    #[test]
    fn test_serde_roundtrip() {
        let b = MemoryBudget::from_gib(40);
        let json = serde_json::to_string(&b).unwrap();
        let back: MemoryBudget = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }
}
