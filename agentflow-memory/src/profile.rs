//! Compression profiles (§6 configuration surface): named presets and the
//! validation rules their fields must satisfy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named tuple of compression tunables, selecting how aggressively
/// [`crate::segmented::SegmentedMemory`] compresses L1 into L2 as budget
/// usage climbs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionProfile {
    /// Soft cap on L1 tokens before compression is favored.
    pub max_l1_tokens: u32,
    /// Minimum L1 messages retained after any compression.
    pub min_l1_messages: u32,
    /// Usage percentage (0-100) at which the warning batch size applies.
    pub warning_pct: u8,
    /// Usage percentage (0-100) at which the critical batch size applies.
    pub critical_pct: u8,
    /// Oldest-messages batch size compressed away under normal usage.
    pub normal_batch: u32,
    /// Batch size once usage has crossed `warning_pct`.
    pub warning_batch: u32,
    /// Batch size once usage has crossed `critical_pct`.
    pub critical_batch: u32,
}

/// Why a [`CompressionProfile`] failed validation.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    /// `max_l1_tokens` was zero or exceeded the 200k ceiling.
    #[error("max_l1_tokens must be in (0, 200000], got {0}")]
    MaxL1TokensOutOfRange(u32),
    /// `min_l1_messages` was zero or exceeded 20.
    #[error("min_l1_messages must be in (0, 20], got {0}")]
    MinL1MessagesOutOfRange(u32),
    /// A percentage field was outside `[0, 100]`.
    #[error("{field} must be in [0, 100], got {value}")]
    PercentageOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The out-of-range value.
        value: u8,
    },
    /// `critical_pct` did not exceed `warning_pct`.
    #[error("critical_pct ({critical}) must exceed warning_pct ({warning})")]
    CriticalNotAboveWarning {
        /// Configured critical percentage.
        critical: u8,
        /// Configured warning percentage.
        warning: u8,
    },
    /// Batch sizes were not non-decreasing by severity.
    #[error("batch sizes must be non-decreasing: normal {normal} <= warning {warning} <= critical {critical}")]
    BatchesNotMonotonic {
        /// Normal-severity batch size.
        normal: u32,
        /// Warning-severity batch size.
        warning: u32,
        /// Critical-severity batch size.
        critical: u32,
    },
    /// `critical_batch` exceeded 20.
    #[error("critical_batch must be <= 20, got {0}")]
    CriticalBatchTooLarge(u32),
}

impl CompressionProfile {
    /// Validate every field-level invariant from §6.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.max_l1_tokens == 0 || self.max_l1_tokens > 200_000 {
            return Err(ProfileError::MaxL1TokensOutOfRange(self.max_l1_tokens));
        }
        if self.min_l1_messages == 0 || self.min_l1_messages > 20 {
            return Err(ProfileError::MinL1MessagesOutOfRange(self.min_l1_messages));
        }
        if self.warning_pct > 100 {
            return Err(ProfileError::PercentageOutOfRange { field: "warning_pct", value: self.warning_pct });
        }
        if self.critical_pct > 100 {
            return Err(ProfileError::PercentageOutOfRange { field: "critical_pct", value: self.critical_pct });
        }
        if self.critical_pct <= self.warning_pct {
            return Err(ProfileError::CriticalNotAboveWarning {
                critical: self.critical_pct,
                warning: self.warning_pct,
            });
        }
        if !(self.normal_batch <= self.warning_batch && self.warning_batch <= self.critical_batch) {
            return Err(ProfileError::BatchesNotMonotonic {
                normal: self.normal_batch,
                warning: self.warning_batch,
                critical: self.critical_batch,
            });
        }
        if self.critical_batch > 20 {
            return Err(ProfileError::CriticalBatchTooLarge(self.critical_batch));
        }
        Ok(())
    }

    /// The `balanced` preset: moderate L1 window, middling batch sizes.
    pub fn balanced() -> Self {
        Self {
            max_l1_tokens: 8,
            min_l1_messages: 4,
            warning_pct: 60,
            critical_pct: 75,
            normal_batch: 3,
            warning_batch: 5,
            critical_batch: 7,
        }
    }

    /// The `data_intensive` preset: small L1 window so bulky tool results
    /// get compressed away quickly; tighter thresholds.
    pub fn data_intensive() -> Self {
        Self {
            max_l1_tokens: 5,
            min_l1_messages: 3,
            warning_pct: 50,
            critical_pct: 70,
            normal_batch: 2,
            warning_batch: 4,
            critical_batch: 6,
        }
    }

    /// The `conversational` preset: larger L1 window, later thresholds, for
    /// sessions dominated by back-and-forth text rather than tool output.
    pub fn conversational() -> Self {
        Self {
            max_l1_tokens: 12,
            min_l1_messages: 6,
            warning_pct: 70,
            critical_pct: 85,
            normal_batch: 4,
            warning_batch: 6,
            critical_batch: 8,
        }
    }
}

impl Default for CompressionProfile {
    fn default() -> Self {
        Self::balanced()
    }
}

/// Minimal profile used by [`dynamic_allocation`] when the remaining
/// context budget is too small for any named preset.
pub(crate) fn minimal_profile() -> CompressionProfile {
    CompressionProfile {
        max_l1_tokens: 1_000,
        min_l1_messages: 2,
        warning_pct: 60,
        critical_pct: 75,
        normal_batch: 2,
        warning_batch: 3,
        critical_batch: 4,
    }
}

/// Result of sizing L1/L2 token ceilings against a total context budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicAllocation {
    /// Token ceiling to apply as the profile's `max_l1_tokens`.
    pub l1_tokens: u64,
    /// Token ceiling for L2 before overflow is snapshotted to swap.
    pub l2_tokens: u64,
    /// Whether the remainder was too small for the requested profile and the
    /// minimal fallback was used instead.
    pub used_minimal: bool,
}

/// Size L1/L2 ceilings for a session given its total context budget.
///
/// Reserves `reserved_output` tokens for the model's response and deducts
/// `rom_tokens` + `kernel_estimate` from the remainder before allocating.
/// If what's left is under 4,000 tokens, falls back to the minimal profile's
/// fixed sizes; otherwise allocates 60% of the remainder to L1 (scaled by
/// `profile_multiplier`) and 10% to L2.
pub fn dynamic_allocation(
    total_context: u64,
    reserved_output: u64,
    rom_tokens: u64,
    kernel_estimate: u64,
    profile_multiplier: f64,
) -> DynamicAllocation {
    let remainder = total_context
        .saturating_sub(reserved_output)
        .saturating_sub(rom_tokens)
        .saturating_sub(kernel_estimate);

    if remainder < 4_000 {
        let minimal = minimal_profile();
        return DynamicAllocation {
            l1_tokens: minimal.max_l1_tokens as u64,
            l2_tokens: 500,
            used_minimal: true,
        };
    }

    let l1_tokens = (remainder as f64 * 0.60 * profile_multiplier).round() as u64;
    let l2_tokens = (remainder as f64 * 0.10).round() as u64;
    DynamicAllocation { l1_tokens, l2_tokens, used_minimal: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        CompressionProfile::balanced().validate().unwrap();
        CompressionProfile::data_intensive().validate().unwrap();
        CompressionProfile::conversational().validate().unwrap();
        minimal_profile().validate().unwrap();
    }

    #[test]
    fn rejects_critical_not_above_warning() {
        let mut p = CompressionProfile::balanced();
        p.critical_pct = p.warning_pct;
        assert_eq!(
            p.validate(),
            Err(ProfileError::CriticalNotAboveWarning { critical: p.critical_pct, warning: p.warning_pct })
        );
    }

    #[test]
    fn rejects_non_monotonic_batches() {
        let mut p = CompressionProfile::balanced();
        p.warning_batch = p.normal_batch - 1;
        assert!(matches!(p.validate(), Err(ProfileError::BatchesNotMonotonic { .. })));
    }

    #[test]
    fn rejects_oversized_critical_batch() {
        let mut p = CompressionProfile::balanced();
        p.critical_batch = 21;
        p.warning_batch = 21;
        assert_eq!(p.validate(), Err(ProfileError::CriticalBatchTooLarge(21)));
    }

    #[test]
    fn dynamic_allocation_falls_back_to_minimal_under_small_remainder() {
        let allocation = dynamic_allocation(5_000, 1_000, 200, 100, 1.0);
        assert!(allocation.used_minimal);
    }

    #[test]
    fn dynamic_allocation_scales_with_remainder() {
        let allocation = dynamic_allocation(100_000, 8_000, 500, 200, 1.0);
        assert!(!allocation.used_minimal);
        let remainder = 100_000u64 - 8_000 - 500 - 200;
        assert_eq!(allocation.l1_tokens, (remainder as f64 * 0.60).round() as u64);
        assert_eq!(allocation.l2_tokens, (remainder as f64 * 0.10).round() as u64);
    }

    #[test]
    fn rejects_zero_min_l1_messages() {
        let mut p = CompressionProfile::balanced();
        p.min_l1_messages = 0;
        assert_eq!(p.validate(), Err(ProfileError::MinL1MessagesOutOfRange(0)));
    }

    proptest::proptest! {
        #[test]
        fn any_validated_profile_satisfies_quantified_invariants(
            max_l1_tokens in 1u32..=200_000,
            min_l1_messages in 1u32..=20,
            warning_pct in 0u8..=99,
            critical_pct in 1u8..=100,
            normal_batch in 0u32..=20,
            extra_warning in 0u32..=5,
            extra_critical in 0u32..=5,
        ) {
            let warning_batch = normal_batch + extra_warning;
            let critical_batch = (warning_batch + extra_critical).min(20);
            let profile = CompressionProfile {
                max_l1_tokens,
                min_l1_messages,
                warning_pct,
                critical_pct: critical_pct.max(warning_pct + 1).min(100),
                normal_batch,
                warning_batch,
                critical_batch,
            };
            if profile.validate().is_ok() {
                proptest::prop_assert!(profile.max_l1_tokens > 0 && profile.max_l1_tokens <= 200_000);
                proptest::prop_assert!(profile.min_l1_messages > 0 && profile.min_l1_messages <= 20);
                proptest::prop_assert!(profile.warning_pct <= profile.critical_pct && profile.critical_pct <= 100);
                proptest::prop_assert!(profile.normal_batch <= profile.warning_batch);
                proptest::prop_assert!(profile.warning_batch <= profile.critical_batch);
                proptest::prop_assert!(profile.critical_batch <= 20);
            }
        }
    }
}
