//! Tier policy: the next capacity step for a resource.
//!
//! # Scaling Algorithm
//!
//! ```text
//! cpu:    next = min(current + 1, MAX_CPU_COUNT)
//! memory: exp  = floor(log2(current_mb)) + 1
//!         next = 2 ^ min(exp, MAX_MEMORY_EXPONENT)
//! ```
//!
//! CPU tiers are linear with a small hard ceiling. Memory tiers double
//! each step. Both are emitted as decimal strings because they are matched
//! against tag names.

use crate::types::{ResourceCategory, TierName, VmHardware};

/// Highest CPU count a VM may be tiered to.
pub const MAX_CPU_COUNT: u32 = 4;

/// Highest memory tier, as a power of two in MB (2^23 MB).
pub const MAX_MEMORY_EXPONENT: u32 = 23;

/// Next CPU tier above `current`, capped at `MAX_CPU_COUNT`.
pub fn next_cpu_tier(current: u32) -> TierName {
    let next = current.saturating_add(1).min(MAX_CPU_COUNT);
    TierName::new(next.to_string())
}

/// Next memory tier above `current_mb`, capped at `2^MAX_MEMORY_EXPONENT`.
///
/// Readings below 1 MB (zero, negative, NaN) are treated as 1 MB.
pub fn next_memory_tier(current_mb: f64) -> TierName {
    let clamped = if current_mb >= 1.0 { current_mb } else { 1.0 };
    // `as` saturates: infinity becomes u32::MAX and is capped below.
    let exponent = (clamped.log2().floor() as u32).saturating_add(1);
    let next = 1u64 << exponent.min(MAX_MEMORY_EXPONENT);
    TierName::new(next.to_string())
}

/// Tier name for the given category, or `None` for unclassified alarms.
pub fn next_tier(category: ResourceCategory, hardware: &VmHardware) -> Option<TierName> {
    match category {
        ResourceCategory::Cpu => Some(next_cpu_tier(hardware.num_cpu)),
        ResourceCategory::Memory => Some(next_memory_tier(hardware.memory_mb as f64)),
        ResourceCategory::Unclassified => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_increments_by_one() {
        assert_eq!(next_cpu_tier(0).as_str(), "1");
        assert_eq!(next_cpu_tier(1).as_str(), "2");
        assert_eq!(next_cpu_tier(2).as_str(), "3");
        assert_eq!(next_cpu_tier(3).as_str(), "4");
    }

    #[test]
    fn cpu_is_capped() {
        assert_eq!(next_cpu_tier(4).as_str(), "4");
        assert_eq!(next_cpu_tier(10).as_str(), "4");
        assert_eq!(next_cpu_tier(u32::MAX).as_str(), "4");
    }

    #[test]
    fn cpu_matches_min_formula() {
        for n in 0..64u32 {
            assert_eq!(next_cpu_tier(n).as_str(), (n + 1).min(4).to_string());
        }
    }

    #[test]
    fn memory_doubles_powers_of_two() {
        for k in 0..MAX_MEMORY_EXPONENT {
            let current = (1u64 << k) as f64;
            let expected = (1u64 << (k + 1)).to_string();
            assert_eq!(next_memory_tier(current).as_str(), expected, "k = {k}");
        }
        assert_eq!(next_memory_tier(4096.0).as_str(), "8192");
    }

    #[test]
    fn memory_rounds_down_between_powers() {
        // floor(log2(3000)) = 11, next = 2^12.
        assert_eq!(next_memory_tier(3000.0).as_str(), "4096");
        assert_eq!(next_memory_tier(6144.0).as_str(), "8192");
    }

    #[test]
    fn memory_is_capped() {
        let ceiling = (1u64 << MAX_MEMORY_EXPONENT).to_string();
        assert_eq!(next_memory_tier((1u64 << 23) as f64).as_str(), ceiling);
        assert_eq!(next_memory_tier((1u64 << 22) as f64).as_str(), ceiling);
        assert_eq!(next_memory_tier((1u64 << 30) as f64).as_str(), ceiling);
        assert_eq!(next_memory_tier(f64::INFINITY).as_str(), ceiling);
    }

    #[test]
    fn memory_below_one_mb_is_clamped() {
        assert_eq!(next_memory_tier(0.0).as_str(), "2");
        assert_eq!(next_memory_tier(-512.0).as_str(), "2");
        assert_eq!(next_memory_tier(0.5).as_str(), "2");
        assert_eq!(next_memory_tier(f64::NAN).as_str(), "2");
    }

    #[test]
    fn next_tier_picks_policy_by_category() {
        let hw = VmHardware {
            num_cpu: 2,
            memory_mb: 4096,
        };
        assert_eq!(next_tier(ResourceCategory::Cpu, &hw), Some(TierName::new("3")));
        assert_eq!(next_tier(ResourceCategory::Memory, &hw), Some(TierName::new("8192")));
        assert_eq!(next_tier(ResourceCategory::Unclassified, &hw), None);
    }
}
