// crates/aludel-engine/src/constants.rs
//
// Fixed protocol parameters. These are compiled into the program template and
// shared by every instance cloned from it.

/// Reward shares minted per wei of net funding. Shares decay over long
/// schedules; the scale keeps that decay from truncating to zero.
pub const BASE_SHARES_PER_WEI: u64 = 1_000_000;

/// Maximum concurrent stake records per vault. Bounds the rage-quit cost.
pub const MAX_STAKES_PER_VAULT: usize = 30;

/// Maximum number of registered bonus tokens.
pub const MAX_BONUS_TOKENS: usize = 50;

/// Default protocol fee on funding, in basis points (1%).
pub const DEFAULT_FEE_BPS: u16 = 100;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Denominator of reward-scaling percentages.
pub const SCALING_PERCENT: u64 = 100;

/// Gas a vault forwards to the delegate's rage-quit handler.
pub const RAGEQUIT_GAS: u64 = 500_000;

/// Gas the vault itself spends before forwarding the rage-quit notification.
pub const VAULT_RAGEQUIT_OVERHEAD: u64 = 30_000;

/// Fixed program-side cost of a rage quit.
pub const RAGEQUIT_BASE_COST: u64 = 25_000;

/// Program-side cost per stake record released by a rage quit.
pub const RAGEQUIT_COST_PER_STAKE: u64 = 15_000;

/// One day in seconds.
pub const DAY: u64 = 24 * 3600;

/// Worst-case program-side rage-quit cost for a vault holding `records` stakes.
pub const fn rage_quit_cost(records: usize) -> u64 {
    RAGEQUIT_BASE_COST + RAGEQUIT_COST_PER_STAKE * records as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_stakes_fit_rage_quit_budget() {
        assert!(rage_quit_cost(MAX_STAKES_PER_VAULT) <= RAGEQUIT_GAS);
    }

    #[test]
    fn test_fee_below_denominator() {
        assert!((DEFAULT_FEE_BPS as u64) < BPS_DENOMINATOR);
    }
}
