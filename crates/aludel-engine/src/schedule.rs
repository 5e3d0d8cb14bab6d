// crates/aludel-engine/src/schedule.rs
//
// Reward schedule ledger.
//
// Each funding event appends a schedule whose shares unlock linearly over
// [start, start + duration]. Schedules are never edited after creation, so a
// new funding can never change obligations that have already accrued.
//
// All divisions truncate toward zero. Unlocked shares are rounded down, which
// means locked shares are rounded up: the last unit of rounding always stays
// with the pool rather than the claimant.

use aludel_core::error::{checked_add, checked_sub, mul_div};
use aludel_core::{AludelError, Timestamp, U256};
use serde::{Deserialize, Serialize};

/// A single funding event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    pub start: Timestamp,
    pub duration: u64,
    pub shares: U256,
}

impl RewardSchedule {
    /// Shares of this schedule unlocked at `now`.
    ///
    /// Zero before `start`, all `shares` once the duration has fully elapsed.
    pub fn unlocked_at(&self, now: Timestamp) -> Result<U256, AludelError> {
        if now <= self.start {
            return Ok(U256::ZERO);
        }
        // `fund` rejects zero durations; treat one as unlocked immediately.
        if self.duration == 0 {
            return Ok(self.shares);
        }
        let elapsed = (now - self.start).min(self.duration);
        mul_div(self.shares, U256::from(elapsed), U256::from(self.duration))
    }

    /// Shares of this schedule still locked at `now`.
    pub fn locked_at(&self, now: Timestamp) -> Result<U256, AludelError> {
        checked_sub(self.shares, self.unlocked_at(now)?)
    }

    pub fn end(&self) -> Timestamp {
        self.start.saturating_add(self.duration)
    }
}

/// Σ over schedules of `shares * min(now - start, duration) / duration`.
pub fn unlocked_shares(schedules: &[RewardSchedule], now: Timestamp) -> Result<U256, AludelError> {
    schedules
        .iter()
        .try_fold(U256::ZERO, |acc, s| checked_add(acc, s.unlocked_at(now)?))
}

/// Σ over schedules of the shares still locked at `now`.
pub fn locked_shares(schedules: &[RewardSchedule], now: Timestamp) -> Result<U256, AludelError> {
    schedules
        .iter()
        .try_fold(U256::ZERO, |acc, s| checked_add(acc, s.locked_at(now)?))
}

/// Outstanding shares that are unlocked at `now`: what has not yet been
/// redeemed minus what is still vesting.
///
/// Saturates at zero: truncation can leave locked shares one unit above the
/// outstanding balance once most of a schedule has been redeemed.
pub fn redeemable_shares(
    schedules: &[RewardSchedule],
    shares_outstanding: U256,
    now: Timestamp,
) -> Result<U256, AludelError> {
    let locked = locked_shares(schedules, now)?;
    Ok(shares_outstanding.saturating_sub(locked))
}
