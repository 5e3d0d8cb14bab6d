// crates/aludel-engine/src/scaling.rs
//
// Reward scaling curve.
//
// A stake held for less than `time` seconds earns `floor`% of its base
// reward plus a linear share of the remaining `ceiling - floor`% proportional
// to how long it was held. At or beyond `time` it earns the full base reward.

use aludel_core::error::{checked_add, checked_mul, mul_div};
use aludel_core::{AludelError, U256};
use serde::{Deserialize, Serialize};

use crate::constants::SCALING_PERCENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardScaling {
    /// Minimum percentage paid regardless of duration.
    pub floor: u64,
    /// Percentage approached as duration approaches `time`.
    pub ceiling: u64,
    /// Seconds until the full base reward is earned.
    pub time: u64,
}

impl RewardScaling {
    pub fn new(floor: u64, ceiling: u64, time: u64) -> Result<Self, AludelError> {
        let scaling = Self {
            floor,
            ceiling,
            time,
        };
        scaling.validate()?;
        Ok(scaling)
    }

    /// Enforce `floor <= ceiling` and `time >= 1`.
    pub fn validate(&self) -> Result<(), AludelError> {
        if self.floor > self.ceiling || self.time == 0 {
            return Err(AludelError::InvalidScaling {
                floor: self.floor,
                ceiling: self.ceiling,
                time: self.time,
            });
        }
        Ok(())
    }

    /// Apply the curve to `base_reward` for a stake held `stake_duration` seconds.
    ///
    /// Below the boundary the two terms are always computed separately in the
    /// order `base*floor/100 + base*(ceiling-floor)*duration/(time*100)`, even
    /// when `floor == ceiling`, so outputs match the deployed program to the wei.
    pub fn apply(&self, base_reward: U256, stake_duration: u64) -> Result<U256, AludelError> {
        if stake_duration >= self.time {
            return Ok(base_reward);
        }
        let percent = U256::from(SCALING_PERCENT);
        let min_reward = mul_div(base_reward, U256::from(self.floor), percent)?;
        let spread = checked_mul(base_reward, U256::from(self.ceiling - self.floor))?;
        let bonus_reward = mul_div(
            spread,
            U256::from(stake_duration),
            checked_mul(U256::from(self.time), percent)?,
        )?;
        checked_add(min_reward, bonus_reward)
    }
}
