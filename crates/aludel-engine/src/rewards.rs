// crates/aludel-engine/src/rewards.rs
//
// Reward computation for unstakes.
//
// For each record being withdrawn:
//   1. stake units burned = amount * (now - record.timestamp)
//   2. base reward = available reward * units burned / total stake units
//   3. the scaling curve is applied using that record's own duration
//
// A multi-record unstake runs the records in the order given. Each record is
// priced against the reward and stake units left over by the ones before it,
// which keeps the sum of payouts within the reward that was available.

use std::collections::HashSet;

use aludel_core::error::{checked_add, checked_mul, checked_sub, mul_div};
use aludel_core::{AludelError, Timestamp, U256};

use crate::scaling::RewardScaling;
use crate::stakes::{RecordUpdate, StakeRecord};

/// Reward owed for burning `stake_units` out of `total_stake_units`.
///
/// Returns zero when either side of the ratio is zero, so a stake withdrawn
/// in the same second it was made earns nothing.
pub fn calculate_reward(
    reward_available: U256,
    stake_units: U256,
    total_stake_units: U256,
    stake_duration: u64,
    scaling: &RewardScaling,
) -> Result<U256, AludelError> {
    if stake_units.is_zero() || total_stake_units.is_zero() {
        return Ok(U256::ZERO);
    }
    let base_reward = mul_div(reward_available, stake_units, total_stake_units)?;
    scaling.apply(base_reward, stake_duration)
}

/// Pro-rata share of a bonus token's pool balance.
pub fn bonus_share(
    pool_balance: U256,
    stake_units_burned: U256,
    total_stake_units: U256,
) -> Result<U256, AludelError> {
    if stake_units_burned.is_zero() || total_stake_units.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div(pool_balance, stake_units_burned, total_stake_units)
}

/// What a single record contributes to an unstake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPayout {
    pub index: usize,
    pub amount: U256,
    pub stake_units: U256,
    pub duration: u64,
    pub reward: U256,
}

/// The fully priced result of an unstake, before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnstakeOutcome {
    /// Total staking tokens released.
    pub amount: U256,
    pub stake_units_burned: U256,
    /// Reward tokens paid, in wei.
    pub reward: U256,
    pub payouts: Vec<RecordPayout>,
    pub updates: Vec<RecordUpdate>,
}

/// Check the shape of an unstake request against a vault's records.
///
/// # Errors
/// - `InsufficientVaultStake` if the vault holds no records.
/// - `InvalidAmountArray` for empty or mismatched arrays, duplicate or
///   out-of-range indices, or an amount larger than its record.
/// - `NoAmountUnstaked` for any zero amount.
pub fn validate_unstake(
    records: &[StakeRecord],
    indices: &[usize],
    amounts: &[U256],
) -> Result<(), AludelError> {
    if records.is_empty() {
        return Err(AludelError::InsufficientVaultStake);
    }
    if indices.is_empty() || indices.len() != amounts.len() {
        return Err(AludelError::InvalidAmountArray);
    }
    let mut seen = HashSet::with_capacity(indices.len());
    for (&index, amount) in indices.iter().zip(amounts) {
        if amount.is_zero() {
            return Err(AludelError::NoAmountUnstaked);
        }
        let record = records.get(index).ok_or(AludelError::InvalidAmountArray)?;
        if !seen.insert(index) || *amount > record.amount {
            return Err(AludelError::InvalidAmountArray);
        }
    }
    Ok(())
}

/// Price an unstake of `amounts[i]` from record `indices[i]`.
///
/// `total_stake_units` must already include everything accrued up to `now`.
pub fn compute_unstake(
    records: &[StakeRecord],
    indices: &[usize],
    amounts: &[U256],
    now: Timestamp,
    reward_available: U256,
    total_stake_units: U256,
    scaling: &RewardScaling,
) -> Result<UnstakeOutcome, AludelError> {
    validate_unstake(records, indices, amounts)?;

    let mut remaining_reward = reward_available;
    let mut remaining_units = total_stake_units;
    let mut outcome = UnstakeOutcome {
        amount: U256::ZERO,
        stake_units_burned: U256::ZERO,
        reward: U256::ZERO,
        payouts: Vec::with_capacity(indices.len()),
        updates: Vec::with_capacity(indices.len()),
    };

    for (&index, &amount) in indices.iter().zip(amounts) {
        let record = &records[index];
        let duration = record.duration_at(now);
        let stake_units = checked_mul(amount, U256::from(duration))?;
        let reward = calculate_reward(
            remaining_reward,
            stake_units,
            remaining_units,
            duration,
            scaling,
        )?;
        tracing::debug!(index, duration, %stake_units, %reward, "Priced stake record");

        remaining_reward = checked_sub(remaining_reward, reward)?;
        remaining_units = checked_sub(remaining_units, stake_units)?;

        outcome.amount = checked_add(outcome.amount, amount)?;
        outcome.stake_units_burned = checked_add(outcome.stake_units_burned, stake_units)?;
        outcome.reward = checked_add(outcome.reward, reward)?;
        outcome.payouts.push(RecordPayout {
            index,
            amount,
            stake_units,
            duration,
            reward,
        });
        outcome.updates.push(RecordUpdate {
            index,
            remaining: checked_sub(record.amount, amount)?,
        });
    }

    Ok(outcome)
}
