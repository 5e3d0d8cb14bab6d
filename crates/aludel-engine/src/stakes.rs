// crates/aludel-engine/src/stakes.rs
//
// Stake ledger and lazy stake-unit accrual.
//
// A stake unit is `amount * seconds held`. Rather than ticking every second,
// the ledger keeps `total_stake_units` as of `last_update` and folds in
// `total_stake * (now - last_update)` whenever a mutating call touches it.

use std::collections::BTreeMap;

use aludel_core::error::{checked_add, checked_mul, checked_sub};
use aludel_core::{Address, AludelError, Timestamp, U256};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_STAKES_PER_VAULT;

/// One deposit into the program by a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRecord {
    pub amount: U256,
    pub timestamp: Timestamp,
}

impl StakeRecord {
    /// Seconds this record has been held at `now`.
    pub fn duration_at(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    /// `amount * (now - timestamp)`.
    pub fn stake_units_at(&self, now: Timestamp) -> Result<U256, AludelError> {
        checked_mul(self.amount, U256::from(self.duration_at(now)))
    }
}

/// Per-vault stake state, in stake order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultData {
    pub total_stake: U256,
    pub stakes: Vec<StakeRecord>,
}

impl VaultData {
    /// Σ stake units of every record in the vault at `now`.
    pub fn stake_units_at(&self, now: Timestamp) -> Result<U256, AludelError> {
        self.stakes
            .iter()
            .try_fold(U256::ZERO, |acc, r| checked_add(acc, r.stake_units_at(now)?))
    }
}

/// Replacement amounts for the records touched by an unstake.
///
/// Indices refer to positions before the unstake is applied. A zero amount
/// means the record is fully consumed and must be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub index: usize,
    pub remaining: U256,
}

/// Aggregate stake state for one program instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakeLedger {
    total_stake: U256,
    total_stake_units: U256,
    last_update: Timestamp,
    vaults: BTreeMap<Address, VaultData>,
}

impl StakeLedger {
    pub fn new(now: Timestamp) -> Self {
        Self {
            last_update: now,
            ..Self::default()
        }
    }

    pub fn total_stake(&self) -> U256 {
        self.total_stake
    }

    /// Stake units as of `last_update`.
    pub fn total_stake_units(&self) -> U256 {
        self.total_stake_units
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    pub fn vault(&self, vault: Address) -> Option<&VaultData> {
        self.vaults.get(&vault)
    }

    /// Number of stake records held by `vault`.
    pub fn record_count(&self, vault: Address) -> usize {
        self.vaults.get(&vault).map_or(0, |v| v.stakes.len())
    }

    /// Total stake units as they would be at `at`, without mutating.
    pub fn total_stake_units_at(&self, at: Timestamp) -> Result<U256, AludelError> {
        let elapsed = at.saturating_sub(self.last_update);
        let accrued = checked_mul(self.total_stake, U256::from(elapsed))?;
        checked_add(self.total_stake_units, accrued)
    }

    /// Fold the stake units accrued since `last_update` into the total.
    pub fn accrue(&mut self, now: Timestamp) -> Result<(), AludelError> {
        let total = self.total_stake_units_at(now)?;
        tracing::debug!(
            last_update = self.last_update,
            now,
            total_stake_units = %total,
            "Accrued stake units"
        );
        self.total_stake_units = total;
        self.last_update = self.last_update.max(now);
        Ok(())
    }

    /// Append a stake record for `vault`.
    ///
    /// The caller must have accrued to `now` first.
    ///
    /// # Errors
    /// Returns `MaxStakesReached` if the vault already holds
    /// `MAX_STAKES_PER_VAULT` records.
    pub fn add_stake(
        &mut self,
        vault: Address,
        amount: U256,
        now: Timestamp,
    ) -> Result<(), AludelError> {
        let total_stake = checked_add(self.total_stake, amount)?;
        let data = self.vaults.entry(vault).or_default();
        if data.stakes.len() >= MAX_STAKES_PER_VAULT {
            return Err(AludelError::MaxStakesReached);
        }
        data.total_stake = checked_add(data.total_stake, amount)?;
        data.stakes.push(StakeRecord {
            amount,
            timestamp: now,
        });
        self.total_stake = total_stake;
        Ok(())
    }

    /// Apply the record updates of an unstake and burn its stake units.
    ///
    /// Fully consumed records are removed highest index first so the
    /// remaining records keep their relative order.
    pub fn apply_unstake(
        &mut self,
        vault: Address,
        updates: &[RecordUpdate],
        amount_unstaked: U256,
        stake_units_burned: U256,
    ) -> Result<(), AludelError> {
        let data = self
            .vaults
            .get_mut(&vault)
            .ok_or(AludelError::InsufficientVaultStake)?;

        for update in updates {
            let record = data
                .stakes
                .get_mut(update.index)
                .ok_or(AludelError::InvalidAmountArray)?;
            record.amount = update.remaining;
        }

        let mut emptied: Vec<usize> = updates
            .iter()
            .filter(|u| u.remaining.is_zero())
            .map(|u| u.index)
            .collect();
        emptied.sort_unstable_by(|a, b| b.cmp(a));
        for index in emptied {
            data.stakes.remove(index);
        }

        data.total_stake = checked_sub(data.total_stake, amount_unstaked)?;
        if data.stakes.is_empty() {
            self.vaults.remove(&vault);
        }
        self.total_stake = checked_sub(self.total_stake, amount_unstaked)?;
        self.total_stake_units = checked_sub(self.total_stake_units, stake_units_burned)?;
        Ok(())
    }

    /// Drop every record of `vault` and return the removed data together with
    /// the stake units it had accrued.
    ///
    /// The caller must have accrued to `now` first.
    pub fn remove_vault(
        &mut self,
        vault: Address,
        now: Timestamp,
    ) -> Result<Option<(VaultData, U256)>, AludelError> {
        let Some(data) = self.vaults.get(&vault) else {
            return Ok(None);
        };
        let units = data.stake_units_at(now)?;
        let total_stake = checked_sub(self.total_stake, data.total_stake)?;
        let total_units = checked_sub(self.total_stake_units, units)?;

        let data = self.vaults.remove(&vault).unwrap_or_default();
        self.total_stake = total_stake;
        self.total_stake_units = total_units;
        Ok(Some((data, units)))
    }
}
