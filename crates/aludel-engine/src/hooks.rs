// crates/aludel-engine/src/hooks.rs
//
// Optional stake hooks consulted before a program stakes or unstakes.
//
// A hook can only veto. It never sees mutable program state, so it cannot
// change accounting.

use std::collections::BTreeSet;
use std::fmt;

use aludel_core::{Address, AludelError, Timestamp, U256};

use crate::stakes::StakeRecord;

pub trait StakeHook: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn before_stake(
        &self,
        _vault: Address,
        _amount: U256,
        _now: Timestamp,
    ) -> Result<(), AludelError> {
        Ok(())
    }

    /// `indices` have already been validated against `records`.
    fn before_unstake(
        &self,
        _vault: Address,
        _records: &[StakeRecord],
        _indices: &[usize],
        _now: Timestamp,
    ) -> Result<(), AludelError> {
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn StakeHook>;
}

impl Clone for Box<dyn StakeHook> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Refuses to release any record younger than `lock_duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelockHook {
    pub lock_duration: u64,
}

impl TimelockHook {
    pub fn new(lock_duration: u64) -> Self {
        Self { lock_duration }
    }
}

impl StakeHook for TimelockHook {
    fn name(&self) -> &'static str {
        "timelock"
    }

    fn before_unstake(
        &self,
        _vault: Address,
        records: &[StakeRecord],
        indices: &[usize],
        now: Timestamp,
    ) -> Result<(), AludelError> {
        for &index in indices {
            let Some(record) = records.get(index) else {
                continue;
            };
            let unlocks_at = record.timestamp.saturating_add(self.lock_duration);
            if now < unlocks_at {
                return Err(AludelError::StakeTimelocked { index, unlocks_at });
            }
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn StakeHook> {
        Box::new(*self)
    }
}

/// Only lets listed vaults stake. Unstaking is never restricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhitelistHook {
    allowed: BTreeSet<Address>,
}

impl WhitelistHook {
    pub fn new(allowed: impl IntoIterator<Item = Address>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn allow(&mut self, vault: Address) {
        self.allowed.insert(vault);
    }
}

impl StakeHook for WhitelistHook {
    fn name(&self) -> &'static str {
        "whitelist"
    }

    fn before_stake(
        &self,
        vault: Address,
        _amount: U256,
        _now: Timestamp,
    ) -> Result<(), AludelError> {
        if self.allowed.contains(&vault) {
            Ok(())
        } else {
            Err(AludelError::VaultNotWhitelisted)
        }
    }

    fn clone_box(&self) -> Box<dyn StakeHook> {
        Box::new(self.clone())
    }
}
