// crates/aludel-engine/src/registry.rs
//
// Enumerable address sets for bonus tokens and vault factories.
//
// Removal swaps the last element into the vacated slot, so iteration order is
// insertion order only until the first removal. Callers must not rely on it.

use aludel_core::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSet {
    items: Vec<Address>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `address`; returns `false` if it was already present.
    pub fn insert(&mut self, address: Address) -> bool {
        if self.contains(address) {
            return false;
        }
        self.items.push(address);
        true
    }

    /// Remove `address`; returns `false` if it was not present.
    pub fn remove(&mut self, address: Address) -> bool {
        match self.items.iter().position(|a| *a == address) {
            Some(index) => {
                self.items.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, address: Address) -> bool {
        self.items.contains(&address)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<Address> {
        self.items.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Address> + '_ {
        self.items.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Address> {
        self.items.clone()
    }
}

/// Bonus tokens distributed pro-rata from the reward pool on every claim.
pub type BonusTokenSet = AddressSet;

/// Factories whose vault instances may stake.
pub type VaultFactorySet = AddressSet;
