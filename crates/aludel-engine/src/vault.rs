// crates/aludel-engine/src/vault.rs
//
// Reference staking vault ("Crucible") and the factories that mint them.
//
// A Crucible holds its owner's tokens and grants locks to delegates. A lock
// only records a claim; the tokens stay in the vault. Every lock and unlock
// needs a permission signed by the owner over the vault's current nonce,
// and the nonce advances on use so each signature works exactly once.
//
// Rage quit lets the owner drop a lock without the delegate's cooperation.
// The delegate is notified with a bounded gas allowance; a delegate that
// fails (or is hostile) cannot keep the owner's tokens locked.

use std::collections::{BTreeMap, BTreeSet};

use aludel_core::crypto::{address_from_public_key, verify_signature};
use aludel_core::{
    Address, AludelError, Event, EventLog, GasMeter, Permission, PermissionKind,
    RageQuitHandler, SignedPermission, TokenLedger, U256, VaultCapability, VaultError,
};
use serde::{Deserialize, Serialize};

use crate::constants::{RAGEQUIT_GAS, VAULT_RAGEQUIT_OVERHEAD};

/// A single-owner staking vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crucible {
    address: Address,
    chain_id: u64,
    owner_key: [u8; 32],
    nonce: U256,
    locks: BTreeMap<(Address, Address), U256>,
}

impl Crucible {
    /// A vault at `address` owned by the holder of `owner_key`.
    pub fn new(address: Address, chain_id: u64, owner_key: [u8; 32]) -> Self {
        Self {
            address,
            chain_id,
            owner_key,
            nonce: U256::ZERO,
            locks: BTreeMap::new(),
        }
    }

    /// Every (delegate, token) pair with a live lock.
    pub fn locks(&self) -> impl Iterator<Item = (Address, Address, U256)> + '_ {
        self.locks.iter().map(|(&(d, t), &b)| (d, t, b))
    }

    fn verify(
        &self,
        kind: PermissionKind,
        delegate: Address,
        token: Address,
        amount: U256,
        permission: &SignedPermission,
    ) -> Result<(), VaultError> {
        let digest = Permission {
            kind,
            delegate,
            token,
            amount,
            nonce: self.nonce,
        }
        .digest(self.chain_id, self.address);
        match verify_signature(&self.owner_key, digest.as_slice(), permission.as_bytes()) {
            Ok(true) => Ok(()),
            _ => Err(VaultError::InvalidSignature),
        }
    }

    /// Drop the lock held by `delegate` on `token`, notifying the delegate
    /// with at most `RAGEQUIT_GAS` of the caller's gas.
    ///
    /// Returns whether the delegate accepted the notification. The lock is
    /// dropped either way, except when the delegate ran out of gas on a short
    /// allowance: then the whole call fails with `InsufficientGas` so a caller
    /// cannot starve the delegate's bookkeeping on purpose.
    #[allow(clippy::too_many_arguments)]
    pub fn rage_quit(
        &mut self,
        caller: Address,
        delegate: Address,
        token: Address,
        handler: &mut dyn RageQuitHandler,
        meter: &mut GasMeter,
        now: u64,
        log: &mut EventLog,
    ) -> Result<bool, VaultError> {
        if caller != self.owner() {
            return Err(VaultError::NotOwner);
        }
        meter
            .consume(VAULT_RAGEQUIT_OVERHEAD)
            .map_err(|_| VaultError::InsufficientGas)?;
        if !self.locks.contains_key(&(delegate, token)) {
            return Err(VaultError::MissingLock);
        }

        let forwarded = meter.remaining().min(RAGEQUIT_GAS);
        let mut sub_meter = GasMeter::new(forwarded);
        let result = handler.rage_quit(self.address, now, &mut sub_meter, log);
        meter
            .consume(sub_meter.used())
            .map_err(|_| VaultError::InsufficientGas)?;

        let notified = match result {
            Ok(()) => true,
            Err(AludelError::Gas(_)) if forwarded < RAGEQUIT_GAS => {
                return Err(VaultError::InsufficientGas);
            }
            Err(e) => {
                tracing::warn!(vault = %self.address, %delegate, error = %e, "Rage quit notification failed");
                false
            }
        };

        self.locks.remove(&(delegate, token));
        log.emit(
            self.address,
            Event::RageQuit {
                delegate,
                token,
                notified,
            },
        );
        tracing::info!(vault = %self.address, %delegate, notified, "Rage quit");
        Ok(notified)
    }
}

impl VaultCapability for Crucible {
    fn address(&self) -> Address {
        self.address
    }

    fn owner(&self) -> Address {
        address_from_public_key(&self.owner_key)
    }

    fn nonce(&self) -> U256 {
        self.nonce
    }

    fn locked_balance(&self, delegate: Address, token: Address) -> U256 {
        self.locks
            .get(&(delegate, token))
            .copied()
            .unwrap_or_default()
    }

    fn lock(
        &mut self,
        ledger: &dyn TokenLedger,
        delegate: Address,
        token: Address,
        amount: U256,
        permission: &SignedPermission,
    ) -> Result<(), VaultError> {
        self.verify(PermissionKind::Lock, delegate, token, amount, permission)?;
        let locked = self
            .locked_balance(delegate, token)
            .checked_add(amount)
            .ok_or(VaultError::InsufficientBalance)?;
        if ledger.balance_of(token, self.address) < locked {
            return Err(VaultError::InsufficientBalance);
        }
        self.locks.insert((delegate, token), locked);
        self.nonce += U256::from(1u8);
        Ok(())
    }

    fn unlock(
        &mut self,
        delegate: Address,
        token: Address,
        amount: U256,
        permission: &SignedPermission,
    ) -> Result<(), VaultError> {
        self.verify(PermissionKind::Unlock, delegate, token, amount, permission)?;
        let locked = self
            .locks
            .get(&(delegate, token))
            .copied()
            .ok_or(VaultError::MissingLock)?;
        if locked > amount {
            self.locks.insert((delegate, token), locked - amount);
        } else {
            self.locks.remove(&(delegate, token));
        }
        self.nonce += U256::from(1u8);
        Ok(())
    }
}

/// A factory and the set of vaults it has created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultFactory {
    instances: BTreeSet<Address>,
}

impl VaultFactory {
    pub fn is_instance(&self, vault: Address) -> bool {
        self.instances.contains(&vault)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// Every vault factory and vault on the chain.
#[derive(Debug, Clone, Default)]
pub struct VaultRegistry {
    factories: BTreeMap<Address, VaultFactory>,
    vaults: BTreeMap<Address, Crucible>,
}

impl VaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_factory(&mut self, factory: Address) {
        self.factories.entry(factory).or_default();
    }

    pub fn factory(&self, factory: Address) -> Option<&VaultFactory> {
        self.factories.get(&factory)
    }

    /// Create a vault from `factory` at `address`.
    pub fn create_vault(
        &mut self,
        factory: Address,
        address: Address,
        chain_id: u64,
        owner_key: [u8; 32],
    ) -> Result<&Crucible, AludelError> {
        let entry = self
            .factories
            .get_mut(&factory)
            .ok_or_else(|| AludelError::not_found("vault factory", factory))?;
        entry.instances.insert(address);
        let vault = self
            .vaults
            .entry(address)
            .or_insert_with(|| Crucible::new(address, chain_id, owner_key));
        tracing::info!(%factory, vault = %address, "Vault created");
        Ok(vault)
    }

    /// Whether `vault` was created by `factory`.
    pub fn is_instance(&self, factory: Address, vault: Address) -> bool {
        self.factories
            .get(&factory)
            .is_some_and(|f| f.is_instance(vault))
    }

    pub fn get(&self, vault: Address) -> Option<&Crucible> {
        self.vaults.get(&vault)
    }

    pub fn get_mut(&mut self, vault: Address) -> Option<&mut Crucible> {
        self.vaults.get_mut(&vault)
    }

    /// The vault as a capability, for delegates that lock and unlock.
    pub fn capability_mut(
        &mut self,
        vault: Address,
    ) -> Result<&mut dyn VaultCapability, AludelError> {
        self.vaults
            .get_mut(&vault)
            .map(|v| v as &mut dyn VaultCapability)
            .ok_or_else(|| AludelError::not_found("vault", vault))
    }

    pub fn vaults(&self) -> impl Iterator<Item = &Crucible> {
        self.vaults.values()
    }
}
