// crates/aludel-engine/src/pool.rs
//
// Reward pool: the custody account holding undistributed reward and bonus
// tokens for one program.
//
// Only the owning program may move tokens out while the switch is alive.
// After an emergency shutdown the power controller can drain it.

use aludel_core::{Address, AludelError, EventLog, TokenLedger, U256};
use serde::{Deserialize, Serialize};

use crate::power::PowerSwitch;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardPool {
    address: Address,
    owner: Address,
}

impl RewardPool {
    pub fn new(address: Address, owner: Address) -> Self {
        Self { address, owner }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn balance(&self, ledger: &dyn TokenLedger, token: Address) -> U256 {
        ledger.balance_of(token, self.address)
    }

    /// Send `amount` of `token` to `to` on behalf of the owning program.
    #[allow(clippy::too_many_arguments)]
    pub fn send(
        &self,
        caller: Address,
        power: &PowerSwitch,
        ledger: &mut dyn TokenLedger,
        token: Address,
        to: Address,
        amount: U256,
        log: &mut EventLog,
    ) -> Result<(), AludelError> {
        if caller != self.owner {
            return Err(AludelError::NotOwner);
        }
        power.require_not_shutdown()?;
        ledger.transfer(token, self.address, to, amount, log)?;
        Ok(())
    }

    /// Drain the full balance of each token in `tokens` to `recipient`.
    ///
    /// Only the power controller may call this, and only once the switch is
    /// shut down.
    pub fn rescue(
        &self,
        caller: Address,
        power: &PowerSwitch,
        ledger: &mut dyn TokenLedger,
        tokens: &[Address],
        recipient: Address,
        log: &mut EventLog,
    ) -> Result<Vec<(Address, U256)>, AludelError> {
        if caller != power.controller() {
            return Err(AludelError::NotOwner);
        }
        if !power.is_shutdown() {
            return Err(AludelError::PoweredNotShutdown);
        }
        let mut rescued = Vec::with_capacity(tokens.len());
        for &token in tokens {
            let amount = self.balance(ledger, token);
            ledger.transfer(token, self.address, recipient, amount, log)?;
            rescued.push((token, amount));
        }
        tracing::warn!(pool = %self.address, %recipient, tokens = tokens.len(), "Reward pool rescued");
        Ok(rescued)
    }
}
