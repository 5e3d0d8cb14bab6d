// crates/aludel-core/src/traits.rs
//
// Collaborator boundaries. The reward program never owns tokens or vaults;
// it reaches them only through these traits.

use alloy_primitives::{Address, U256};

use crate::error::{AludelError, TokenError, VaultError};
use crate::events::EventLog;
use crate::gas::GasMeter;
use crate::permission::SignedPermission;

/// ERC-20-style balance ledger covering every token on the chain.
///
/// Implemented by aludel-engine's `InMemoryLedger`.
pub trait TokenLedger: Send + Sync {
    /// Balance of `holder` in `token`.
    fn balance_of(&self, token: Address, holder: Address) -> U256;

    /// Move `amount` of `token` from `from` to `to`, as `from` itself.
    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
        log: &mut EventLog,
    ) -> Result<(), TokenError>;

    /// Move `amount` of `token` from `from` to `to` on behalf of `spender`,
    /// consuming allowance.
    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
        log: &mut EventLog,
    ) -> Result<(), TokenError>;
}

/// The capability a staking vault grants to reward programs.
///
/// Tokens never leave the vault while staked: `lock` records that a delegate
/// holds a claim on part of the vault's balance, `unlock` releases it. Both
/// require a permission signed by the vault owner over the vault's current
/// nonce. Implemented by aludel-engine's `Crucible`.
pub trait VaultCapability: Send + Sync {
    fn address(&self) -> Address;

    /// Current owner of the vault.
    fn owner(&self) -> Address;

    /// Nonce the next permission must be signed over.
    fn nonce(&self) -> U256;

    /// Amount of `token` currently locked by `delegate`.
    fn locked_balance(&self, delegate: Address, token: Address) -> U256;

    fn lock(
        &mut self,
        ledger: &dyn TokenLedger,
        delegate: Address,
        token: Address,
        amount: U256,
        permission: &SignedPermission,
    ) -> Result<(), VaultError>;

    fn unlock(
        &mut self,
        delegate: Address,
        token: Address,
        amount: U256,
        permission: &SignedPermission,
    ) -> Result<(), VaultError>;
}

/// A delegate that can be notified when a vault owner abandons its lock.
///
/// The vault calls this with a hard gas ceiling; implementations must charge
/// every unit of work to `meter` so the ceiling bounds their cost.
pub trait RageQuitHandler {
    fn rage_quit(
        &mut self,
        vault: Address,
        now: u64,
        meter: &mut GasMeter,
        log: &mut EventLog,
    ) -> Result<(), AludelError>;
}
