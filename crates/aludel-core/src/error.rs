// crates/aludel-core/src/error.rs
//
// Error taxonomy for the Aludel reward engine.
//
// Engine failures carry the names the on-chain program reverts with, so a
// parity harness can compare error identities one-to-one. Failures raised by
// external collaborators (tokens, vaults, the gas meter) are wrapped
// transparently: callers see the collaborator's own revert reason.

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Reverts raised by a token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Sender balance is lower than the transfer amount.
    #[error("ERC20: transfer amount exceeds balance")]
    InsufficientBalance,

    /// Spender allowance is lower than the transfer amount.
    #[error("ERC20: insufficient allowance")]
    InsufficientAllowance,

    /// The token contract itself refused the call (hostile or paused token).
    #[error("token {token} reverted: {reason}")]
    Reverted { token: Address, reason: String },
}

/// Reverts raised by a staking vault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Permission was not signed by the vault owner, or signs different fields.
    #[error("ERC1271: Invalid signature")]
    InvalidSignature,

    /// The vault does not hold enough tokens to cover the requested lock.
    #[error("UniversalVault: insufficient balance")]
    InsufficientBalance,

    /// No lock exists for the (delegate, token) pair.
    #[error("UniversalVault: missing lock")]
    MissingLock,

    /// The caller did not supply enough gas for the rage-quit notification.
    #[error("UniversalVault: insufficient gas")]
    InsufficientGas,

    /// Only the vault owner may perform this call.
    #[error("UniversalVault: not owner")]
    NotOwner,
}

/// Gas metering failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GasError {
    #[error("out of gas: needed {needed}, remaining {remaining}")]
    OutOfGas { needed: u64, remaining: u64 },
}

/// Errors raised by the reward program and the surrounding chain model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AludelError {
    /// Caller is not the owner/admin of the target.
    #[error("Ownable: caller is not the owner")]
    NotOwner,

    #[error("Powered_NotOnline")]
    PoweredNotOnline,

    #[error("Powered_IsShutdown")]
    PoweredIsShutdown,

    /// Emergency rescue attempted before the switch was shut down.
    #[error("Powered_NotShutdown")]
    PoweredNotShutdown,

    #[error("PowerSwitch: cannot power on")]
    CannotPowerOn,

    #[error("PowerSwitch: cannot power off")]
    CannotPowerOff,

    #[error("PowerSwitch: cannot shutdown")]
    CannotShutdown,

    /// `initialize` was called on an instance that is already initialized or locked.
    #[error("AlreadyInitialized")]
    AlreadyInitialized,

    /// The instance is an uninitialized template.
    #[error("NotInitialized")]
    NotInitialized,

    /// Reward scaling parameters violate `floor <= ceiling` or `time >= 1`.
    #[error("InvalidScaling: floor {floor}, ceiling {ceiling}, time {time}")]
    InvalidScaling { floor: u64, ceiling: u64, time: u64 },

    #[error("InvalidDuration")]
    InvalidDuration,

    /// Protocol fee above 10000 basis points.
    #[error("InvalidFee: {0} bps")]
    InvalidFee(u16),

    #[error("NoAmountStaked")]
    NoAmountStaked,

    #[error("NoAmountUnstaked")]
    NoAmountUnstaked,

    #[error("InvalidAmountArray")]
    InvalidAmountArray,

    #[error("InsufficientVaultStake")]
    InsufficientVaultStake,

    #[error("InvalidVault")]
    InvalidVault,

    #[error("MaxStakesReached")]
    MaxStakesReached,

    #[error("MaxBonusTokensReached")]
    MaxBonusTokensReached,

    #[error("InvalidAddress")]
    InvalidAddress,

    #[error("VaultAlreadyRegistered")]
    VaultAlreadyRegistered,

    #[error("VaultFactoryNotRegistered")]
    VaultFactoryNotRegistered,

    /// A stake hook's allowlist does not include the vault.
    #[error("VaultNotWhitelisted")]
    VaultNotWhitelisted,

    #[error("NoStakes")]
    NoStakes,

    /// A stake hook refused to release a record before its lock elapsed.
    #[error("StakeTimelocked: record {index} unlocks at {unlocks_at}")]
    StakeTimelocked { index: usize, unlocks_at: u64 },

    /// Checked 256-bit arithmetic overflowed or underflowed.
    #[error("ArithmeticOverflow")]
    ArithmeticOverflow,

    /// Lookup of an unknown address.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The single-writer service task has stopped accepting work.
    #[error("Service stopped")]
    ServiceStopped,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Gas(#[from] GasError),
}

impl AludelError {
    /// Shorthand for a `NotFound` naming an address.
    pub fn not_found(kind: &str, address: Address) -> Self {
        AludelError::NotFound(format!("{} {}", kind, address))
    }
}

impl From<serde_json::Error> for AludelError {
    fn from(e: serde_json::Error) -> Self {
        AludelError::Serialization(e.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for AludelError {
    fn from(e: ed25519_dalek::SignatureError) -> Self {
        AludelError::Crypto(e.to_string())
    }
}

/// Checked `a * b / d`, truncating toward zero.
///
/// Returns `ArithmeticOverflow` if the product overflows 256 bits or `d` is zero.
pub fn mul_div(a: U256, b: U256, d: U256) -> Result<U256, AludelError> {
    if d.is_zero() {
        return Err(AludelError::ArithmeticOverflow);
    }
    let product = a.checked_mul(b).ok_or(AludelError::ArithmeticOverflow)?;
    Ok(product / d)
}

/// Checked addition mapped onto `ArithmeticOverflow`.
pub fn checked_add(a: U256, b: U256) -> Result<U256, AludelError> {
    a.checked_add(b).ok_or(AludelError::ArithmeticOverflow)
}

/// Checked subtraction mapped onto `ArithmeticOverflow`.
pub fn checked_sub(a: U256, b: U256) -> Result<U256, AludelError> {
    a.checked_sub(b).ok_or(AludelError::ArithmeticOverflow)
}

/// Checked multiplication mapped onto `ArithmeticOverflow`.
pub fn checked_mul(a: U256, b: U256) -> Result<U256, AludelError> {
    a.checked_mul(b).ok_or(AludelError::ArithmeticOverflow)
}
