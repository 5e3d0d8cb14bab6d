// crates/aludel-engine/src/lib.rs
//
// aludel-engine: the Aludel reward program and the chain model it runs on.
//
// Reward tokens vest linearly from funding schedules into reward shares.
// Stakers earn a time-weighted share of whatever has vested, scaled by how
// long each stake was held. All amounts are 256-bit wei values.

pub mod chain;
pub mod constants;
pub mod hooks;
pub mod ledger;
pub mod pool;
pub mod power;
pub mod program;
pub mod registry;
pub mod rewards;
pub mod scaling;
pub mod schedule;
pub mod service;
pub mod stakes;
pub mod vault;

// Re-export key types for ergonomic access from downstream crates.
pub use chain::{Chain, LaunchParams, ProgramInfo};
pub use constants::{
    rage_quit_cost, BASE_SHARES_PER_WEI, DAY, DEFAULT_FEE_BPS, MAX_BONUS_TOKENS,
    MAX_STAKES_PER_VAULT, RAGEQUIT_GAS, VAULT_RAGEQUIT_OVERHEAD,
};
pub use hooks::{StakeHook, TimelockHook, WhitelistHook};
pub use ledger::InMemoryLedger;
pub use pool::RewardPool;
pub use power::{PowerState, PowerSwitch};
pub use program::{Aludel, AludelData, ClaimReceipt, Env, InitParams};
pub use registry::{AddressSet, BonusTokenSet, VaultFactorySet};
pub use rewards::{calculate_reward, compute_unstake, RecordPayout, UnstakeOutcome};
pub use scaling::RewardScaling;
pub use schedule::{locked_shares, redeemable_shares, unlocked_shares, RewardSchedule};
pub use service::{ChainHandle, ChainService, DEFAULT_QUEUE_DEPTH};
pub use stakes::{StakeLedger, StakeRecord, VaultData};
pub use vault::{Crucible, VaultFactory, VaultRegistry};
