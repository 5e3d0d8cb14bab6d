// crates/aludel-engine/src/program.rs
//
// The Aludel reward program: one instance per staking campaign.
//
// An instance starts life as an uninitialized template. `initialize` binds it
// to its tokens, reward pool, power switch and scaling curve exactly once.
// After that every mutating operation follows the same order:
//   1. authorization and power gate
//   2. input validation
//   3. stake-unit accrual and accounting, staged on a copy of the state
//   4. external calls (vault lock/unlock, token transfers) and their events
//   5. commit of the staged accounting
//
// A failed call leaves the program's own state untouched. Side effects on
// the token ledger, vaults and event log are rolled back by `Chain::transact`.
//
// The program never holds tokens itself. Rewards sit in the reward pool and
// staked tokens never leave their vault.

use aludel_core::error::{checked_add, checked_mul, checked_sub, mul_div};
use aludel_core::{
    Address, AludelError, Event, EventLog, GasMeter, RageQuitHandler, SignedPermission,
    Timestamp, TokenLedger, U256,
};
use serde::{Deserialize, Serialize};

use crate::constants::{
    rage_quit_cost, BASE_SHARES_PER_WEI, BPS_DENOMINATOR, MAX_BONUS_TOKENS,
};
use crate::hooks::StakeHook;
use crate::pool::RewardPool;
use crate::power::{PowerState, PowerSwitch};
use crate::registry::{BonusTokenSet, VaultFactorySet};
use crate::rewards::{bonus_share, compute_unstake, validate_unstake, UnstakeOutcome};
use crate::scaling::RewardScaling;
use crate::schedule::{redeemable_shares, RewardSchedule};
use crate::stakes::{StakeLedger, VaultData};
use crate::vault::VaultRegistry;

/// Everything an operation may touch outside the program's own state.
pub struct Env<'a> {
    pub now: Timestamp,
    pub caller: Address,
    pub ledger: &'a mut dyn TokenLedger,
    pub vaults: &'a mut VaultRegistry,
    pub log: &'a mut EventLog,
}

/// Parameters bound by `initialize`.
#[derive(Debug, Clone)]
pub struct InitParams {
    pub owner: Address,
    pub reward_pool: Address,
    pub power_switch: Address,
    pub power_controller: Address,
    pub staking_token: Address,
    pub reward_token: Address,
    pub reward_scaling: RewardScaling,
    pub fee_recipient: Address,
    pub fee_bps: u16,
    pub hook: Option<Box<dyn StakeHook>>,
}

/// Read view of the program's accounting, shaped like `getAludelData()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AludelData {
    pub staking_token: Address,
    pub reward_token: Address,
    pub reward_pool: Address,
    pub reward_scaling: RewardScaling,
    pub reward_shares_outstanding: U256,
    pub total_stake: U256,
    pub total_stake_units: U256,
    pub last_update: Timestamp,
    pub reward_schedules: Vec<RewardSchedule>,
}

/// What an unstake paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub vault: Address,
    pub amount: U256,
    pub reward: U256,
    pub shares_burned: U256,
    pub stake_units_burned: U256,
    pub bonus: Vec<(Address, U256)>,
}

#[derive(Debug, Clone)]
struct ProgramState {
    owner: Address,
    staking_token: Address,
    reward_token: Address,
    reward_scaling: RewardScaling,
    fee_recipient: Address,
    fee_bps: u16,
    power: PowerSwitch,
    pool: RewardPool,
    schedules: Vec<RewardSchedule>,
    shares_outstanding: U256,
    stakes: StakeLedger,
    bonus_tokens: BonusTokenSet,
    vault_factories: VaultFactorySet,
    hook: Option<Box<dyn StakeHook>>,
}

impl ProgramState {
    fn require_owner(&self, caller: Address) -> Result<(), AludelError> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(AludelError::NotOwner)
        }
    }

    /// Outstanding reward that has vested by `now`, in reward-token wei.
    fn reward_available(&self, now: Timestamp) -> Result<U256, AludelError> {
        let shares = redeemable_shares(&self.schedules, self.shares_outstanding, now)?;
        Ok(shares / U256::from(BASE_SHARES_PER_WEI))
    }

    fn is_valid_vault(&self, vaults: &VaultRegistry, vault: Address) -> bool {
        self.vault_factories
            .iter()
            .any(|factory| vaults.is_instance(factory, vault))
    }
}

#[derive(Debug, Clone)]
pub struct Aludel {
    address: Address,
    initialized: bool,
    state: Option<ProgramState>,
}

impl Aludel {
    /// An uninitialized instance at `address`.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            initialized: false,
            state: None,
        }
    }

    /// A template at `address`: permanently initialized and never bound, so
    /// it can only be instantiated.
    pub fn template(address: Address) -> Self {
        Self {
            address,
            initialized: true,
            state: None,
        }
    }

    /// A fresh uninitialized instance of this template's code at `address`.
    pub fn instantiate(&self, address: Address) -> Self {
        Self::new(address)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Permanently mark this instance as initialized without binding it, so
    /// it can only serve as a template.
    pub fn initialize_lock(&mut self) -> Result<(), AludelError> {
        if self.initialized {
            return Err(AludelError::AlreadyInitialized);
        }
        self.initialized = true;
        Ok(())
    }

    pub fn initialize(&mut self, params: InitParams, now: Timestamp) -> Result<(), AludelError> {
        if self.initialized {
            return Err(AludelError::AlreadyInitialized);
        }
        params.reward_scaling.validate()?;
        if u64::from(params.fee_bps) > BPS_DENOMINATOR {
            return Err(AludelError::InvalidFee(params.fee_bps));
        }
        self.state = Some(ProgramState {
            owner: params.owner,
            staking_token: params.staking_token,
            reward_token: params.reward_token,
            reward_scaling: params.reward_scaling,
            fee_recipient: params.fee_recipient,
            fee_bps: params.fee_bps,
            power: PowerSwitch::new(params.power_switch, params.power_controller),
            pool: RewardPool::new(params.reward_pool, self.address),
            schedules: Vec::new(),
            shares_outstanding: U256::ZERO,
            stakes: StakeLedger::new(now),
            bonus_tokens: BonusTokenSet::new(),
            vault_factories: VaultFactorySet::new(),
            hook: params.hook,
        });
        self.initialized = true;
        tracing::info!(program = %self.address, owner = %params.owner, "Program initialized");
        Ok(())
    }

    fn state(&self) -> Result<&ProgramState, AludelError> {
        self.state.as_ref().ok_or(AludelError::NotInitialized)
    }

    fn state_mut(&mut self) -> Result<&mut ProgramState, AludelError> {
        self.state.as_mut().ok_or(AludelError::NotInitialized)
    }

    pub fn owner(&self) -> Result<Address, AludelError> {
        Ok(self.state()?.owner)
    }

    pub fn power_state(&self) -> Result<PowerState, AludelError> {
        Ok(self.state()?.power.state())
    }

    pub fn power_switch(&self) -> Result<&PowerSwitch, AludelError> {
        Ok(&self.state()?.power)
    }

    pub fn reward_pool(&self) -> Result<&RewardPool, AludelError> {
        Ok(&self.state()?.pool)
    }

    pub fn fee(&self) -> Result<(Address, u16), AludelError> {
        let state = self.state()?;
        Ok((state.fee_recipient, state.fee_bps))
    }

    pub fn hook_name(&self) -> Result<Option<&'static str>, AludelError> {
        Ok(self.state()?.hook.as_ref().map(|h| h.name()))
    }

    // ---------------------------------------------------------------------
    // Owner operations
    // ---------------------------------------------------------------------

    pub fn transfer_ownership(
        &mut self,
        env: &mut Env<'_>,
        new_owner: Address,
    ) -> Result<(), AludelError> {
        let state = self.state_mut()?;
        state.require_owner(env.caller)?;
        if new_owner == Address::ZERO {
            return Err(AludelError::InvalidAddress);
        }
        state.owner = new_owner;
        Ok(())
    }

    /// Add `amount` of reward token, vesting linearly over `duration` seconds.
    ///
    /// The protocol fee is forwarded to the fee recipient; only the remainder
    /// is minted into shares.
    pub fn fund(
        &mut self,
        env: &mut Env<'_>,
        amount: U256,
        duration: u64,
    ) -> Result<U256, AludelError> {
        let address = self.address;
        let state = self.state_mut()?;
        state.require_owner(env.caller)?;
        state.power.require_online()?;
        if duration == 0 {
            return Err(AludelError::InvalidDuration);
        }

        let mut stakes = state.stakes.clone();
        stakes.accrue(env.now)?;

        let fee_bps = U256::from(state.fee_bps);
        let denominator = U256::from(BPS_DENOMINATOR);
        let net = mul_div(amount, checked_sub(denominator, fee_bps)?, denominator)?;
        let fee = checked_sub(amount, net)?;
        let shares = checked_mul(net, U256::from(BASE_SHARES_PER_WEI))?;
        let shares_outstanding = checked_add(state.shares_outstanding, shares)?;

        if !fee.is_zero() {
            env.ledger.transfer_from(
                state.reward_token,
                address,
                env.caller,
                state.fee_recipient,
                fee,
                env.log,
            )?;
        }
        env.ledger.transfer_from(
            state.reward_token,
            address,
            env.caller,
            state.pool.address(),
            net,
            env.log,
        )?;

        state.stakes = stakes;
        state.schedules.push(RewardSchedule {
            start: env.now,
            duration,
            shares,
        });
        state.shares_outstanding = shares_outstanding;

        env.log.emit(
            address,
            Event::AludelFunded {
                amount: net,
                duration,
            },
        );
        tracing::info!(program = %address, %net, %fee, duration, "Funded");
        Ok(net)
    }

    pub fn register_vault_factory(
        &mut self,
        env: &mut Env<'_>,
        factory: Address,
    ) -> Result<(), AludelError> {
        let address = self.address;
        let state = self.state_mut()?;
        state.require_owner(env.caller)?;
        state.power.require_not_shutdown()?;
        if !state.vault_factories.insert(factory) {
            return Err(AludelError::VaultAlreadyRegistered);
        }
        env.log.emit(address, Event::VaultFactoryRegistered { factory });
        tracing::info!(program = %address, %factory, "Vault factory registered");
        Ok(())
    }

    pub fn remove_vault_factory(
        &mut self,
        env: &mut Env<'_>,
        factory: Address,
    ) -> Result<(), AludelError> {
        let address = self.address;
        let state = self.state_mut()?;
        state.require_owner(env.caller)?;
        state.power.require_not_shutdown()?;
        if !state.vault_factories.remove(factory) {
            return Err(AludelError::VaultFactoryNotRegistered);
        }
        env.log.emit(address, Event::VaultFactoryRemoved { factory });
        tracing::info!(program = %address, %factory, "Vault factory removed");
        Ok(())
    }

    pub fn register_bonus_token(
        &mut self,
        env: &mut Env<'_>,
        token: Address,
    ) -> Result<(), AludelError> {
        let address = self.address;
        let state = self.state_mut()?;
        state.require_owner(env.caller)?;
        state.power.require_online()?;
        let reserved = [
            Address::ZERO,
            address,
            state.staking_token,
            state.reward_token,
            state.pool.address(),
        ];
        if reserved.contains(&token) || state.bonus_tokens.contains(token) {
            return Err(AludelError::InvalidAddress);
        }
        if state.bonus_tokens.len() >= MAX_BONUS_TOKENS {
            return Err(AludelError::MaxBonusTokensReached);
        }
        state.bonus_tokens.insert(token);
        env.log.emit(address, Event::BonusTokenRegistered { token });
        tracing::info!(program = %address, %token, "Bonus token registered");
        Ok(())
    }

    /// Move tokens sent to the reward pool by mistake.
    ///
    /// Reward and bonus tokens are committed to stakers and can never be
    /// rescued this way.
    pub fn rescue_tokens_from_reward_pool(
        &mut self,
        env: &mut Env<'_>,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), AludelError> {
        let address = self.address;
        let state = self.state()?;
        state.require_owner(env.caller)?;
        state.power.require_online()?;
        if token == state.reward_token || state.bonus_tokens.contains(token) {
            return Err(AludelError::InvalidAddress);
        }
        let forbidden = [
            Address::ZERO,
            address,
            state.staking_token,
            state.reward_token,
            state.pool.address(),
        ];
        if forbidden.contains(&recipient) {
            return Err(AludelError::InvalidAddress);
        }
        state
            .pool
            .send(address, &state.power, env.ledger, token, recipient, amount, env.log)?;
        tracing::info!(program = %address, %token, %recipient, %amount, "Tokens rescued from reward pool");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Power controller operations
    // ---------------------------------------------------------------------

    pub fn power_on(&mut self, env: &mut Env<'_>) -> Result<(), AludelError> {
        self.state_mut()?.power.power_on(env.caller, env.log)
    }

    pub fn power_off(&mut self, env: &mut Env<'_>) -> Result<(), AludelError> {
        self.state_mut()?.power.power_off(env.caller, env.log)
    }

    pub fn emergency_shutdown(&mut self, env: &mut Env<'_>) -> Result<(), AludelError> {
        self.state_mut()?.power.emergency_shutdown(env.caller, env.log)
    }

    /// Drain the reward pool after an emergency shutdown.
    pub fn rescue_reward_pool(
        &mut self,
        env: &mut Env<'_>,
        tokens: &[Address],
        recipient: Address,
    ) -> Result<Vec<(Address, U256)>, AludelError> {
        let state = self.state()?;
        state
            .pool
            .rescue(env.caller, &state.power, env.ledger, tokens, recipient, env.log)
    }

    // ---------------------------------------------------------------------
    // Staker operations
    // ---------------------------------------------------------------------

    /// Lock `amount` of the staking token in `vault` and start accruing
    /// stake units for it.
    pub fn stake(
        &mut self,
        env: &mut Env<'_>,
        vault: Address,
        amount: U256,
        permission: &SignedPermission,
    ) -> Result<(), AludelError> {
        let address = self.address;
        let state = self.state_mut()?;
        state.power.require_online()?;
        if amount.is_zero() {
            return Err(AludelError::NoAmountStaked);
        }
        if !state.is_valid_vault(env.vaults, vault) {
            return Err(AludelError::InvalidVault);
        }
        if let Some(hook) = &state.hook {
            hook.before_stake(vault, amount, env.now)?;
        }

        let mut stakes = state.stakes.clone();
        stakes.accrue(env.now)?;
        stakes.add_stake(vault, amount, env.now)?;

        env.vaults.capability_mut(vault)?.lock(
            &*env.ledger,
            address,
            state.staking_token,
            amount,
            permission,
        )?;
        state.stakes = stakes;

        env.log.emit(address, Event::Staked { vault, amount });
        tracing::info!(program = %address, %vault, %amount, "Staked");
        Ok(())
    }

    /// Withdraw `amounts[i]` from stake record `indices[i]` of `vault` and
    /// pay out the reward those records earned.
    pub fn unstake_and_claim(
        &mut self,
        env: &mut Env<'_>,
        vault: Address,
        indices: &[usize],
        amounts: &[U256],
        permission: &SignedPermission,
    ) -> Result<ClaimReceipt, AludelError> {
        let address = self.address;
        let state = self.state_mut()?;
        state.power.require_not_shutdown()?;

        let records = state
            .stakes
            .vault(vault)
            .map(|v| v.stakes.clone())
            .unwrap_or_default();
        validate_unstake(&records, indices, amounts)?;
        if let Some(hook) = &state.hook {
            hook.before_unstake(vault, &records, indices, env.now)?;
        }

        let mut stakes = state.stakes.clone();
        stakes.accrue(env.now)?;

        let total_stake_units = stakes.total_stake_units();
        let outcome = compute_unstake(
            &records,
            indices,
            amounts,
            env.now,
            state.reward_available(env.now)?,
            total_stake_units,
            &state.reward_scaling,
        )?;

        let mut bonus = Vec::with_capacity(state.bonus_tokens.len());
        for token in state.bonus_tokens.iter() {
            let balance = state.pool.balance(&*env.ledger, token);
            let share = bonus_share(balance, outcome.stake_units_burned, total_stake_units)?;
            bonus.push((token, share));
        }

        stakes.apply_unstake(
            vault,
            &outcome.updates,
            outcome.amount,
            outcome.stake_units_burned,
        )?;
        let shares_burned = checked_mul(outcome.reward, U256::from(BASE_SHARES_PER_WEI))?
            .min(state.shares_outstanding);

        env.vaults.capability_mut(vault)?.unlock(
            address,
            state.staking_token,
            outcome.amount,
            permission,
        )?;
        env.log.emit(
            address,
            Event::Unstaked {
                vault,
                amount: outcome.amount,
            },
        );

        let payouts = std::iter::once((state.reward_token, outcome.reward)).chain(bonus.iter().copied());
        for (token, amount) in payouts {
            if amount.is_zero() {
                continue;
            }
            state
                .pool
                .send(address, &state.power, env.ledger, token, vault, amount, env.log)?;
            env.log.emit(
                address,
                Event::RewardClaimed {
                    vault,
                    token,
                    amount,
                },
            );
        }

        state.stakes = stakes;
        state.shares_outstanding -= shares_burned;

        tracing::info!(
            program = %address,
            %vault,
            amount = %outcome.amount,
            reward = %outcome.reward,
            records = indices.len(),
            "Unstaked and claimed"
        );
        Ok(ClaimReceipt {
            vault,
            amount: outcome.amount,
            reward: outcome.reward,
            shares_burned,
            stake_units_burned: outcome.stake_units_burned,
            bonus,
        })
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn get_aludel_data(&self) -> Result<AludelData, AludelError> {
        let state = self.state()?;
        Ok(AludelData {
            staking_token: state.staking_token,
            reward_token: state.reward_token,
            reward_pool: state.pool.address(),
            reward_scaling: state.reward_scaling,
            reward_shares_outstanding: state.shares_outstanding,
            total_stake: state.stakes.total_stake(),
            total_stake_units: state.stakes.total_stake_units(),
            last_update: state.stakes.last_update(),
            reward_schedules: state.schedules.clone(),
        })
    }

    /// Stake data for `vault`; empty if it has never staked.
    pub fn get_vault_data(&self, vault: Address) -> Result<VaultData, AludelError> {
        Ok(self
            .state()?
            .stakes
            .vault(vault)
            .cloned()
            .unwrap_or_default())
    }

    pub fn get_bonus_tokens(&self) -> Result<Vec<Address>, AludelError> {
        Ok(self.state()?.bonus_tokens.to_vec())
    }

    pub fn get_vault_factories(&self) -> Result<Vec<Address>, AludelError> {
        Ok(self.state()?.vault_factories.to_vec())
    }

    /// Whether `vault` was created by any registered vault factory.
    pub fn is_valid_vault(&self, vaults: &VaultRegistry, vault: Address) -> Result<bool, AludelError> {
        Ok(self.state()?.is_valid_vault(vaults, vault))
    }

    pub fn get_current_unlocked_rewards(&self, now: Timestamp) -> Result<U256, AludelError> {
        self.state()?.reward_available(now)
    }

    pub fn get_future_unlocked_rewards(&self, timestamp: Timestamp) -> Result<U256, AludelError> {
        self.state()?.reward_available(timestamp)
    }

    pub fn get_current_total_stake_units(&self, now: Timestamp) -> Result<U256, AludelError> {
        self.state()?.stakes.total_stake_units_at(now)
    }

    pub fn get_future_total_stake_units(&self, timestamp: Timestamp) -> Result<U256, AludelError> {
        self.state()?.stakes.total_stake_units_at(timestamp)
    }

    pub fn get_current_vault_stake_units(
        &self,
        vault: Address,
        now: Timestamp,
    ) -> Result<U256, AludelError> {
        match self.state()?.stakes.vault(vault) {
            Some(data) => data.stake_units_at(now),
            None => Ok(U256::ZERO),
        }
    }

    /// Price an unstake at `now` without executing it.
    ///
    /// Uses the same computation as `unstake_and_claim`; stake hooks are not
    /// consulted.
    pub fn preview_unstake(
        &self,
        vault: Address,
        indices: &[usize],
        amounts: &[U256],
        now: Timestamp,
    ) -> Result<UnstakeOutcome, AludelError> {
        let state = self.state()?;
        let records = state
            .stakes
            .vault(vault)
            .map(|v| v.stakes.as_slice())
            .unwrap_or_default();
        compute_unstake(
            records,
            indices,
            amounts,
            now,
            state.reward_available(now)?,
            state.stakes.total_stake_units_at(now)?,
            &state.reward_scaling,
        )
    }

    /// Reward the whole vault would earn if fully unstaked at `now`.
    pub fn get_current_vault_reward(&self, vault: Address, now: Timestamp) -> Result<U256, AludelError> {
        let data = self.get_vault_data(vault)?;
        if data.stakes.is_empty() {
            return Ok(U256::ZERO);
        }
        let indices: Vec<usize> = (0..data.stakes.len()).collect();
        let amounts: Vec<U256> = data.stakes.iter().map(|r| r.amount).collect();
        Ok(self.preview_unstake(vault, &indices, &amounts, now)?.reward)
    }

    /// Pro-rata share of each bonus token's pool balance for `stake_units`.
    pub fn preview_bonus(
        &self,
        ledger: &dyn TokenLedger,
        stake_units: U256,
        now: Timestamp,
    ) -> Result<Vec<(Address, U256)>, AludelError> {
        let state = self.state()?;
        let total = state.stakes.total_stake_units_at(now)?;
        state
            .bonus_tokens
            .iter()
            .map(|token| {
                let share = bonus_share(state.pool.balance(ledger, token), stake_units, total)?;
                Ok((token, share))
            })
            .collect()
    }
}

impl RageQuitHandler for Aludel {
    /// Forfeit every stake of `vault` without claiming.
    ///
    /// The vault's stake units leave the total but its reward shares stay
    /// outstanding for the remaining stakers.
    fn rage_quit(
        &mut self,
        vault: Address,
        now: u64,
        meter: &mut GasMeter,
        log: &mut EventLog,
    ) -> Result<(), AludelError> {
        let address = self.address;
        let state = self.state_mut()?;
        let records = state.stakes.record_count(vault);
        if records == 0 {
            return Err(AludelError::NoStakes);
        }
        meter.consume(rage_quit_cost(records))?;

        let mut stakes = state.stakes.clone();
        stakes.accrue(now)?;
        let (data, units) = stakes.remove_vault(vault, now)?.ok_or(AludelError::NoStakes)?;
        state.stakes = stakes;

        log.emit(
            address,
            Event::Unstaked {
                vault,
                amount: data.total_stake,
            },
        );
        tracing::info!(program = %address, %vault, amount = %data.total_stake, %units, records, "Rage quit");
        Ok(())
    }
}
