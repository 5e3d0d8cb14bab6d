// crates/aludel-engine/src/chain.rs
//
// A deterministic single-chain world: token ledger, vaults, programs, a
// clock and an event log.
//
// Every public mutating call runs inside `transact`, which snapshots the
// whole world first and restores it if the call fails. A failed operation
// therefore leaves no trace, including events and token movements made by
// collaborators before the failure.

use std::collections::BTreeMap;

use aludel_core::crypto::derive_address;
use aludel_core::{
    sign_permission, Address, AludelError, EventLog, GasMeter, Keypair, LogEntry,
    PermissionKind, SignedPermission, Timestamp, TokenLedger, VaultCapability, U256,
};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_FEE_BPS;
use crate::hooks::StakeHook;
use crate::ledger::InMemoryLedger;
use crate::program::{Aludel, ClaimReceipt, Env, InitParams};
use crate::scaling::RewardScaling;
use crate::vault::VaultRegistry;

/// Catalog entry recorded for every launched program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInfo {
    pub name: String,
    pub url: String,
    pub start_time: Timestamp,
    pub template: Address,
    pub owner: Address,
}

/// Configuration for `Chain::launch`.
#[derive(Debug, Clone)]
pub struct LaunchParams {
    pub name: String,
    pub url: String,
    pub start_time: Option<Timestamp>,
    pub staking_token: Address,
    pub reward_token: Address,
    pub reward_scaling: RewardScaling,
    /// Defaults to the launching owner.
    pub power_controller: Option<Address>,
    /// Defaults to the launching owner.
    pub fee_recipient: Option<Address>,
    pub fee_bps: u16,
    pub vault_factory: Option<Address>,
    pub bonus_tokens: Vec<Address>,
    pub hook: Option<Box<dyn StakeHook>>,
}

impl LaunchParams {
    pub fn new(staking_token: Address, reward_token: Address, reward_scaling: RewardScaling) -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            start_time: None,
            staking_token,
            reward_token,
            reward_scaling,
            power_controller: None,
            fee_recipient: None,
            fee_bps: DEFAULT_FEE_BPS,
            vault_factory: None,
            bonus_tokens: Vec::new(),
            hook: None,
        }
    }

    pub fn with_name(mut self, name: &str, url: &str) -> Self {
        self.name = name.to_string();
        self.url = url.to_string();
        self
    }

    pub fn with_start_time(mut self, start_time: Timestamp) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_fee(mut self, recipient: Address, fee_bps: u16) -> Self {
        self.fee_recipient = Some(recipient);
        self.fee_bps = fee_bps;
        self
    }

    pub fn with_power_controller(mut self, controller: Address) -> Self {
        self.power_controller = Some(controller);
        self
    }

    pub fn with_vault_factory(mut self, factory: Address) -> Self {
        self.vault_factory = Some(factory);
        self
    }

    pub fn with_bonus_token(mut self, token: Address) -> Self {
        self.bonus_tokens.push(token);
        self
    }

    pub fn with_hook(mut self, hook: Box<dyn StakeHook>) -> Self {
        self.hook = Some(hook);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Chain {
    chain_id: u64,
    now: Timestamp,
    deployer: Address,
    nonce: u64,
    template: Address,
    ledger: InMemoryLedger,
    vaults: VaultRegistry,
    programs: BTreeMap<Address, Aludel>,
    catalog: BTreeMap<Address, ProgramInfo>,
    log: EventLog,
}

impl Chain {
    /// A fresh chain with a locked program template already deployed.
    pub fn new(chain_id: u64, genesis: Timestamp) -> Self {
        let deployer = Address::repeat_byte(0xde);
        let mut chain = Self {
            chain_id,
            now: genesis,
            deployer,
            nonce: 0,
            template: Address::ZERO,
            ledger: InMemoryLedger::new(),
            vaults: VaultRegistry::new(),
            programs: BTreeMap::new(),
            catalog: BTreeMap::new(),
            log: EventLog::new(),
        };
        let template_address = chain.next_address();
        chain
            .programs
            .insert(template_address, Aludel::template(template_address));
        chain.template = template_address;
        chain
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn template(&self) -> Address {
        self.template
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    pub fn vaults(&self) -> &VaultRegistry {
        &self.vaults
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn events_since(&self, from: usize) -> &[LogEntry] {
        self.log.since(from)
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.ledger.balance_of(token, holder)
    }

    pub fn program(&self, program: Address) -> Result<&Aludel, AludelError> {
        self.programs
            .get(&program)
            .ok_or_else(|| AludelError::not_found("program", program))
    }

    pub fn program_info(&self, program: Address) -> Option<&ProgramInfo> {
        self.catalog.get(&program)
    }

    pub fn programs(&self) -> impl Iterator<Item = (&Address, &ProgramInfo)> {
        self.catalog.iter()
    }

    fn next_address(&mut self) -> Address {
        let address = derive_address(self.deployer, self.nonce);
        self.nonce += 1;
        address
    }

    /// Run `f` atomically: on error every change it made is rolled back.
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Chain) -> Result<T, AludelError>,
    ) -> Result<T, AludelError> {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(error = %e, "Transaction reverted");
                *self = snapshot;
                Err(e)
            }
        }
    }

    fn with_program<T>(
        &mut self,
        program: Address,
        caller: Address,
        f: impl FnOnce(&mut Aludel, &mut Env<'_>) -> Result<T, AludelError>,
    ) -> Result<T, AludelError> {
        let now = self.now;
        let Chain {
            programs,
            ledger,
            vaults,
            log,
            ..
        } = self;
        let aludel = programs
            .get_mut(&program)
            .ok_or_else(|| AludelError::not_found("program", program))?;
        let mut env = Env {
            now,
            caller,
            ledger,
            vaults,
            log,
        };
        f(aludel, &mut env)
    }

    // ---------------------------------------------------------------------
    // Clock
    // ---------------------------------------------------------------------

    /// Move the clock forward by `seconds`.
    pub fn advance(&mut self, seconds: u64) {
        self.now = self.now.saturating_add(seconds);
        tracing::debug!(now = self.now, "Clock advanced");
    }

    /// Move the clock to `timestamp`. The clock never runs backwards.
    pub fn warp_to(&mut self, timestamp: Timestamp) {
        self.now = self.now.max(timestamp);
    }

    // ---------------------------------------------------------------------
    // Tokens and vaults
    // ---------------------------------------------------------------------

    pub fn create_token(&mut self, symbol: &str, decimals: u8) -> Address {
        let address = self.next_address();
        self.ledger.create_token(address, symbol, decimals);
        tracing::info!(%address, symbol, "Token created");
        address
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), AludelError> {
        self.transact(|chain| Ok(chain.ledger.mint(token, to, amount, &mut chain.log)?))
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), AludelError> {
        self.transact(|chain| Ok(chain.ledger.transfer(token, from, to, amount, &mut chain.log)?))
    }

    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.ledger.approve(token, owner, spender, amount);
    }

    /// Make `token` revert on every transfer, simulating a hostile token.
    pub fn set_token_reverting(&mut self, token: Address, reverting: bool) {
        self.ledger.set_reverting(token, reverting);
    }

    pub fn create_vault_factory(&mut self) -> Address {
        let address = self.next_address();
        self.vaults.add_factory(address);
        tracing::info!(factory = %address, "Vault factory created");
        address
    }

    /// Create a vault owned by `owner` from `factory`.
    pub fn create_vault(&mut self, factory: Address, owner: &Keypair) -> Result<Address, AludelError> {
        let owner_key = owner.public_key_bytes();
        self.transact(|chain| {
            let address = chain.next_address();
            let chain_id = chain.chain_id;
            chain
                .vaults
                .create_vault(factory, address, chain_id, owner_key)?;
            Ok(address)
        })
    }

    /// Sign a lock permission for `amount` of `program`'s staking token,
    /// over `vault`'s current nonce.
    pub fn lock_permission(
        &self,
        owner: &Keypair,
        program: Address,
        vault: Address,
        amount: U256,
    ) -> Result<SignedPermission, AludelError> {
        self.permission(PermissionKind::Lock, owner, program, vault, amount)
    }

    pub fn unlock_permission(
        &self,
        owner: &Keypair,
        program: Address,
        vault: Address,
        amount: U256,
    ) -> Result<SignedPermission, AludelError> {
        self.permission(PermissionKind::Unlock, owner, program, vault, amount)
    }

    fn permission(
        &self,
        kind: PermissionKind,
        owner: &Keypair,
        program: Address,
        vault: Address,
        amount: U256,
    ) -> Result<SignedPermission, AludelError> {
        let staking_token = self.program(program)?.get_aludel_data()?.staking_token;
        let nonce = self
            .vaults
            .get(vault)
            .ok_or_else(|| AludelError::not_found("vault", vault))?
            .nonce();
        Ok(sign_permission(
            kind,
            owner,
            self.chain_id,
            vault,
            program,
            staking_token,
            amount,
            nonce,
        ))
    }

    // ---------------------------------------------------------------------
    // Program lifecycle
    // ---------------------------------------------------------------------

    /// Launch a new program from the template, owned by `owner`.
    pub fn launch(&mut self, owner: Address, params: LaunchParams) -> Result<Address, AludelError> {
        self.transact(|chain| {
            let template = chain.template;
            let program = chain.next_address();
            let reward_pool = chain.next_address();
            let power_switch = chain.next_address();

            let mut instance = chain.program(template)?.instantiate(program);
            instance.initialize(
                InitParams {
                    owner,
                    reward_pool,
                    power_switch,
                    power_controller: params.power_controller.unwrap_or(owner),
                    staking_token: params.staking_token,
                    reward_token: params.reward_token,
                    reward_scaling: params.reward_scaling,
                    fee_recipient: params.fee_recipient.unwrap_or(owner),
                    fee_bps: params.fee_bps,
                    hook: params.hook,
                },
                chain.now,
            )?;
            chain.programs.insert(program, instance);

            if let Some(factory) = params.vault_factory {
                chain.with_program(program, owner, |p, env| p.register_vault_factory(env, factory))?;
            }
            for token in params.bonus_tokens {
                chain.with_program(program, owner, |p, env| p.register_bonus_token(env, token))?;
            }

            chain.catalog.insert(
                program,
                ProgramInfo {
                    name: params.name,
                    url: params.url,
                    start_time: params.start_time.unwrap_or(chain.now),
                    template,
                    owner,
                },
            );
            tracing::info!(%program, %owner, "Program launched");
            Ok(program)
        })
    }

    /// Initialize an existing instance directly. Fails on the template and on
    /// anything already initialized.
    pub fn initialize(&mut self, program: Address, params: InitParams) -> Result<(), AludelError> {
        let now = self.now;
        self.transact(|chain| {
            chain
                .programs
                .get_mut(&program)
                .ok_or_else(|| AludelError::not_found("program", program))?
                .initialize(params, now)
        })
    }

    // ---------------------------------------------------------------------
    // Program operations
    // ---------------------------------------------------------------------

    pub fn fund(
        &mut self,
        program: Address,
        caller: Address,
        amount: U256,
        duration: u64,
    ) -> Result<U256, AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| p.fund(env, amount, duration))
        })
    }

    pub fn stake(
        &mut self,
        program: Address,
        caller: Address,
        vault: Address,
        amount: U256,
        permission: &SignedPermission,
    ) -> Result<(), AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| {
                p.stake(env, vault, amount, permission)
            })
        })
    }

    pub fn unstake_and_claim(
        &mut self,
        program: Address,
        caller: Address,
        vault: Address,
        indices: &[usize],
        amounts: &[U256],
        permission: &SignedPermission,
    ) -> Result<ClaimReceipt, AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| {
                p.unstake_and_claim(env, vault, indices, amounts, permission)
            })
        })
    }

    /// Rage-quit `vault`'s lock held by `program` on `token`, with
    /// `gas_limit` gas for the whole call.
    ///
    /// Returns whether the program accepted the notification.
    pub fn rage_quit(
        &mut self,
        caller: Address,
        vault: Address,
        program: Address,
        token: Address,
        gas_limit: u64,
    ) -> Result<bool, AludelError> {
        let now = self.now;
        self.transact(|chain| {
            let Chain {
                programs,
                vaults,
                log,
                ..
            } = chain;
            let crucible = vaults
                .get_mut(vault)
                .ok_or_else(|| AludelError::not_found("vault", vault))?;
            let handler = programs
                .get_mut(&program)
                .ok_or_else(|| AludelError::not_found("program", program))?;
            let mut meter = GasMeter::new(gas_limit);
            let notified = crucible.rage_quit(caller, program, token, handler, &mut meter, now, log)?;
            tracing::debug!(%vault, gas_used = meter.used(), gas_limit, "Rage quit metered");
            Ok(notified)
        })
    }

    pub fn register_vault_factory(
        &mut self,
        program: Address,
        caller: Address,
        factory: Address,
    ) -> Result<(), AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| p.register_vault_factory(env, factory))
        })
    }

    pub fn remove_vault_factory(
        &mut self,
        program: Address,
        caller: Address,
        factory: Address,
    ) -> Result<(), AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| p.remove_vault_factory(env, factory))
        })
    }

    pub fn register_bonus_token(
        &mut self,
        program: Address,
        caller: Address,
        token: Address,
    ) -> Result<(), AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| p.register_bonus_token(env, token))
        })
    }

    pub fn rescue_tokens_from_reward_pool(
        &mut self,
        program: Address,
        caller: Address,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| {
                p.rescue_tokens_from_reward_pool(env, token, recipient, amount)
            })
        })
    }

    pub fn transfer_ownership(
        &mut self,
        program: Address,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| p.transfer_ownership(env, new_owner))
        })
    }

    pub fn power_on(&mut self, program: Address, caller: Address) -> Result<(), AludelError> {
        self.transact(|chain| chain.with_program(program, caller, |p, env| p.power_on(env)))
    }

    pub fn power_off(&mut self, program: Address, caller: Address) -> Result<(), AludelError> {
        self.transact(|chain| chain.with_program(program, caller, |p, env| p.power_off(env)))
    }

    pub fn emergency_shutdown(&mut self, program: Address, caller: Address) -> Result<(), AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| p.emergency_shutdown(env))
        })
    }

    pub fn rescue_reward_pool(
        &mut self,
        program: Address,
        caller: Address,
        tokens: &[Address],
        recipient: Address,
    ) -> Result<Vec<(Address, U256)>, AludelError> {
        self.transact(|chain| {
            chain.with_program(program, caller, |p, env| {
                p.rescue_reward_pool(env, tokens, recipient)
            })
        })
    }
}
