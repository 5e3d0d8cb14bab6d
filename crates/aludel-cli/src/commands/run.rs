// crates/aludel-cli/src/commands/run.rs
//
// `aludel run <scenario>`: replay a scenario through the chain service and
// report every step's outcome together with the final accounting.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use aludel_core::{Address, AludelError, Keypair, U256};
use aludel_engine::{
    Chain, ChainHandle, ChainService, ClaimReceipt, LaunchParams, TimelockHook, WhitelistHook,
};
use chrono::DateTime;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio::task::JoinHandle;

use crate::config::SimConfig;
use crate::output::{format_json, format_table, Field, OutputFormat};
use crate::scenario::{
    Action, Scenario, ScenarioError, Step, DEFAULT_FACTORY, REWARD_SYMBOL, STAKING_SYMBOL,
};

#[derive(Debug, Args)]
pub struct RunCmd {
    /// Path to the scenario TOML file.
    pub scenario: PathBuf,

    /// Also print the full event log.
    #[arg(long)]
    pub events: bool,
}

/// Run the scenario command.
pub async fn run(
    cmd: &RunCmd,
    config: &SimConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = Scenario::load(&cmd.scenario)?;
    tracing::info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        "Running scenario"
    );

    let mut sim = Simulation::launch(&scenario, config)?;
    let steps = sim.replay(&scenario.steps).await;
    let report = sim.report(&scenario.name, steps, cmd.events).await?;
    sim.shutdown().await;

    print_report(&report, format);
    if report.failures > 0 {
        return Err(format!("{} of {} steps failed", report.failures, report.steps.len()).into());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    ExpectedRevert,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok => write!(f, "ok"),
            Outcome::ExpectedRevert => write!(f, "reverted (expected)"),
            Outcome::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StepReport {
    pub step: usize,
    pub time: String,
    pub action: String,
    pub outcome: Outcome,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StakerRow {
    pub staker: String,
    pub vault: String,
    pub staked: String,
    pub records: usize,
    pub stake_units: String,
    pub pending_reward: String,
    pub reward_balance: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct EventRow {
    pub index: usize,
    pub emitter: String,
    pub event: String,
    pub fields: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub steps: Vec<StepReport>,
    pub program: Vec<Field>,
    pub stakers: Vec<StakerRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventRow>,
    pub failures: usize,
}

struct Staker {
    keypair: Keypair,
    vault: Address,
}

/// A launched program running inside a `ChainService`, plus the names the
/// scenario uses for its addresses.
pub struct Simulation {
    handle: ChainHandle,
    join: JoinHandle<Chain>,
    now: u64,
    program: Address,
    admin: Address,
    fee_recipient: Address,
    pool: Address,
    staking: Address,
    reward: Address,
    tokens: BTreeMap<String, Address>,
    factories: BTreeMap<String, Address>,
    stakers: BTreeMap<String, Staker>,
    rage_quit_gas_limit: u64,
}

impl Simulation {
    /// Build the chain described by `scenario` and hand it to a new service
    /// task. Must be called from within a tokio runtime.
    pub fn launch(scenario: &Scenario, config: &SimConfig) -> Result<Self, ScenarioError> {
        let mut chain = Chain::new(config.chain_id, scenario.genesis()?);
        let admin = Keypair::from_seed(b"aludel-admin").address();
        let fee_recipient = Keypair::from_seed(b"aludel-fee-recipient").address();

        let staking = chain.create_token(STAKING_SYMBOL, 18);
        let reward = chain.create_token(REWARD_SYMBOL, 9);
        let mut tokens = BTreeMap::new();
        tokens.insert(STAKING_SYMBOL.to_string(), staking);
        tokens.insert(REWARD_SYMBOL.to_string(), reward);

        let mut factories = BTreeMap::new();
        factories.insert(DEFAULT_FACTORY.to_string(), chain.create_vault_factory());
        for setup in &scenario.stakers {
            if !factories.contains_key(&setup.factory) {
                factories.insert(setup.factory.clone(), chain.create_vault_factory());
            }
        }

        let mut stakers = BTreeMap::new();
        for setup in &scenario.stakers {
            let keypair = Keypair::from_seed(setup.name.as_bytes());
            let factory = factories
                .get(&setup.factory)
                .copied()
                .ok_or_else(|| AludelError::NotFound(format!("factory {}", setup.factory)))?;
            let vault = chain.create_vault(factory, &keypair)?;
            chain.mint(staking, vault, setup.balance.0)?;
            stakers.insert(setup.name.clone(), Staker { keypair, vault });
        }

        let default_factory = factories
            .get(DEFAULT_FACTORY)
            .copied()
            .ok_or_else(|| AludelError::NotFound(format!("factory {}", DEFAULT_FACTORY)))?;
        let mut params = LaunchParams::new(staking, reward, scenario.reward_scaling()?)
            .with_name(&scenario.program.name, "")
            .with_fee(fee_recipient, scenario.program.fee_bps)
            .with_vault_factory(default_factory);
        for symbol in &scenario.program.bonus_tokens {
            let token = chain.create_token(symbol, 18);
            tokens.insert(symbol.clone(), token);
            params = params.with_bonus_token(token);
        }
        if let Some(lock) = scenario.program.timelock {
            params = params.with_hook(Box::new(TimelockHook::new(lock.0)));
        }
        if let Some(names) = &scenario.program.whitelist {
            let mut allowed = Vec::with_capacity(names.len());
            for name in names {
                let staker = stakers
                    .get(name)
                    .ok_or_else(|| ScenarioError::UnknownWhitelisted(name.clone()))?;
                allowed.push(staker.vault);
            }
            params = params.with_hook(Box::new(WhitelistHook::new(allowed)));
        }

        let program = chain.launch(admin, params)?;
        chain.mint(reward, admin, scenario.program.admin_balance.0)?;
        chain.approve(reward, admin, program, U256::MAX);
        let pool = chain.program(program)?.get_aludel_data()?.reward_pool;
        let now = chain.now();

        let (handle, join) = ChainService::spawn(chain, config.service_queue_depth);
        Ok(Self {
            handle,
            join,
            now,
            program,
            admin,
            fee_recipient,
            pool,
            staking,
            reward,
            tokens,
            factories,
            stakers,
            rage_quit_gas_limit: config.rage_quit_gas_limit,
        })
    }

    /// Execute every step in order. A failing step is recorded and the
    /// replay continues with the next one.
    pub async fn replay(&mut self, steps: &[Step]) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let result = self.execute(&step.action).await;
            let (outcome, detail) = match (result, &step.expect_error) {
                (Ok(detail), None) => (Outcome::Ok, detail),
                (Ok(detail), Some(expected)) => (
                    Outcome::Failed,
                    format!("expected error containing '{}', but succeeded: {}", expected, detail),
                ),
                (Err(e), Some(expected)) if e.to_string().contains(expected.as_str()) => {
                    (Outcome::ExpectedRevert, e.to_string())
                }
                (Err(e), _) => (Outcome::Failed, e.to_string()),
            };

            let action = step.action.label();
            if outcome == Outcome::Failed {
                tracing::warn!(step = index, action, %detail, "Step failed");
            } else {
                tracing::debug!(step = index, action, %outcome, "Step done");
            }
            reports.push(StepReport {
                step: index,
                time: format_time(self.now),
                action: action.to_string(),
                outcome,
                detail,
            });
        }
        reports
    }

    async fn execute(&mut self, action: &Action) -> Result<String, AludelError> {
        let program = self.program;
        let admin = self.admin;
        match action {
            Action::Fund { amount, duration } => {
                let (amount, duration) = (amount.0, duration.0);
                let net = self
                    .handle
                    .execute(move |c| c.fund(program, admin, amount, duration))
                    .await?;
                Ok(format!("net {} over {}s", net, duration))
            }
            Action::Stake { staker, amount } => {
                let (keypair, vault) = self.staker(staker)?;
                let amount = amount.0;
                self.handle
                    .execute(move |c| {
                        let permission = c.lock_permission(&keypair, program, vault, amount)?;
                        c.stake(program, keypair.address(), vault, amount, &permission)
                    })
                    .await?;
                Ok(format!("staked {}", amount))
            }
            Action::Unstake {
                staker,
                indices,
                amounts,
            } => {
                let (keypair, vault) = self.staker(staker)?;
                let indices = indices.clone();
                let amounts: Vec<U256> = amounts.iter().map(|a| a.0).collect();
                let receipt = self
                    .handle
                    .execute(move |c| unstake(c, program, &keypair, vault, &indices, &amounts))
                    .await?;
                Ok(self.describe_receipt(&receipt))
            }
            Action::UnstakeAll { staker } => {
                let (keypair, vault) = self.staker(staker)?;
                let receipt = self
                    .handle
                    .execute(move |c| {
                        let data = c.program(program)?.get_vault_data(vault)?;
                        let indices: Vec<usize> = (0..data.stakes.len()).collect();
                        let amounts: Vec<U256> = data.stakes.iter().map(|r| r.amount).collect();
                        unstake(c, program, &keypair, vault, &indices, &amounts)
                    })
                    .await?;
                Ok(self.describe_receipt(&receipt))
            }
            Action::RageQuit { staker, gas_limit } => {
                let (keypair, vault) = self.staker(staker)?;
                let gas_limit = gas_limit.unwrap_or(self.rage_quit_gas_limit);
                let staking = self.staking;
                let notified = self
                    .handle
                    .execute(move |c| c.rage_quit(keypair.address(), vault, program, staking, gas_limit))
                    .await?;
                Ok(format!("notified={} gas_limit={}", notified, gas_limit))
            }
            Action::Advance { duration } => {
                let seconds = duration.0;
                self.now = self
                    .handle
                    .execute(move |c| {
                        c.advance(seconds);
                        Ok(c.now())
                    })
                    .await?;
                Ok(format!("+{}s", seconds))
            }
            Action::PowerOff => {
                self.handle.execute(move |c| c.power_off(program, admin)).await?;
                Ok("offline".to_string())
            }
            Action::PowerOn => {
                self.handle.execute(move |c| c.power_on(program, admin)).await?;
                Ok("online".to_string())
            }
            Action::Shutdown => {
                self.handle
                    .execute(move |c| c.emergency_shutdown(program, admin))
                    .await?;
                Ok("shutdown".to_string())
            }
            Action::RegisterVaultFactory { factory } => {
                let address = self.factory(factory).await?;
                self.handle
                    .execute(move |c| c.register_vault_factory(program, admin, address))
                    .await?;
                Ok(format!("{} registered", factory))
            }
            Action::RemoveVaultFactory { factory } => {
                let address = self.factory(factory).await?;
                self.handle
                    .execute(move |c| c.remove_vault_factory(program, admin, address))
                    .await?;
                Ok(format!("{} removed", factory))
            }
            Action::RegisterBonusToken { token } => {
                let address = self.token(token).await?;
                self.handle
                    .execute(move |c| c.register_bonus_token(program, admin, address))
                    .await?;
                Ok(format!("{} registered", token))
            }
            Action::FundBonus { token, amount } => {
                let address = self.token(token).await?;
                let (pool, amount) = (self.pool, amount.0);
                self.handle
                    .execute(move |c| c.mint(address, pool, amount))
                    .await?;
                Ok(format!("{} {} into pool", amount, token))
            }
            Action::Rescue { tokens } => {
                let mut addresses = Vec::with_capacity(tokens.len());
                for symbol in tokens {
                    addresses.push(self.token(symbol).await?);
                }
                let rescued = self
                    .handle
                    .execute(move |c| c.rescue_reward_pool(program, admin, &addresses, admin))
                    .await?;
                let parts: Vec<String> = rescued
                    .iter()
                    .map(|(token, amount)| format!("{} {}", amount, self.label(*token)))
                    .collect();
                Ok(format!("rescued {}", parts.join(", ")))
            }
        }
    }

    fn staker(&self, name: &str) -> Result<(Keypair, Address), AludelError> {
        self.stakers
            .get(name)
            .map(|s| (s.keypair.clone(), s.vault))
            .ok_or_else(|| AludelError::NotFound(format!("staker {}", name)))
    }

    /// Address of the factory named `name`, created on first use.
    async fn factory(&mut self, name: &str) -> Result<Address, AludelError> {
        if let Some(address) = self.factories.get(name) {
            return Ok(*address);
        }
        let address = self.handle.execute(|c| Ok(c.create_vault_factory())).await?;
        self.factories.insert(name.to_string(), address);
        Ok(address)
    }

    /// Address of the token with `symbol`, created on first use.
    async fn token(&mut self, symbol: &str) -> Result<Address, AludelError> {
        if let Some(address) = self.tokens.get(symbol) {
            return Ok(*address);
        }
        let owned = symbol.to_string();
        let address = self
            .handle
            .execute(move |c| Ok(c.create_token(&owned, 18)))
            .await?;
        self.tokens.insert(symbol.to_string(), address);
        Ok(address)
    }

    fn describe_receipt(&self, receipt: &ClaimReceipt) -> String {
        let mut detail = format!("unstaked {}, reward {}", receipt.amount, receipt.reward);
        for (token, amount) in receipt.bonus.iter().filter(|(_, a)| !a.is_zero()) {
            detail.push_str(&format!(", {} {}", amount, self.label(*token)));
        }
        detail
    }

    /// Human-readable name for a known address.
    fn label(&self, address: Address) -> String {
        if address == self.program {
            return "program".to_string();
        }
        if address == self.pool {
            return "pool".to_string();
        }
        if address == self.admin {
            return "admin".to_string();
        }
        if address == self.fee_recipient {
            return "fee_recipient".to_string();
        }
        if let Some((symbol, _)) = self.tokens.iter().find(|(_, a)| **a == address) {
            return symbol.clone();
        }
        if let Some((name, _)) = self.stakers.iter().find(|(_, s)| s.vault == address) {
            return format!("vault:{}", name);
        }
        if let Some((name, _)) = self.factories.iter().find(|(_, a)| **a == address) {
            return format!("factory:{}", name);
        }
        address.to_string()
    }

    /// Summarize the committed chain state.
    pub async fn report(
        &self,
        scenario: &str,
        steps: Vec<StepReport>,
        with_events: bool,
    ) -> Result<RunReport, AludelError> {
        let chain = self.handle.snapshot().await?;
        let now = chain.now();
        let aludel = chain.program(self.program)?;
        let data = aludel.get_aludel_data()?;

        let program = vec![
            Field::new("program", self.program),
            Field::new("time", format_time(now)),
            Field::new("power", aludel.power_state()?),
            Field::new("total_stake", data.total_stake),
            Field::new("total_stake_units", aludel.get_current_total_stake_units(now)?),
            Field::new("reward_shares_outstanding", data.reward_shares_outstanding),
            Field::new("unlocked_rewards", aludel.get_current_unlocked_rewards(now)?),
            Field::new("reward_schedules", data.reward_schedules.len()),
            Field::new("pool_reward_balance", chain.balance_of(self.reward, self.pool)),
            Field::new("fee_recipient_balance", chain.balance_of(self.reward, self.fee_recipient)),
            Field::new("admin_reward_balance", chain.balance_of(self.reward, self.admin)),
            Field::new("bonus_tokens", aludel.get_bonus_tokens()?.len()),
            Field::new("vault_factories", aludel.get_vault_factories()?.len()),
        ];

        let mut stakers = Vec::with_capacity(self.stakers.len());
        for (name, staker) in &self.stakers {
            let vault = aludel.get_vault_data(staker.vault)?;
            stakers.push(StakerRow {
                staker: name.clone(),
                vault: staker.vault.to_string(),
                staked: vault.total_stake.to_string(),
                records: vault.stakes.len(),
                stake_units: aludel
                    .get_current_vault_stake_units(staker.vault, now)?
                    .to_string(),
                pending_reward: aludel.get_current_vault_reward(staker.vault, now)?.to_string(),
                reward_balance: chain.balance_of(self.reward, staker.vault).to_string(),
            });
        }

        let events = if with_events {
            chain
                .log()
                .entries()
                .iter()
                .enumerate()
                .map(|(index, entry)| {
                    let mut fields = serde_json::to_value(&entry.event)?;
                    if let Some(map) = fields.as_object_mut() {
                        map.remove("event");
                    }
                    Ok(EventRow {
                        index,
                        emitter: self.label(entry.emitter),
                        event: entry.event.name().to_string(),
                        fields: fields.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, serde_json::Error>>()?
        } else {
            Vec::new()
        };

        let failures = steps.iter().filter(|s| s.outcome == Outcome::Failed).count();
        Ok(RunReport {
            scenario: scenario.to_string(),
            steps,
            program,
            stakers,
            events,
            failures,
        })
    }

    /// Stop the service and wait for its task to finish.
    pub async fn shutdown(self) {
        let Simulation { handle, join, .. } = self;
        drop(handle);
        match join.await {
            Ok(chain) => tracing::debug!(events = chain.log().len(), "Simulation finished"),
            Err(e) => tracing::warn!(error = %e, "Chain service task failed"),
        }
    }
}

fn unstake(
    chain: &mut Chain,
    program: Address,
    keypair: &Keypair,
    vault: Address,
    indices: &[usize],
    amounts: &[U256],
) -> Result<ClaimReceipt, AludelError> {
    let total = amounts
        .iter()
        .try_fold(U256::ZERO, |acc, a| acc.checked_add(*a))
        .ok_or(AludelError::ArithmeticOverflow)?;
    let permission = chain.unlock_permission(keypair, program, vault, total)?;
    chain.unstake_and_claim(program, keypair.address(), vault, indices, amounts, &permission)
}

fn format_time(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", format_json(report)),
        OutputFormat::Table => {
            println!("Scenario: {}", report.scenario);
            println!();
            println!("{}", format_table(&report.steps));
            println!();
            println!("Program");
            println!("{}", format_table(&report.program));
            if !report.stakers.is_empty() {
                println!();
                println!("Stakers");
                println!("{}", format_table(&report.stakers));
            }
            if !report.events.is_empty() {
                println!();
                println!("Events");
                println!("{}", format_table(&report.events));
            }
            println!();
            println!(
                "{} steps, {} failed",
                report.steps.len(),
                report.failures
            );
        }
    }
}
