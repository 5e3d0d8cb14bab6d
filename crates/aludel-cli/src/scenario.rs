// crates/aludel-cli/src/scenario.rs
//
// Scenario files: a program launch, a set of stakers, and an ordered list of
// steps to replay against the engine.
//
// Amounts are decimal strings with an optional power-of-ten suffix
// ("1000e18", "2_500"). Durations are seconds or strings with an s/m/h/d
// unit ("60d", "12h").

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use aludel_core::{AludelError, U256};
use aludel_engine::{RewardScaling, DEFAULT_FEE_BPS};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

pub const STAKING_SYMBOL: &str = "STK";
pub const REWARD_SYMBOL: &str = "RWD";
pub const DEFAULT_FACTORY: &str = "default";

/// Genesis used when a scenario does not pin `start_time`.
pub const DEFAULT_GENESIS: u64 = 1_700_000_000;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("start_time {0} is before the Unix epoch")]
    InvalidStartTime(DateTime<Utc>),

    #[error("duplicate staker '{0}'")]
    DuplicateStaker(String),

    #[error("step {step}: unknown staker '{name}'")]
    UnknownStaker { step: usize, name: String },

    #[error("step {step}: unknown token '{symbol}'")]
    UnknownToken { step: usize, symbol: String },

    #[error("whitelist names unknown staker '{0}'")]
    UnknownWhitelisted(String),

    #[error("a program takes one stake hook: set either timelock or whitelist")]
    ConflictingHooks,

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] AludelError),
}

/// A token amount in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Amount(pub U256);

impl FromStr for Amount {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScenarioError::InvalidAmount(s.to_string());
        let cleaned: String = s.trim().chars().filter(|c| *c != '_').collect();
        let (mantissa, exponent) = match cleaned.split_once(|c: char| c == 'e' || c == 'E') {
            Some((m, e)) => (m, e.parse::<u32>().map_err(|_| invalid())?),
            None => (cleaned.as_str(), 0),
        };
        if mantissa.is_empty() || !mantissa.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let mantissa = U256::from_str_radix(mantissa, 10).map_err(|_| invalid())?;
        let scale = U256::from(10u64)
            .checked_pow(U256::from(exponent))
            .ok_or_else(invalid)?;
        mantissa.checked_mul(scale).map(Amount).ok_or_else(invalid)
    }
}

impl TryFrom<String> for Amount {
    type Error = ScenarioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

/// A span of time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDuration")]
pub struct Seconds(pub u64);

impl FromStr for Seconds {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScenarioError::InvalidDuration(s.to_string());
        let s = s.trim();
        let (digits, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
            Some((i, _)) => s.split_at(i),
            None => (s, "s"),
        };
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        let multiplier = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3_600,
            "d" => 86_400,
            _ => return Err(invalid()),
        };
        value.checked_mul(multiplier).map(Seconds).ok_or_else(invalid)
    }
}

impl TryFrom<RawDuration> for Seconds {
    type Error = ScenarioError;

    fn try_from(value: RawDuration) -> Result<Self, Self::Error> {
        match value {
            RawDuration::Seconds(s) => Ok(Seconds(s)),
            RawDuration::Text(text) => text.parse(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// RFC 3339 timestamp of the first block, e.g. "2024-01-01T00:00:00Z".
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    pub program: ProgramSetup,

    #[serde(default)]
    pub stakers: Vec<StakerSetup>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSetup {
    #[serde(default = "default_program_name")]
    pub name: String,

    pub floor: u64,
    pub ceiling: u64,
    pub scaling_time: Seconds,

    #[serde(default = "default_fee_bps")]
    pub fee_bps: u16,

    /// Minimum age before a stake record may be unstaked.
    #[serde(default)]
    pub timelock: Option<Seconds>,

    /// When set, only these stakers may stake.
    #[serde(default)]
    pub whitelist: Option<Vec<String>>,

    /// Bonus token symbols created and registered at launch.
    #[serde(default)]
    pub bonus_tokens: Vec<String>,

    /// Reward tokens minted to the admin before the first step.
    #[serde(default = "default_admin_balance")]
    pub admin_balance: Amount,
}

fn default_program_name() -> String {
    "Aludel".to_string()
}

fn default_fee_bps() -> u16 {
    DEFAULT_FEE_BPS
}

fn default_admin_balance() -> Amount {
    Amount(U256::from(10u64).pow(U256::from(24u64)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct StakerSetup {
    pub name: String,

    /// Staking tokens minted into the staker's vault.
    pub balance: Amount,

    /// Factory the staker's vault is created from.
    #[serde(default = "default_factory")]
    pub factory: String,
}

fn default_factory() -> String {
    DEFAULT_FACTORY.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,

    /// Substring the step's error message must contain. The step must fail.
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Fund {
        amount: Amount,
        duration: Seconds,
    },
    Stake {
        staker: String,
        amount: Amount,
    },
    Unstake {
        staker: String,
        indices: Vec<usize>,
        amounts: Vec<Amount>,
    },
    /// Unstake every record the staker holds.
    UnstakeAll {
        staker: String,
    },
    RageQuit {
        staker: String,
        #[serde(default)]
        gas_limit: Option<u64>,
    },
    Advance {
        duration: Seconds,
    },
    PowerOff,
    PowerOn,
    Shutdown,
    RegisterVaultFactory {
        factory: String,
    },
    RemoveVaultFactory {
        factory: String,
    },
    /// Create (if needed) and register a bonus token by symbol.
    RegisterBonusToken {
        token: String,
    },
    /// Mint tokens straight into the reward pool.
    FundBonus {
        token: String,
        amount: Amount,
    },
    /// Drain the reward pool to the admin after a shutdown.
    Rescue {
        tokens: Vec<String>,
    },
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Fund { .. } => "fund",
            Action::Stake { .. } => "stake",
            Action::Unstake { .. } => "unstake",
            Action::UnstakeAll { .. } => "unstake_all",
            Action::RageQuit { .. } => "rage_quit",
            Action::Advance { .. } => "advance",
            Action::PowerOff => "power_off",
            Action::PowerOn => "power_on",
            Action::Shutdown => "shutdown",
            Action::RegisterVaultFactory { .. } => "register_vault_factory",
            Action::RemoveVaultFactory { .. } => "remove_vault_factory",
            Action::RegisterBonusToken { .. } => "register_bonus_token",
            Action::FundBonus { .. } => "fund_bonus",
            Action::Rescue { .. } => "rescue",
        }
    }

    pub fn staker(&self) -> Option<&str> {
        match self {
            Action::Stake { staker, .. }
            | Action::Unstake { staker, .. }
            | Action::UnstakeAll { staker }
            | Action::RageQuit { staker, .. } => Some(staker),
            _ => None,
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = toml::from_str(contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn genesis(&self) -> Result<u64, ScenarioError> {
        match self.start_time {
            Some(t) => u64::try_from(t.timestamp()).map_err(|_| ScenarioError::InvalidStartTime(t)),
            None => Ok(DEFAULT_GENESIS),
        }
    }

    pub fn reward_scaling(&self) -> Result<RewardScaling, ScenarioError> {
        Ok(RewardScaling::new(
            self.program.floor,
            self.program.ceiling,
            self.program.scaling_time.0,
        )?)
    }

    /// Check cross references: every staker and token a step names must
    /// exist by the time the step runs.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.genesis()?;
        self.reward_scaling()?;
        if self.program.timelock.is_some() && self.program.whitelist.is_some() {
            return Err(ScenarioError::ConflictingHooks);
        }

        let mut stakers = BTreeSet::new();
        for staker in &self.stakers {
            if !stakers.insert(staker.name.as_str()) {
                return Err(ScenarioError::DuplicateStaker(staker.name.clone()));
            }
        }
        for name in self.program.whitelist.iter().flatten() {
            if !stakers.contains(name.as_str()) {
                return Err(ScenarioError::UnknownWhitelisted(name.clone()));
            }
        }

        let mut tokens: BTreeSet<&str> = [STAKING_SYMBOL, REWARD_SYMBOL].into_iter().collect();
        tokens.extend(self.program.bonus_tokens.iter().map(String::as_str));

        for (step, entry) in self.steps.iter().enumerate() {
            if let Some(name) = entry.action.staker() {
                if !stakers.contains(name) {
                    return Err(ScenarioError::UnknownStaker {
                        step,
                        name: name.to_string(),
                    });
                }
            }
            match &entry.action {
                Action::RegisterBonusToken { token } => {
                    tokens.insert(token.as_str());
                }
                Action::FundBonus { token, .. } => {
                    if !tokens.contains(token.as_str()) {
                        return Err(ScenarioError::UnknownToken {
                            step,
                            symbol: token.clone(),
                        });
                    }
                }
                Action::Rescue { tokens: rescued } => {
                    if let Some(symbol) = rescued.iter().find(|t| !tokens.contains(t.as_str())) {
                        return Err(ScenarioError::UnknownToken {
                            step,
                            symbol: symbol.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}
