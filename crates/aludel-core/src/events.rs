// crates/aludel-core/src/events.rs
//
// Wire-visible events. Program event names and argument order match the
// deployed contract so an indexer can diff logs against the live chain.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// An event together with the address that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub emitter: Address,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// Emitted by `fund`; `amount` is net of the protocol fee.
    AludelFunded { amount: U256, duration: u64 },
    Staked { vault: Address, amount: U256 },
    Unstaked { vault: Address, amount: U256 },
    RewardClaimed {
        vault: Address,
        token: Address,
        amount: U256,
    },
    VaultFactoryRegistered { factory: Address },
    VaultFactoryRemoved { factory: Address },
    BonusTokenRegistered { token: Address },

    /// Emitted by a power switch on every transition.
    PowerOn,
    PowerOff,
    EmergencyShutdown,

    /// Emitted by a vault when its owner rage-quits a lock.
    RageQuit {
        delegate: Address,
        token: Address,
        notified: bool,
    },

    /// Emitted by a token ledger on balance movements.
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
}

impl Event {
    /// The on-chain event name.
    pub fn name(&self) -> &'static str {
        match self {
            Event::AludelFunded { .. } => "AludelFunded",
            Event::Staked { .. } => "Staked",
            Event::Unstaked { .. } => "Unstaked",
            Event::RewardClaimed { .. } => "RewardClaimed",
            Event::VaultFactoryRegistered { .. } => "VaultFactoryRegistered",
            Event::VaultFactoryRemoved { .. } => "VaultFactoryRemoved",
            Event::BonusTokenRegistered { .. } => "BonusTokenRegistered",
            Event::PowerOn => "PowerOn",
            Event::PowerOff => "PowerOff",
            Event::EmergencyShutdown => "EmergencyShutdown",
            Event::RageQuit { .. } => "RageQuit",
            Event::Transfer { .. } => "Transfer",
        }
    }
}

/// Append-only event sink handed to operations alongside their state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, emitter: Address, event: Event) {
        self.entries.push(LogEntry { emitter, event });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries appended at or after position `from`.
    pub fn since(&self, from: usize) -> &[LogEntry] {
        &self.entries[from.min(self.entries.len())..]
    }
}
