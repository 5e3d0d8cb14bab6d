// crates/aludel-engine/src/power.rs
//
// Power switch for a reward program and its reward pool.
//
// Valid transitions:
//   Online -> Offline -> Online   (power controller toggles)
//   Online | Offline -> Shutdown  (one-way, power controller only)

use std::fmt;

use aludel_core::{Address, AludelError, Event, EventLog};
use serde::{Deserialize, Serialize};

/// Power states of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    /// Every operation is available.
    Online,
    /// Paused: staking, funding and most admin calls are refused, exits stay open.
    Offline,
    /// Terminal: only rage-quit and the emergency rescue remain.
    Shutdown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Online => write!(f, "Online"),
            PowerState::Offline => write!(f, "Offline"),
            PowerState::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Tri-state switch owned by a power controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerSwitch {
    address: Address,
    controller: Address,
    state: PowerState,
}

impl PowerSwitch {
    /// Create a switch in the Online state.
    pub fn new(address: Address, controller: Address) -> Self {
        Self {
            address,
            controller,
            state: PowerState::Online,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn controller(&self) -> Address {
        self.controller
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.state == PowerState::Online
    }

    pub fn is_offline(&self) -> bool {
        self.state == PowerState::Offline
    }

    pub fn is_shutdown(&self) -> bool {
        self.state == PowerState::Shutdown
    }

    /// Gate for operations that need the program fully online.
    pub fn require_online(&self) -> Result<(), AludelError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(AludelError::PoweredNotOnline)
        }
    }

    /// Gate for exit paths that stay open while paused.
    pub fn require_not_shutdown(&self) -> Result<(), AludelError> {
        if self.is_shutdown() {
            Err(AludelError::PoweredIsShutdown)
        } else {
            Ok(())
        }
    }

    pub fn power_on(&mut self, caller: Address, log: &mut EventLog) -> Result<(), AludelError> {
        self.require_controller(caller)?;
        if self.state != PowerState::Offline {
            return Err(AludelError::CannotPowerOn);
        }
        self.transition(PowerState::Online);
        log.emit(self.address, Event::PowerOn);
        Ok(())
    }

    pub fn power_off(&mut self, caller: Address, log: &mut EventLog) -> Result<(), AludelError> {
        self.require_controller(caller)?;
        if self.state != PowerState::Online {
            return Err(AludelError::CannotPowerOff);
        }
        self.transition(PowerState::Offline);
        log.emit(self.address, Event::PowerOff);
        Ok(())
    }

    pub fn emergency_shutdown(
        &mut self,
        caller: Address,
        log: &mut EventLog,
    ) -> Result<(), AludelError> {
        self.require_controller(caller)?;
        if self.state == PowerState::Shutdown {
            return Err(AludelError::CannotShutdown);
        }
        self.transition(PowerState::Shutdown);
        log.emit(self.address, Event::EmergencyShutdown);
        Ok(())
    }

    fn require_controller(&self, caller: Address) -> Result<(), AludelError> {
        if caller == self.controller {
            Ok(())
        } else {
            Err(AludelError::NotOwner)
        }
    }

    fn transition(&mut self, next: PowerState) {
        tracing::info!(switch = %self.address, "Power transition: {} -> {}", self.state, next);
        self.state = next;
    }
}
