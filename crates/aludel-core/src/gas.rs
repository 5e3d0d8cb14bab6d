// crates/aludel-core/src/gas.rs
//
// A minimal gas meter. Only the rage-quit path is metered: it is the one
// place where a resource ceiling is a safety property rather than a cost.

use serde::{Deserialize, Serialize};

use crate::error::GasError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    /// Charge `amount` gas. On failure the meter is left exhausted, matching
    /// an EVM out-of-gas which consumes everything that was forwarded.
    pub fn consume(&mut self, amount: u64) -> Result<(), GasError> {
        let remaining = self.remaining();
        if amount > remaining {
            self.used = self.limit;
            return Err(GasError::OutOfGas {
                needed: amount,
                remaining,
            });
        }
        self.used += amount;
        Ok(())
    }
}
