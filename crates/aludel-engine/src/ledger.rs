// crates/aludel-engine/src/ledger.rs
//
// In-memory ERC-20 ledger covering every token on the simulated chain.

use std::collections::{BTreeMap, BTreeSet};

use aludel_core::{Address, Event, EventLog, TokenError, TokenLedger, U256};
use serde::{Deserialize, Serialize};

/// Display metadata for a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    tokens: BTreeMap<Address, TokenInfo>,
    balances: BTreeMap<(Address, Address), U256>,
    allowances: BTreeMap<(Address, Address, Address), U256>,
    supply: BTreeMap<Address, U256>,
    /// Tokens whose every transfer reverts.
    reverting: BTreeSet<Address>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token under `address`.
    pub fn create_token(&mut self, address: Address, symbol: &str, decimals: u8) {
        self.tokens.insert(
            address,
            TokenInfo {
                symbol: symbol.to_string(),
                decimals,
            },
        );
    }

    pub fn token_info(&self, token: Address) -> Option<&TokenInfo> {
        self.tokens.get(&token)
    }

    /// Symbol of `token`, or its address when unregistered.
    pub fn symbol(&self, token: Address) -> String {
        self.tokens
            .get(&token)
            .map(|t| t.symbol.clone())
            .unwrap_or_else(|| token.to_string())
    }

    pub fn total_supply(&self, token: Address) -> U256 {
        self.supply.get(&token).copied().unwrap_or_default()
    }

    /// Credit `amount` of `token` to `to` out of thin air.
    pub fn mint(
        &mut self,
        token: Address,
        to: Address,
        amount: U256,
        log: &mut EventLog,
    ) -> Result<(), TokenError> {
        self.check_reverting(token)?;
        let supply = self.total_supply(token);
        let balance = self.balance_of(token, to);
        // Supply bounds every balance, so only the supply can overflow.
        let supply = supply.checked_add(amount).ok_or_else(|| TokenError::Reverted {
            token,
            reason: "total supply overflow".to_string(),
        })?;
        self.supply.insert(token, supply);
        self.balances.insert((token, to), balance + amount);
        log.emit(
            token,
            Event::Transfer {
                token,
                from: Address::ZERO,
                to,
                amount,
            },
        );
        Ok(())
    }

    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((token, owner, spender), amount);
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    /// Make every transfer of `token` revert (or stop doing so).
    pub fn set_reverting(&mut self, token: Address, reverting: bool) {
        if reverting {
            self.reverting.insert(token);
        } else {
            self.reverting.remove(&token);
        }
    }

    fn check_reverting(&self, token: Address) -> Result<(), TokenError> {
        if self.reverting.contains(&token) {
            return Err(TokenError::Reverted {
                token,
                reason: "transfers disabled".to_string(),
            });
        }
        Ok(())
    }

    fn move_balance(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
        log: &mut EventLog,
    ) -> Result<(), TokenError> {
        self.check_reverting(token)?;
        let from_balance = self.balance_of(token, from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance);
        }
        self.balances.insert((token, from), from_balance - amount);
        let to_balance = self.balance_of(token, to);
        self.balances.insert((token, to), to_balance + amount);
        log.emit(
            token,
            Event::Transfer {
                token,
                from,
                to,
                amount,
            },
        );
        Ok(())
    }
}

impl TokenLedger for InMemoryLedger {
    fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
        log: &mut EventLog,
    ) -> Result<(), TokenError> {
        self.move_balance(token, from, to, amount, log)
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
        log: &mut EventLog,
    ) -> Result<(), TokenError> {
        self.check_reverting(token)?;
        let allowance = self.allowance(token, from, spender);
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance);
        }
        self.move_balance(token, from, to, amount, log)?;
        if allowance != U256::MAX {
            self.allowances
                .insert((token, from, spender), allowance - amount);
        }
        Ok(())
    }
}
