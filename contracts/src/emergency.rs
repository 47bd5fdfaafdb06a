//! Emergency Control Contract
//!
//! Owner-gated fund recovery over the staking vault's release entry points.
//! Every path is rate-limited by a cooldown and bounded by an absolute cap;
//! for the system's own ledger token the deliverable amount is additionally
//! capped at the vault's surplus over known obligations, enforcing the
//! solvency invariant.

use odra::prelude::*;
use odra::casper_types::{runtime_args, RuntimeArgs, U256};
use odra::CallDef;
use crate::capability::ROLE_ADMIN;
use crate::errors::FluxError;

/// Default cooldown between emergency withdrawals, in counter ticks
const DEFAULT_EMERGENCY_COOLDOWN: u64 = 86_400;

/// Emergency withdrawal event
#[odra::event]
pub struct EmergencyWithdrawal {
    /// Asset moved (None for the system's own ledger token)
    pub token: Option<Address>,
    /// Recipient
    pub to: Address,
    /// Amount requested
    pub requested: U256,
    /// Amount actually released
    pub released: U256,
}

/// Emergency Control Contract
#[odra::module(events = [EmergencyWithdrawal])]
pub struct EmergencyControl {
    /// Capability registry address
    capabilities: Var<Address>,
    /// Staking vault address (fund holder)
    vault: Var<Address>,
    /// System ledger token address
    system_token: Var<Address>,
    /// Absolute per-withdrawal cap
    absolute_cap: Var<U256>,
    /// Counter tick of the last emergency withdrawal
    last_withdrawal: Var<u64>,
    /// Cooldown between withdrawals in counter ticks
    cooldown: Var<u64>,
}

#[odra::module]
impl EmergencyControl {
    /// Initialize the control module
    pub fn init(
        &mut self,
        capabilities: Address,
        vault: Address,
        system_token: Address,
        absolute_cap: U256,
    ) {
        self.capabilities.set(capabilities);
        self.vault.set(vault);
        self.system_token.set(system_token);
        self.absolute_cap.set(absolute_cap);
        self.last_withdrawal.set(0);
        self.cooldown.set(DEFAULT_EMERGENCY_COOLDOWN);
    }

    // ========== Emergency Withdrawal (admin capability) ==========

    /// Withdraw funds held by the vault, returning the released amount.
    ///
    /// For the system's own token the release is capped at
    /// `vault balance - (total_staked + pool_reserve)` — the surplus over
    /// known obligations — so obligations can never be drained. For any
    /// other asset, the full requested amount moves after a balance check.
    pub fn withdraw(
        &mut self,
        token: Address,
        to: Address,
        amount: U256,
        total_staked: U256,
        pool_reserve: U256,
    ) -> U256 {
        self.require_admin();

        if amount.is_zero() {
            self.env().revert(FluxError::InvalidAmount);
        }
        if to == self.env().self_address() {
            self.env().revert(FluxError::SelfDelivery);
        }
        let cap = self.absolute_cap.get().unwrap_or(U256::zero());
        if !cap.is_zero() && amount > cap {
            self.env().revert(FluxError::AboveEmergencyCap);
        }

        let now = self.env().get_block_time();
        let last = self.last_withdrawal.get().unwrap_or(0);
        let cooldown = self.cooldown.get().unwrap_or(DEFAULT_EMERGENCY_COOLDOWN);
        if last != 0 && now < last.saturating_add(cooldown) {
            self.env().revert(FluxError::TooSoon);
        }

        let vault = self.vault_address();
        let system_token = self.system_token_address();

        let released = if token == system_token {
            let balance = self.token_balance_of(token, vault);
            let obligations = total_staked + pool_reserve;
            let surplus = balance.saturating_sub(obligations);
            let released = amount.min(surplus);
            if !released.is_zero() {
                self.vault_release_system(to, released);
            }
            released
        } else {
            let balance = self.token_balance_of(token, vault);
            if balance < amount {
                self.env().revert(FluxError::InsufficientTokenBalance);
            }
            self.vault_release_foreign(token, to, amount);
            amount
        };

        self.last_withdrawal.set(now);
        self.env().emit_event(EmergencyWithdrawal {
            token: if token == system_token { None } else { Some(token) },
            to,
            requested: amount,
            released,
        });
        released
    }

    // ========== Query Functions ==========

    /// Counter tick of the last emergency withdrawal
    pub fn get_last_withdrawal(&self) -> u64 {
        self.last_withdrawal.get().unwrap_or(0)
    }

    /// Absolute per-withdrawal cap
    pub fn get_absolute_cap(&self) -> U256 {
        self.absolute_cap.get().unwrap_or(U256::zero())
    }

    /// Cooldown between withdrawals
    pub fn get_cooldown(&self) -> u64 {
        self.cooldown.get().unwrap_or(DEFAULT_EMERGENCY_COOLDOWN)
    }

    // ========== Internal Functions ==========

    fn require_admin(&self) {
        let caller = self.env().caller();
        let capabilities = match self.capabilities.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        };
        let args = runtime_args! {
            "module" => caller,
            "role" => ROLE_ADMIN
        };
        let call_def = CallDef::new("is_authorized", false, args);
        let authorized: bool = self.env().call_contract(capabilities, call_def);
        if !authorized {
            self.env().revert(FluxError::Unauthorized);
        }
    }

    fn vault_address(&self) -> Address {
        match self.vault.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        }
    }

    fn system_token_address(&self) -> Address {
        match self.system_token.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        }
    }

    fn token_balance_of(&self, token: Address, account: Address) -> U256 {
        let args = runtime_args! { "account" => account };
        let call_def = CallDef::new("balance_of", false, args);
        self.env().call_contract(token, call_def)
    }

    fn vault_release_system(&self, to: Address, amount: U256) {
        let args = runtime_args! {
            "to" => to,
            "amount" => amount
        };
        let call_def = CallDef::new("release_system", true, args);
        self.env().call_contract::<()>(self.vault_address(), call_def);
    }

    fn vault_release_foreign(&self, token: Address, to: Address, amount: U256) {
        let args = runtime_args! {
            "token" => token,
            "to" => to,
            "amount" => amount
        };
        let call_def = CallDef::new("release_foreign", true, args);
        self.env().call_contract::<()>(self.vault_address(), call_def);
    }
}
