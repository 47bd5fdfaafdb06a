//! Security Limiter Contract
//!
//! Per-account transfer cooldown and max-transfer-fraction check, consulted
//! by the transfer pipeline, plus the read-only anti-flash-loan floor used
//! by the staking vault.

use odra::prelude::*;
use odra::casper_types::{runtime_args, RuntimeArgs, U256};
use odra::CallDef;
use crate::capability::{ROLE_ADMIN, ROLE_PIPELINE};
use crate::errors::FluxError;

/// Default per-account cooldown in counter ticks
const DEFAULT_TRANSFER_COOLDOWN: u64 = 60;

/// Default transfer ceiling as a fraction of total supply (parts-per-thousand)
const DEFAULT_MAX_TRANSFER_PPM: u32 = 10;

/// Default anti-flash-loan floor in counter ticks
const DEFAULT_MIN_STAKE_DURATION: u64 = 1_000;

/// Transfer check event
#[odra::event]
pub struct TransferChecked {
    /// Account whose cooldown was recorded
    pub account: Address,
    /// Amount that passed the check
    pub amount: U256,
}

/// Security Limiter Contract
#[odra::module(events = [TransferChecked])]
pub struct SecurityLimiter {
    /// Capability registry address
    capabilities: Var<Address>,
    /// Last successful check per account
    last_update: Mapping<Address, u64>,
    /// Per-account cooldown in counter ticks
    cooldown: Var<u64>,
    /// Transfer ceiling in parts-per-thousand of total supply
    max_transfer_ppm: Var<u32>,
    /// Anti-flash-loan floor in counter ticks
    min_stake_duration: Var<u64>,
}

#[odra::module]
impl SecurityLimiter {
    /// Initialize the limiter
    pub fn init(&mut self, capabilities: Address) {
        self.capabilities.set(capabilities);
        self.cooldown.set(DEFAULT_TRANSFER_COOLDOWN);
        self.max_transfer_ppm.set(DEFAULT_MAX_TRANSFER_PPM);
        self.min_stake_duration.set(DEFAULT_MIN_STAKE_DURATION);
    }

    // ========== Checks ==========

    /// Check and record a transfer attempt (pipeline capability).
    ///
    /// Denies inside the account's cooldown window or when the amount
    /// exceeds the configured fraction of total supply; on success records
    /// the account's last-update counter.
    pub fn check_and_update(&mut self, account: Address, amount: U256, total_supply: U256) -> bool {
        self.require_capability(ROLE_PIPELINE);

        let now = self.env().get_block_time();
        let last = self.last_update.get(&account).unwrap_or(0);
        let cooldown = self.cooldown.get().unwrap_or(DEFAULT_TRANSFER_COOLDOWN);
        if last != 0 && now < last.saturating_add(cooldown) {
            self.env().revert(FluxError::TooSoon);
        }

        let ceiling = max_transfer_amount(
            total_supply,
            self.max_transfer_ppm.get().unwrap_or(DEFAULT_MAX_TRANSFER_PPM),
        );
        if amount > ceiling {
            self.env().revert(FluxError::ExceedsLimit);
        }

        self.last_update.set(&account, now);
        self.env().emit_event(TransferChecked { account, amount });
        true
    }

    /// Read-only anti-flash-loan floor: whether enough ticks have elapsed
    /// since the stake began.
    pub fn flash_loan_guard(&self, account: Address, stake_start: u64) -> bool {
        let _ = account;
        let now = self.env().get_block_time();
        let floor = self.min_stake_duration.get().unwrap_or(DEFAULT_MIN_STAKE_DURATION);
        now.saturating_sub(stake_start) >= floor
    }

    // ========== Query Functions ==========

    /// Last recorded check for an account (zero when never checked)
    pub fn get_last_update(&self, account: Address) -> u64 {
        self.last_update.get(&account).unwrap_or(0)
    }

    /// Configured cooldown in counter ticks
    pub fn get_cooldown(&self) -> u64 {
        self.cooldown.get().unwrap_or(DEFAULT_TRANSFER_COOLDOWN)
    }

    /// Configured transfer ceiling in parts-per-thousand
    pub fn get_max_transfer_ppm(&self) -> u32 {
        self.max_transfer_ppm.get().unwrap_or(DEFAULT_MAX_TRANSFER_PPM)
    }

    /// Configured anti-flash-loan floor
    pub fn get_min_stake_duration(&self) -> u64 {
        self.min_stake_duration.get().unwrap_or(DEFAULT_MIN_STAKE_DURATION)
    }

    // ========== Admin Functions (admin capability) ==========

    /// Update the per-account cooldown
    pub fn set_cooldown(&mut self, ticks: u64) {
        self.require_capability(ROLE_ADMIN);
        self.cooldown.set(ticks);
    }

    /// Update the transfer ceiling fraction
    pub fn set_max_transfer_ppm(&mut self, ppm: u32) {
        self.require_capability(ROLE_ADMIN);
        if ppm == 0 || ppm > 1000 {
            self.env().revert(FluxError::InvalidConfig);
        }
        self.max_transfer_ppm.set(ppm);
    }

    /// Update the anti-flash-loan floor
    pub fn set_min_stake_duration(&mut self, ticks: u64) {
        self.require_capability(ROLE_ADMIN);
        self.min_stake_duration.set(ticks);
    }

    // ========== Internal Functions ==========

    fn require_capability(&self, role: u8) {
        let caller = self.env().caller();
        let capabilities = match self.capabilities.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        };
        let args = runtime_args! {
            "module" => caller,
            "role" => role
        };
        let call_def = CallDef::new("is_authorized", false, args);
        let authorized: bool = self.env().call_contract(capabilities, call_def);
        if !authorized {
            self.env().revert(FluxError::UnauthorizedModule);
        }
    }
}

/// Transfer ceiling for a given supply and per-mille fraction
pub fn max_transfer_amount(total_supply: U256, max_ppm: u32) -> U256 {
    total_supply * U256::from(max_ppm) / U256::from(1000u32)
}
