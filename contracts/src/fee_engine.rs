//! Fee Engine Contract
//!
//! Computes the fee split for each transfer and periodically retargets the
//! fee rate from the staking-pool ratio.
//!
//! Retargeting is deliberately sluggish:
//! - the pool ratio is smoothed over an elapsed-counter window (a single
//!   transaction cannot move the whole input),
//! - the fee may move by at most 10% of its prior value per call,
//! - calls inside the cooldown window are silent no-ops, not errors.

use odra::prelude::*;
use odra::casper_types::{runtime_args, RuntimeArgs, U256};
use odra::CallDef;
use crate::capability::{ROLE_FEE_ADMIN, ROLE_TREASURY};
use crate::errors::FluxError;
use crate::fee_math;
use crate::types::{FeeSplit, FeeState, RatioSnapshot};

/// Default retarget cooldown in counter ticks
const DEFAULT_RETARGET_COOLDOWN: u64 = 60;

/// Fee retarget event
#[odra::event]
pub struct FeeRetargeted {
    /// Fee before the retarget (parts-per-thousand)
    pub old_fee_ppm: u32,
    /// Fee after the retarget (parts-per-thousand)
    pub new_fee_ppm: u32,
    /// Smoothed pool ratio used for the target (scaled by 1e18)
    pub smoothed_ratio: U256,
}

/// Fee range change event
#[odra::event]
pub struct FeeRangeUpdated {
    /// New lower bound (parts-per-thousand)
    pub min_ppm: u32,
    /// New upper bound (parts-per-thousand)
    pub max_ppm: u32,
}

/// Treasury address change event
#[odra::event]
pub struct TreasuryChanged {
    /// New treasury address
    pub treasury: Address,
}

/// Fee Engine Contract
#[odra::module(events = [FeeRetargeted, FeeRangeUpdated, TreasuryChanged])]
pub struct FeeController {
    /// Capability registry address
    capabilities: Var<Address>,
    /// Exclusion registry address
    exclusions: Var<Address>,
    /// Treasury address receiving the remainder share
    treasury: Var<Address>,
    /// Singleton fee state
    state: Var<FeeState>,
    /// Retarget cooldown in counter ticks
    retarget_cooldown: Var<u64>,
}

#[odra::module]
impl FeeController {
    /// Initialize the fee controller.
    ///
    /// `min_ppm`/`max_ppm` bound the dynamic fee; the initial fee starts at
    /// the upper bound and retargets downward as the pool fills.
    pub fn init(
        &mut self,
        capabilities: Address,
        exclusions: Address,
        treasury: Address,
        min_ppm: u32,
        max_ppm: u32,
    ) {
        if min_ppm > max_ppm || max_ppm > fee_math::FEE_ABS_CEILING_PPM {
            self.env().revert(FluxError::FeeRangeOutOfBounds);
        }

        self.capabilities.set(capabilities);
        self.exclusions.set(exclusions);
        self.treasury.set(treasury);
        self.retarget_cooldown.set(DEFAULT_RETARGET_COOLDOWN);

        let now = self.env().get_block_time();
        self.state.set(FeeState {
            current_fee_ppm: max_ppm,
            min_ppm,
            max_ppm,
            last_update: now,
            last_snapshot: RatioSnapshot {
                pool_ratio: U256::zero(),
                counter: now,
            },
        });
    }

    // ========== Fee Quoting ==========

    /// Split `amount` into `{burn, staking_pool, treasury, delivered}`.
    ///
    /// Transfers touching a fee-excluded party deliver the full amount.
    /// Fails with `InvalidPercent` if the stored fee exceeds the base.
    pub fn quote(&self, from: Address, to: Address, amount: U256) -> FeeSplit {
        if self.is_excluded(from) || self.is_excluded(to) {
            return FeeSplit::full_delivery(amount);
        }

        let state = self.get_state();
        match fee_math::split_fee(amount, state.current_fee_ppm) {
            Ok(parts) => FeeSplit {
                burn: parts.burn,
                staking_pool: parts.staking_pool,
                treasury: parts.treasury,
                delivered: parts.delivered,
            },
            Err(e) => self.env().revert(e),
        }
    }

    // ========== Retargeting ==========

    /// Retarget the fee from the staking-pool ratio.
    ///
    /// Open to any caller: the inputs are read from the ledger by the
    /// pipeline, and the cooldown plus step clamp bound the influence of any
    /// single call. Inside the cooldown window, or when the supply is zero,
    /// this is a silent no-op.
    pub fn retarget(&mut self, staking_pool: U256, total_supply: U256) {
        let now = self.env().get_block_time();
        let mut state = self.get_state();

        let cooldown = self.retarget_cooldown.get().unwrap_or(DEFAULT_RETARGET_COOLDOWN);
        if now < state.last_update.saturating_add(cooldown) {
            return; // No-op is not an error
        }
        if total_supply.is_zero() {
            return;
        }

        let instantaneous = fee_math::pool_ratio(staking_pool, total_supply);
        let elapsed = now.saturating_sub(state.last_snapshot.counter);
        let smoothed =
            fee_math::smooth_ratio(state.last_snapshot.pool_ratio, instantaneous, elapsed);

        let target = fee_math::target_fee(state.min_ppm, state.max_ppm, smoothed);
        let old_fee = state.current_fee_ppm;
        let new_fee = fee_math::clamp_step(old_fee, target);

        state.current_fee_ppm = new_fee;
        state.last_update = now;
        state.last_snapshot = RatioSnapshot {
            pool_ratio: smoothed,
            counter: now,
        };
        self.state.set(state);

        self.env().emit_event(FeeRetargeted {
            old_fee_ppm: old_fee,
            new_fee_ppm: new_fee,
            smoothed_ratio: smoothed,
        });
    }

    // ========== Query Functions ==========

    /// Current fee in parts-per-thousand
    pub fn get_fee_ppm(&self) -> u32 {
        self.get_state().current_fee_ppm
    }

    /// Full fee state
    pub fn get_fee_state(&self) -> FeeState {
        self.get_state()
    }

    /// Treasury address
    pub fn get_treasury(&self) -> Option<Address> {
        self.treasury.get()
    }

    // ========== Admin Functions ==========

    /// Update the fee range (fee-admin capability). The current fee is
    /// clamped into the new range immediately.
    pub fn set_fee_range(&mut self, min_ppm: u32, max_ppm: u32) {
        self.require_capability(ROLE_FEE_ADMIN);

        if min_ppm > max_ppm || max_ppm > fee_math::FEE_ABS_CEILING_PPM {
            self.env().revert(FluxError::FeeRangeOutOfBounds);
        }

        let mut state = self.get_state();
        state.min_ppm = min_ppm;
        state.max_ppm = max_ppm;
        state.current_fee_ppm = state.current_fee_ppm.clamp(min_ppm, max_ppm);
        self.state.set(state);

        self.env().emit_event(FeeRangeUpdated { min_ppm, max_ppm });
    }

    /// Update the retarget cooldown (fee-admin capability)
    pub fn set_retarget_cooldown(&mut self, cooldown: u64) {
        self.require_capability(ROLE_FEE_ADMIN);
        if cooldown == 0 {
            self.env().revert(FluxError::InvalidConfig);
        }
        self.retarget_cooldown.set(cooldown);
    }

    /// Change the treasury address.
    ///
    /// Callable only by a module holding the treasury capability — in the
    /// deployed wiring, the timelock store after a commit/reveal round.
    pub fn set_treasury(&mut self, treasury: Address) {
        self.require_capability(ROLE_TREASURY);
        self.treasury.set(treasury);
        self.env().emit_event(TreasuryChanged { treasury });
    }

    // ========== Internal Functions ==========

    fn get_state(&self) -> FeeState {
        self.state.get().unwrap_or(FeeState {
            current_fee_ppm: 0,
            min_ppm: 0,
            max_ppm: 0,
            last_update: 0,
            last_snapshot: RatioSnapshot {
                pool_ratio: U256::zero(),
                counter: 0,
            },
        })
    }

    fn is_excluded(&self, account: Address) -> bool {
        let exclusions = match self.exclusions.get() {
            Some(addr) => addr,
            None => return false,
        };
        let args = runtime_args! { "account" => account };
        let call_def = CallDef::new("is_excluded", false, args);
        self.env().call_contract(exclusions, call_def)
    }

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
