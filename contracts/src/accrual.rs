//! Epoch-segmented reward accrual math.
//!
//! Pure functions shared by the staking vault:
//! - epoch rollover decision
//! - pool-inflow capping and conversion to a per-staked-unit rate
//! - pending-reward computation and claim-payout capping
//!
//! Each epoch's accumulator starts at zero, independent of the prior
//! epoch's, which resets compounding and bounds the accumulator's
//! magnitude over the system's lifetime.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::FluxError;

/// Precision scale for per-unit reward rates (1e18)
pub const REWARD_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Maximum fraction of the pool converted per refresh (parts-per-thousand)
pub const MAX_REFRESH_INFLOW_PPM: u32 = 100;

/// Maximum fraction of the pool paid out by a single claim (parts-per-thousand)
pub const CLAIM_CAP_PPM: u32 = 100;

/// Epochs an account may lag behind before older accruals are forfeited.
/// Bounds the catch-up work done by a single refresh.
pub const EPOCH_CATCHUP_LIMIT: u64 = 32;

/// Whether the active epoch has run past its end boundary.
pub fn epoch_expired(epoch_start: u64, epoch_duration: u64, now: u64) -> bool {
    now > epoch_start.saturating_add(epoch_duration)
}

/// Cap an unaccounted pool inflow at the per-refresh fraction of the pool.
pub fn cap_inflow(unaccounted: U256, pool_reserve: U256) -> U256 {
    let cap = pool_reserve * U256::from(MAX_REFRESH_INFLOW_PPM) / U256::from(1000u32);
    unaccounted.min(cap)
}

/// Convert an inflow into a per-staked-unit rate increment and add it to the
/// accumulator, failing on overflow rather than wrapping.
pub fn accumulate(
    accumulator: U256,
    inflow: U256,
    total_staked: U256,
) -> Result<U256, FluxError> {
    if total_staked.is_zero() || inflow.is_zero() {
        return Ok(accumulator);
    }
    let rate = inflow
        .checked_mul(U256::from(REWARD_PRECISION))
        .ok_or(FluxError::Overflow)?
        / total_staked;
    accumulator.checked_add(rate).ok_or(FluxError::Overflow)
}

/// Reward earned by `stake` between two accumulator readings.
pub fn pending_between(stake: U256, acc_from: U256, acc_to: U256) -> U256 {
    if acc_to <= acc_from {
        return U256::zero();
    }
    stake * (acc_to - acc_from) / U256::from(REWARD_PRECISION)
}

/// Cap a claim payout at the pool fraction and the pool's actual balance.
pub fn claim_payout(pending: U256, pool_reserve: U256) -> U256 {
    let fraction_cap = pool_reserve * U256::from(CLAIM_CAP_PPM) / U256::from(1000u32);
    pending.min(fraction_cap).min(pool_reserve)
}
