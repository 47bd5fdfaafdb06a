//! Fee computation and retargeting math.
//!
//! Pure functions shared by the fee controller:
//! - per-mille fee split with order-sensitive remainder assignment
//! - pool-ratio smoothing over a bounded counter window
//! - bounded-step retargeting between the configured fee range

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::FluxError;

/// Fee base: fees are expressed in parts-per-thousand
pub const FEE_BASE_PPM: u32 = 1000;

/// Absolute ceiling on the upper fee bound (10%)
pub const FEE_ABS_CEILING_PPM: u32 = 100;

/// Share of the extracted fee that is burned (parts-per-thousand)
pub const BURN_SHARE_PPM: u32 = 200;

/// Share of the extracted fee routed to the staking pool (parts-per-thousand)
pub const POOL_SHARE_PPM: u32 = 500;

/// Precision scale for pool-ratio calculations (1e18)
pub const RATIO_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Maximum counter window for ratio smoothing
pub const SMOOTHING_WINDOW: u64 = 100;

/// Compute `pool * 1e18 / supply`, zero when the supply is zero.
pub fn pool_ratio(staking_pool: U256, total_supply: U256) -> U256 {
    if total_supply.is_zero() {
        return U256::zero();
    }
    staking_pool * U256::from(RATIO_PRECISION) / total_supply
}

/// Blend the instantaneous ratio against the previous snapshot, weighted by
/// elapsed counters and capped at [`SMOOTHING_WINDOW`].
///
/// A fully elapsed window yields the instantaneous ratio; zero elapsed
/// yields the previous snapshot unchanged.
pub fn smooth_ratio(previous: U256, instantaneous: U256, elapsed: u64) -> U256 {
    let weight = elapsed.min(SMOOTHING_WINDOW);
    let window = U256::from(SMOOTHING_WINDOW);
    (previous * U256::from(SMOOTHING_WINDOW - weight) + instantaneous * U256::from(weight)) / window
}

/// Interpolate the target fee from the smoothed ratio.
///
/// A zero ratio targets `max`; a ratio of 1e18 (pool == supply) targets
/// `min`. The result is clamped to `[min, max]`.
pub fn target_fee(min_ppm: u32, max_ppm: u32, smoothed_ratio: U256) -> u32 {
    let span = U256::from(max_ppm - min_ppm);
    let reduction = span * smoothed_ratio / U256::from(RATIO_PRECISION);
    let target = U256::from(max_ppm).saturating_sub(reduction);
    let target = target.min(U256::from(max_ppm)).max(U256::from(min_ppm));
    target.as_u32()
}

/// Clamp a retarget so the fee moves by at most 10% of its prior value per
/// call, with a minimum step of one so a small fee can still converge.
pub fn clamp_step(current: u32, target: u32) -> u32 {
    let max_step = (current / 10).max(1);
    if target > current {
        current + (target - current).min(max_step)
    } else {
        current - (current - target).min(max_step)
    }
}

/// Split `amount` into `{burn, staking_pool, treasury, delivered}` at the
/// given per-mille fee.
///
/// Integer division, order-sensitive: the treasury receives the remainder
/// of the fee after the burn and pool shares, absorbing rounding loss. A fee
/// rounding to zero delivers the full amount unmodified.
pub fn split_fee(amount: U256, fee_ppm: u32) -> Result<FeeSplitParts, FluxError> {
    if fee_ppm > FEE_BASE_PPM {
        return Err(FluxError::InvalidPercent);
    }

    let base = U256::from(FEE_BASE_PPM);
    let fee = amount * U256::from(fee_ppm) / base;
    if fee.is_zero() {
        return Ok(FeeSplitParts {
            burn: U256::zero(),
            staking_pool: U256::zero(),
            treasury: U256::zero(),
            delivered: amount,
        });
    }

    let burn = fee * U256::from(BURN_SHARE_PPM) / base;
    let staking_pool = fee * U256::from(POOL_SHARE_PPM) / base;
    let treasury = fee - burn - staking_pool;

    Ok(FeeSplitParts {
        burn,
        staking_pool,
        treasury,
        delivered: amount - fee,
    })
}

/// Plain split result used by the pure layer.
pub struct FeeSplitParts {
    pub burn: U256,
    pub staking_pool: U256,
    pub treasury: U256,
    pub delivered: U256,
}
