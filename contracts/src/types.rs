//! Common types used across the Flux protocol.

use odra::prelude::*;
use odra::casper_types::U256;

/// Per-account stake record.
///
/// Owned exclusively by the staking vault; created on first deposit and
/// zeroed (not deleted) on full withdrawal.
#[odra::odra_type]
#[derive(Default)]
pub struct StakeRecord {
    /// Staked amount
    pub amount: U256,
    /// Counter tick until which the stake is locked
    pub locked_until: u64,
    /// Counter tick of the first deposit of the current stake
    pub stake_start: u64,
    /// Counter tick of the last reward claim
    pub last_claim: u64,
    /// Counter tick of the last accrual refresh
    pub last_update: u64,
    /// Reward accrued but not yet claimed
    pub pending_rewards: U256,
    /// Accumulator value at the last refresh
    pub acc_checkpoint: U256,
    /// Epoch index at the last refresh
    pub epoch_checkpoint: u64,
}

/// Epoch-segmented reward accumulator record.
///
/// Append-only; once a successor epoch opens, the record is immutable except
/// for the one-time `settled` flip.
#[odra::odra_type]
#[derive(Default)]
pub struct EpochRecord {
    /// Reward accumulated per staked unit (scaled by 1e18)
    pub acc_reward_per_unit: U256,
    /// Counter tick at which the epoch opened
    pub start: u64,
    /// Total reward converted into this epoch's accumulator
    pub total_distributed: U256,
    /// Whether the epoch has been settled
    pub settled: bool,
}

/// Snapshot of the staking-pool ratio used for fee smoothing.
#[odra::odra_type]
#[derive(Default)]
pub struct RatioSnapshot {
    /// Pool/supply ratio scaled by 1e18
    pub pool_ratio: U256,
    /// Counter tick of the snapshot
    pub counter: u64,
}

/// Singleton fee state, mutated only by the fee controller's retarget.
#[odra::odra_type]
pub struct FeeState {
    /// Current fee in parts-per-thousand
    pub current_fee_ppm: u32,
    /// Lower fee bound in parts-per-thousand
    pub min_ppm: u32,
    /// Upper fee bound in parts-per-thousand
    pub max_ppm: u32,
    /// Counter tick of the last retarget
    pub last_update: u64,
    /// Smoothed ratio snapshot from the last retarget
    pub last_snapshot: RatioSnapshot,
}

/// Result of splitting a transfer amount into fee shares.
#[odra::odra_type]
#[derive(Default)]
pub struct FeeSplit {
    /// Share burned
    pub burn: U256,
    /// Share routed to the staking pool
    pub staking_pool: U256,
    /// Share routed to the treasury (absorbs rounding loss)
    pub treasury: U256,
    /// Amount delivered to the recipient
    pub delivered: U256,
}

impl FeeSplit {
    /// Split that delivers the full amount fee-free.
    pub fn full_delivery(amount: U256) -> Self {
        FeeSplit {
            burn: U256::zero(),
            staking_pool: U256::zero(),
            treasury: U256::zero(),
            delivered: amount,
        }
    }

    /// Total fee extracted by this split.
    pub fn fee_total(&self) -> U256 {
        self.burn + self.staking_pool + self.treasury
    }
}

/// Commit/reveal proposal stored by the timelock.
#[odra::odra_type]
#[derive(Default)]
pub struct TimelockProposal {
    /// Counter tick after which the proposal may execute
    pub execute_after: u64,
    /// SHA-256 commitment over (action, payload, salt)
    pub commit_hash: [u8; 32],
    /// Whether the proposal has been executed
    pub executed: bool,
    /// Whether the proposal has been revealed
    pub revealed: bool,
}

/// Vault statistics for off-system auditing.
#[odra::odra_type]
#[derive(Default)]
pub struct VaultStats {
    /// Sum of all recorded stakes
    pub total_staked: U256,
    /// Reward pool reservation
    pub pool_reserve: U256,
    /// Number of accounts in the active-staker set
    pub active_stakers: u32,
    /// Current epoch index
    pub current_epoch: u64,
}
