//! Staking Vault Contract
//!
//! Holds staked funds and the reward pool, combining the stake ledger and
//! the epoch-segmented reward accrual engine.
//!
//! Key mechanics:
//! - Per-account stake records with a lock expiry and an anti-flash-loan
//!   floor (checked against the security limiter)
//! - Active-staker set with O(1) membership and swap-with-last removal,
//!   bounded at a configured maximum cardinality
//! - Epoch accumulator: pool inflows are converted to a per-staked-unit
//!   rate, overflow-checked, at most once per counter tick; each epoch's
//!   accumulator starts at zero
//! - Claims are capped at a fixed fraction of the pool and at the pool's
//!   actual balance
//!
//! All fund-moving entry points hold a non-reentrant mutex and follow
//! checks -> effects -> interactions ordering: bookkeeping is updated
//! before the ledger collaborator is invoked.

use odra::prelude::*;
use odra::casper_types::{runtime_args, RuntimeArgs, U256};
use odra::CallDef;
use crate::accrual;
use crate::capability::{ROLE_ADMIN, ROLE_EMERGENCY, ROLE_PIPELINE};
use crate::errors::FluxError;
use crate::types::{EpochRecord, StakeRecord, VaultStats};

/// Default epoch duration in counter ticks
const DEFAULT_EPOCH_DURATION: u64 = 10_000;

/// Default stake lock duration in counter ticks
const DEFAULT_LOCK_DURATION: u64 = 1_000;

/// Default claim cooldown in counter ticks
const DEFAULT_CLAIM_COOLDOWN: u64 = 100;

/// Default active-staker set capacity
const DEFAULT_MAX_STAKERS: u32 = 512;

/// Stake deposit event
#[odra::event]
pub struct StakeDeposited {
    /// Depositing account
    pub account: Address,
    /// Amount added to the stake
    pub amount: U256,
    /// Counter tick until which the stake is locked
    pub locked_until: u64,
}

/// Stake withdrawal event
#[odra::event]
pub struct StakeWithdrawn {
    /// Withdrawing account
    pub account: Address,
    /// Amount requested
    pub requested: U256,
    /// Amount actually delivered
    pub delivered: U256,
}

/// Reward claim event
#[odra::event]
pub struct RewardClaimed {
    /// Claiming account
    pub account: Address,
    /// Amount paid out
    pub amount: U256,
}

/// Per-account accrual refresh event
#[odra::event]
pub struct RewardRefreshed {
    /// Refreshed account
    pub account: Address,
    /// Pending reward after the refresh
    pub pending: U256,
}

/// Epoch settlement event
#[odra::event]
pub struct EpochSettled {
    /// Settled epoch index
    pub epoch: u64,
    /// Total reward distributed through the epoch's accumulator
    pub total_distributed: U256,
}

/// Pool funding event
#[odra::event]
pub struct PoolFunded {
    /// Amount added to the reward pool reservation
    pub amount: U256,
}

/// Emergency release event
#[odra::event]
pub struct EmergencyReleased {
    /// Asset moved (None for the system's own ledger token)
    pub token: Option<Address>,
    /// Recipient
    pub to: Address,
    /// Amount moved
    pub amount: U256,
}

/// Staking Vault Contract
#[odra::module(events = [
    StakeDeposited, StakeWithdrawn, RewardClaimed, RewardRefreshed,
    EpochSettled, PoolFunded, EmergencyReleased
])]
pub struct StakingVault {
    /// Capability registry address
    capabilities: Var<Address>,
    /// Ledger token address
    token: Var<Address>,
    /// Security limiter address (flash-loan floor)
    limiter: Var<Address>,

    // === Stake Ledger State ===
    /// Per-account stake records
    records: Mapping<Address, StakeRecord>,
    /// Active-staker set: account -> 1-based slot index (0 = absent)
    staker_index: Mapping<Address, u32>,
    /// Active-staker set: 0-based slot -> account
    staker_at: Mapping<u32, Address>,
    /// Active-staker set cardinality
    staker_count: Var<u32>,
    /// Active-staker set capacity
    max_stakers: Var<u32>,
    /// Sum of all recorded stakes
    total_staked: Var<U256>,
    /// Per-deposit ceiling
    deposit_ceiling: Var<U256>,
    /// Stake lock duration in counter ticks
    lock_duration: Var<u64>,

    // === Reward Accrual State ===
    /// Reward pool reservation (earmarked, never delivered via withdraw)
    pool_reserve: Var<U256>,
    /// Portion of the reserve already converted into the accumulator
    pool_accounted: Var<U256>,
    /// Epoch records, append-only
    epochs: Mapping<u64, EpochRecord>,
    /// Active epoch index
    current_epoch: Var<u64>,
    /// Epoch duration in counter ticks
    epoch_duration: Var<u64>,
    /// Claim cooldown in counter ticks
    claim_cooldown: Var<u64>,
    /// Counter tick of the last global inflow conversion
    last_refresh: Var<u64>,

    /// Non-reentrant mutex flag
    locked: Var<bool>,
}

#[odra::module]
impl StakingVault {
    /// Initialize the vault
    pub fn init(
        &mut self,
        capabilities: Address,
        token: Address,
        limiter: Address,
        deposit_ceiling: U256,
    ) {
        self.capabilities.set(capabilities);
        self.token.set(token);
        self.limiter.set(limiter);
        self.deposit_ceiling.set(deposit_ceiling);

        self.staker_count.set(0);
        self.max_stakers.set(DEFAULT_MAX_STAKERS);
        self.total_staked.set(U256::zero());
        self.lock_duration.set(DEFAULT_LOCK_DURATION);

        self.pool_reserve.set(U256::zero());
        self.pool_accounted.set(U256::zero());
        self.current_epoch.set(0);
        self.epoch_duration.set(DEFAULT_EPOCH_DURATION);
        self.claim_cooldown.set(DEFAULT_CLAIM_COOLDOWN);
        self.last_refresh.set(0);
        self.locked.set(false);

        let now = self.env().get_block_time();
        self.epochs.set(
            &0,
            EpochRecord {
                acc_reward_per_unit: U256::zero(),
                start: now,
                total_distributed: U256::zero(),
                settled: false,
            },
        );
    }

    // ========== Stake Ledger ==========

    /// Deposit `amount` into the caller's stake.
    ///
    /// The caller must have approved the vault on the ledger token. Sets or
    /// refreshes the lock expiry; adds the account to the active-staker set
    /// on first deposit.
    pub fn deposit(&mut self, amount: U256) {
        self.enter_guard();

        let account = self.env().caller();
        let now = self.env().get_block_time();

        if amount.is_zero() {
            self.env().revert(FluxError::InvalidAmount);
        }
        let ceiling = self.deposit_ceiling.get().unwrap_or(U256::zero());
        if !ceiling.is_zero() && amount > ceiling {
            self.env().revert(FluxError::DepositAboveCeiling);
        }
        if self.token_balance_of(account) < amount {
            self.env().revert(FluxError::InsufficientTokenBalance);
        }

        let is_member = self.staker_index.get(&account).unwrap_or(0) > 0;
        let count = self.staker_count.get().unwrap_or(0);
        if !is_member && count >= self.max_stakers.get().unwrap_or(DEFAULT_MAX_STAKERS) {
            self.env().revert(FluxError::StakerSetFull);
        }

        // Effects: accrue on the pre-deposit stake, then grow it
        self.refresh_internal(account);

        let mut record = self.get_stake(account);
        if record.amount.is_zero() {
            record.stake_start = now;
            self.staker_add(account);
        }
        record.amount += amount;
        record.locked_until = now + self.lock_duration.get().unwrap_or(DEFAULT_LOCK_DURATION);
        let locked_until = record.locked_until;
        self.records.set(&account, record);

        let total = self.total_staked.get().unwrap_or(U256::zero());
        self.total_staked.set(total + amount);

        // Interaction: pull funds last, so a reentrant callback observes
        // consistent state and is stopped by the mutex
        self.token_pull(account, amount);

        self.exit_guard();
        self.env().emit_event(StakeDeposited {
            account,
            amount,
            locked_until,
        });
    }

    /// Withdraw from the caller's stake, returning the delivered amount.
    ///
    /// Delivery is capped by the vault's ledger balance minus the reward
    /// pool reservation. Removes the account from the active-staker set
    /// when its stake reaches zero.
    pub fn withdraw(&mut self, amount: U256) -> U256 {
        self.enter_guard();

        let account = self.env().caller();
        let now = self.env().get_block_time();

        if amount.is_zero() {
            self.env().revert(FluxError::InvalidAmount);
        }
        let record = self.get_stake(account);
        if amount > record.amount {
            self.env().revert(FluxError::InsufficientBalance);
        }
        if now < record.locked_until {
            self.env().revert(FluxError::StillLocked);
        }
        if !self.flash_loan_guard_passes(account, record.stake_start) {
            self.env().revert(FluxError::TooSoon);
        }

        self.refresh_internal(account);

        // Cap delivery at the balance not earmarked for rewards
        let reserve = self.pool_reserve.get().unwrap_or(U256::zero());
        let available = self
            .token_balance_of(self.env().self_address())
            .saturating_sub(reserve);
        let delivered = amount.min(available);

        let mut record = self.get_stake(account);
        record.amount -= delivered;
        if record.amount.is_zero() {
            self.staker_remove(account);
            // Zeroed, not deleted; unclaimed rewards survive full withdrawal
            record.locked_until = 0;
            record.stake_start = 0;
            record.acc_checkpoint = U256::zero();
        }
        self.records.set(&account, record);

        let total = self.total_staked.get().unwrap_or(U256::zero());
        self.total_staked.set(total.saturating_sub(delivered));

        if !delivered.is_zero() {
            self.token_push(account, delivered);
        }

        self.exit_guard();
        self.env().emit_event(StakeWithdrawn {
            account,
            requested: amount,
            delivered,
        });
        delivered
    }

    // ========== Reward Accrual ==========

    /// Refresh the global accumulator and the caller-designated account.
    ///
    /// Permissionless: the pipeline calls this for both transfer parties,
    /// and any account may refresh itself.
    pub fn refresh(&mut self, account: Address) {
        self.refresh_internal(account);
    }

    /// Claim the caller's pending reward, returning the amount paid.
    ///
    /// The payout is capped at a fixed fraction of the pool and at the
    /// pool's balance; the account's accrued debt is zeroed regardless.
    pub fn claim(&mut self) -> U256 {
        self.enter_guard();

        let account = self.env().caller();
        let now = self.env().get_block_time();

        let cooldown = self.claim_cooldown.get().unwrap_or(DEFAULT_CLAIM_COOLDOWN);
        let record = self.get_stake(account);
        if now < record.last_claim.saturating_add(cooldown) {
            self.env().revert(FluxError::TooSoon);
        }

        self.refresh_internal(account);

        let mut record = self.get_stake(account);
        let pending = record.pending_rewards;
        if pending.is_zero() {
            self.env().revert(FluxError::NothingToClaim);
        }

        let reserve = self.pool_reserve.get().unwrap_or(U256::zero());
        let payout = accrual::claim_payout(pending, reserve);
        if payout.is_zero() {
            self.env().revert(FluxError::NothingToClaim);
        }

        // Effects: the debt is zeroed in full even when the payout is capped
        self.pool_reserve.set(reserve - payout);
        let accounted = self.pool_accounted.get().unwrap_or(U256::zero());
        self.pool_accounted.set(accounted.saturating_sub(payout));
        record.pending_rewards = U256::zero();
        record.last_claim = now;
        self.records.set(&account, record);

        self.token_push(account, payout);

        self.exit_guard();
        self.env().emit_event(RewardClaimed {
            account,
            amount: payout,
        });
        payout
    }

    /// Record a pool inflow (pipeline capability).
    ///
    /// The pipeline moves the staking-pool fee share to the vault's address
    /// and then reports it here so the reservation tracks it.
    pub fn fund_pool(&mut self, amount: U256) {
        self.require_capability(ROLE_PIPELINE);
        let reserve = self.pool_reserve.get().unwrap_or(U256::zero());
        self.pool_reserve.set(reserve + amount);
        self.env().emit_event(PoolFunded { amount });
    }

    // ========== Emergency Release (emergency capability) ==========

    /// Move the system's own ledger token out of the vault.
    ///
    /// Policy checks (cooldown, caps, surplus) live in the emergency
    /// control module holding this capability.
    pub fn release_system(&mut self, to: Address, amount: U256) {
        self.require_capability(ROLE_EMERGENCY);
        self.token_push(to, amount);
        self.env().emit_event(EmergencyReleased {
            token: None,
            to,
            amount,
        });
    }

    /// Move a foreign asset held by the vault's address
    pub fn release_foreign(&mut self, token: Address, to: Address, amount: U256) {
        self.require_capability(ROLE_EMERGENCY);
        let args = runtime_args! {
            "recipient" => to,
            "amount" => amount
        };
        let call_def = CallDef::new("transfer", true, args);
        let ok: bool = self.env().call_contract(token, call_def);
        if !ok {
            self.env().revert(FluxError::TokenTransferFailed);
        }
        self.env().emit_event(EmergencyReleased {
            token: Some(token),
            to,
            amount,
        });
    }

    // ========== Query Functions ==========

    /// Stake record for an account (zero-defaults when absent)
    pub fn get_stake(&self, account: Address) -> StakeRecord {
        self.records.get(&account).unwrap_or_default()
    }

    /// Pending reward for an account as of the last refresh plus any
    /// unaccrued epochs (read-only; does not mutate accrual state)
    pub fn get_pending_reward(&self, account: Address) -> U256 {
        let record = self.get_stake(account);
        if record.amount.is_zero() {
            return record.pending_rewards;
        }
        let current = self.current_epoch.get().unwrap_or(0);
        let live_acc = self.get_epoch(current).acc_reward_per_unit;
        record.pending_rewards + self.catch_up(&record, current, live_acc)
    }

    /// Sum of all recorded stakes
    pub fn get_total_staked(&self) -> U256 {
        self.total_staked.get().unwrap_or(U256::zero())
    }

    /// Reward pool reservation
    pub fn get_pool_reserve(&self) -> U256 {
        self.pool_reserve.get().unwrap_or(U256::zero())
    }

    /// Epoch record by index (zero-defaults when absent)
    pub fn get_epoch(&self, epoch: u64) -> EpochRecord {
        self.epochs.get(&epoch).unwrap_or_default()
    }

    /// Active epoch index
    pub fn get_current_epoch(&self) -> u64 {
        self.current_epoch.get().unwrap_or(0)
    }

    /// Whether an account is in the active-staker set
    pub fn is_active_staker(&self, account: Address) -> bool {
        self.staker_index.get(&account).unwrap_or(0) > 0
    }

    /// Active-staker set cardinality
    pub fn get_active_staker_count(&self) -> u32 {
        self.staker_count.get().unwrap_or(0)
    }

    /// Vault statistics
    pub fn get_stats(&self) -> VaultStats {
        VaultStats {
            total_staked: self.get_total_staked(),
            pool_reserve: self.get_pool_reserve(),
            active_stakers: self.get_active_staker_count(),
            current_epoch: self.get_current_epoch(),
        }
    }

    // ========== Admin Functions (admin capability) ==========

    /// Update the stake lock duration
    pub fn set_lock_duration(&mut self, ticks: u64) {
        self.require_capability(ROLE_ADMIN);
        self.lock_duration.set(ticks);
    }

    /// Update the epoch duration
    pub fn set_epoch_duration(&mut self, ticks: u64) {
        self.require_capability(ROLE_ADMIN);
        if ticks == 0 {
            self.env().revert(FluxError::InvalidConfig);
        }
        self.epoch_duration.set(ticks);
    }

    /// Update the active-staker capacity
    pub fn set_max_stakers(&mut self, capacity: u32) {
        self.require_capability(ROLE_ADMIN);
        if capacity < self.get_active_staker_count() {
            self.env().revert(FluxError::InvalidConfig);
        }
        self.max_stakers.set(capacity);
    }

    // ========== Internal: accrual ==========

    fn refresh_internal(&mut self, account: Address) {
        let now = self.env().get_block_time();
        let mut current = self.current_epoch.get().unwrap_or(0);
        let duration = self.epoch_duration.get().unwrap_or(DEFAULT_EPOCH_DURATION);
        let mut epoch = self.get_epoch(current);

        // Settle an expired epoch and open its successor with a fresh,
        // independent accumulator
        if accrual::epoch_expired(epoch.start, duration, now) {
            epoch.settled = true;
            self.epochs.set(&current, epoch.clone());
            self.env().emit_event(EpochSettled {
                epoch: current,
                total_distributed: epoch.total_distributed,
            });

            current += 1;
            epoch = EpochRecord {
                acc_reward_per_unit: U256::zero(),
                start: now,
                total_distributed: U256::zero(),
                settled: false,
            };
            self.current_epoch.set(current);
            self.epochs.set(&current, epoch.clone());
        }

        // Convert unaccounted pool inflow at most once per counter tick
        let last = self.last_refresh.get().unwrap_or(0);
        let total_staked = self.total_staked.get().unwrap_or(U256::zero());
        let reserve = self.pool_reserve.get().unwrap_or(U256::zero());
        if now > last && !total_staked.is_zero() && !reserve.is_zero() {
            let accounted = self.pool_accounted.get().unwrap_or(U256::zero());
            let unaccounted = reserve.saturating_sub(accounted);
            let inflow = accrual::cap_inflow(unaccounted, reserve);
            if !inflow.is_zero() {
                match accrual::accumulate(epoch.acc_reward_per_unit, inflow, total_staked) {
                    Ok(acc) => epoch.acc_reward_per_unit = acc,
                    Err(e) => self.env().revert(e),
                }
                epoch.total_distributed = match epoch.total_distributed.checked_add(inflow) {
                    Some(total) => total,
                    None => self.env().revert(FluxError::Overflow),
                };
                self.pool_accounted.set(accounted + inflow);
                self.epochs.set(&current, epoch.clone());
            }
            self.last_refresh.set(now);
        }

        // Account-level accrual
        let mut record = self.get_stake(account);
        if !record.amount.is_zero() {
            let earned = self.catch_up(&record, current, epoch.acc_reward_per_unit);
            if !earned.is_zero() {
                record.pending_rewards = match record.pending_rewards.checked_add(earned) {
                    Some(pending) => pending,
                    None => self.env().revert(FluxError::Overflow),
                };
            }
        }
        record.acc_checkpoint = epoch.acc_reward_per_unit;
        record.epoch_checkpoint = current;

        if record.last_update < now {
            record.last_update = now;
            let pending = record.pending_rewards;
            self.records.set(&account, record);
            self.env().emit_event(RewardRefreshed { account, pending });
        } else {
            self.records.set(&account, record);
        }
    }

    /// Reward earned by `record` from its checkpoint up to the live
    /// accumulator, crossing at most [`accrual::EPOCH_CATCHUP_LIMIT`]
    /// epoch boundaries (older accruals are forfeited to bound the work
    /// done by one refresh).
    fn catch_up(&self, record: &StakeRecord, current: u64, live_acc: U256) -> U256 {
        let mut earned = U256::zero();
        let behind = current.saturating_sub(record.epoch_checkpoint);
        let first = if behind > accrual::EPOCH_CATCHUP_LIMIT {
            current - accrual::EPOCH_CATCHUP_LIMIT
        } else {
            record.epoch_checkpoint
        };
        let mut acc_from = if first == record.epoch_checkpoint {
            record.acc_checkpoint
        } else {
            U256::zero()
        };
        for e in first..=current {
            let acc_to = if e == current {
                live_acc
            } else {
                self.get_epoch(e).acc_reward_per_unit
            };
            earned += accrual::pending_between(record.amount, acc_from, acc_to);
            acc_from = U256::zero();
        }
        earned
    }

    // ========== Internal: active-staker set ==========

    fn staker_add(&mut self, account: Address) {
        if self.staker_index.get(&account).unwrap_or(0) > 0 {
            return;
        }
        let count = self.staker_count.get().unwrap_or(0);
        self.staker_at.set(&count, account);
        self.staker_index.set(&account, count + 1);
        self.staker_count.set(count + 1);
    }

    /// O(1) removal: swap the last slot into the vacated one
    fn staker_remove(&mut self, account: Address) {
        let index = self.staker_index.get(&account).unwrap_or(0);
        if index == 0 {
            return;
        }
        let slot = index - 1;
        let count = self.staker_count.get().unwrap_or(0);
        let last_slot = count - 1;

        if slot != last_slot {
            if let Some(moved) = self.staker_at.get(&last_slot) {
                self.staker_at.set(&slot, moved);
                self.staker_index.set(&moved, slot + 1);
            }
        }
        self.staker_index.set(&account, 0);
        self.staker_count.set(last_slot);
    }

    // ========== Internal: collaborators ==========

    fn flash_loan_guard_passes(&self, account: Address, stake_start: u64) -> bool {
        let limiter = match self.limiter.get() {
            Some(addr) => addr,
            None => return true,
        };
        let args = runtime_args! {
            "account" => account,
            "stake_start" => stake_start
        };
        let call_def = CallDef::new("flash_loan_guard", false, args);
        self.env().call_contract(limiter, call_def)
    }

    fn token_address(&self) -> Address {
        match self.token.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        }
    }

    fn token_balance_of(&self, account: Address) -> U256 {
        let args = runtime_args! { "account" => account };
        let call_def = CallDef::new("balance_of", false, args);
        self.env().call_contract(self.token_address(), call_def)
    }

    fn token_pull(&self, from: Address, amount: U256) {
        let args = runtime_args! {
            "owner" => from,
            "recipient" => self.env().self_address(),
            "amount" => amount
        };
        let call_def = CallDef::new("transfer_from", true, args);
        let ok: bool = self.env().call_contract(self.token_address(), call_def);
        if !ok {
            self.env().revert(FluxError::TokenTransferFailed);
        }
    }

    fn token_push(&self, to: Address, amount: U256) {
        let args = runtime_args! {
            "recipient" => to,
            "amount" => amount
        };
        let call_def = CallDef::new("transfer", true, args);
        let ok: bool = self.env().call_contract(self.token_address(), call_def);
        if !ok {
            self.env().revert(FluxError::TokenTransferFailed);
        }
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

    // ========== Internal: reentrancy guard ==========

    fn enter_guard(&mut self) {
        if self.locked.get().unwrap_or(false) {
            self.env().revert(FluxError::ReentrantCall);
        }
        self.locked.set(true);
    }

    fn exit_guard(&mut self) {
        self.locked.set(false);
    }
}
