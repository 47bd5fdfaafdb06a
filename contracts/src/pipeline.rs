//! Transfer Pipeline Contract
//!
//! Main entry point for value transfers. Every transfer runs the fixed
//! sequence: validation -> security check -> fee extraction -> ledger
//! mutation -> reward-accrual refresh, in checks -> effects -> interactions
//! order. Minting bypasses the security and fee stages and instead checks
//! a supply ceiling and a per-call ceiling.
//!
//! The pipeline composes the other modules through explicit interfaces:
//! each one implements a single capability and is invoked here, rather
//! than layered as an override chain.

use odra::prelude::*;
use odra::casper_types::account::AccountHash;
use odra::casper_types::{runtime_args, RuntimeArgs, U256};
use odra::CallDef;
use crate::capability::{ROLE_MINTER, ROLE_PAUSER};
use crate::errors::FluxError;
use crate::types::FeeSplit;

/// Transfer processed event (final delivery leg)
#[odra::event]
pub struct TransferProcessed {
    /// Sender
    pub from: Address,
    /// Recipient
    pub to: Address,
    /// Amount before fees
    pub amount: U256,
    /// Amount delivered after fees
    pub delivered: U256,
}

/// Fee burn sub-transfer event
#[odra::event]
pub struct FeeBurned {
    /// Sender the fee was extracted from
    pub from: Address,
    /// Amount burned
    pub amount: U256,
}

/// Staking-pool fee sub-transfer event
#[odra::event]
pub struct FeePooled {
    /// Sender the fee was extracted from
    pub from: Address,
    /// Amount routed to the staking pool
    pub amount: U256,
}

/// Treasury fee sub-transfer event
#[odra::event]
pub struct FeeToTreasury {
    /// Sender the fee was extracted from
    pub from: Address,
    /// Amount routed to the treasury
    pub amount: U256,
}

/// Mint event
#[odra::event]
pub struct Minted {
    /// Recipient
    pub to: Address,
    /// Amount minted
    pub amount: U256,
}

/// Burn event
#[odra::event]
pub struct Burned {
    /// Account burned from
    pub from: Address,
    /// Amount burned
    pub amount: U256,
}

/// Pause state change event
#[odra::event]
pub struct PauseSet {
    /// Whether transfers are now paused
    pub paused: bool,
}

/// Transfer Pipeline Contract
#[odra::module(events = [
    TransferProcessed, FeeBurned, FeePooled, FeeToTreasury,
    Minted, Burned, PauseSet
])]
pub struct TransferPipeline {
    /// Capability registry address
    capabilities: Var<Address>,
    /// Ledger token address
    token: Var<Address>,
    /// Security limiter address
    limiter: Var<Address>,
    /// Fee controller address
    fee_controller: Var<Address>,
    /// Staking vault address
    vault: Var<Address>,
    /// Whether transfers are paused
    paused: Var<bool>,
    /// Supply ceiling (zero = unlimited)
    max_supply: Var<U256>,
    /// Per-call mint ceiling
    max_mint_per_call: Var<U256>,
    /// Non-reentrant mutex flag
    locked: Var<bool>,
}

#[odra::module]
impl TransferPipeline {
    /// Initialize the pipeline
    pub fn init(
        &mut self,
        capabilities: Address,
        token: Address,
        limiter: Address,
        fee_controller: Address,
        vault: Address,
        max_supply: U256,
        max_mint_per_call: U256,
    ) {
        self.capabilities.set(capabilities);
        self.token.set(token);
        self.limiter.set(limiter);
        self.fee_controller.set(fee_controller);
        self.vault.set(vault);
        self.paused.set(false);
        self.max_supply.set(max_supply);
        self.max_mint_per_call.set(max_mint_per_call);
        self.locked.set(false);
    }

    // ========== Transfer Processing ==========

    /// Process a transfer from the caller, returning the delivered amount.
    pub fn transfer(&mut self, to: Address, amount: U256) -> U256 {
        self.enter_guard();
        let from = self.env().caller();

        // Validation
        self.require_not_paused();
        if to == null_address() {
            self.env().revert(FluxError::ZeroAddress);
        }
        if amount.is_zero() {
            self.env().revert(FluxError::InvalidAmount);
        }

        // Security limiter: cooldown + max fraction of supply
        let total_supply = self.token_total_supply();
        self.limiter_check(from, amount, total_supply);

        // Fee extraction; excluded parties get a full-delivery split
        let split: FeeSplit = self.quote(from, to, amount);

        // Sub-transfers in fixed order: burn, pool, treasury, delivery
        if !split.burn.is_zero() {
            self.token_burn_from(from, split.burn);
            self.env().emit_event(FeeBurned {
                from,
                amount: split.burn,
            });
        }
        if !split.staking_pool.is_zero() {
            let vault = self.vault_address();
            self.token_move(from, vault, split.staking_pool);
            self.vault_fund_pool(split.staking_pool);
            self.env().emit_event(FeePooled {
                from,
                amount: split.staking_pool,
            });
        }
        if !split.treasury.is_zero() {
            let treasury = self.treasury_address();
            self.token_move(from, treasury, split.treasury);
            self.env().emit_event(FeeToTreasury {
                from,
                amount: split.treasury,
            });
        }
        self.token_move(from, to, split.delivered);

        // Reward accrual refresh for both parties
        self.vault_refresh(from);
        self.vault_refresh(to);

        // Opportunistic fee retarget; a no-op inside its cooldown
        self.retarget();

        self.exit_guard();
        self.env().emit_event(TransferProcessed {
            from,
            to,
            amount,
            delivered: split.delivered,
        });
        split.delivered
    }

    /// Mint new supply (minter capability).
    ///
    /// Bypasses the security and fee stages; bounded by the supply ceiling
    /// and the per-call ceiling.
    pub fn mint(&mut self, to: Address, amount: U256) {
        self.require_capability(ROLE_MINTER);
        self.require_not_paused();

        if to == null_address() {
            self.env().revert(FluxError::ZeroAddress);
        }
        if amount.is_zero() {
            self.env().revert(FluxError::InvalidAmount);
        }
        let per_call = self.max_mint_per_call.get().unwrap_or(U256::zero());
        if !per_call.is_zero() && amount > per_call {
            self.env().revert(FluxError::ExceedsLimit);
        }
        let ceiling = self.max_supply.get().unwrap_or(U256::zero());
        if !ceiling.is_zero() && self.token_total_supply() + amount > ceiling {
            self.env().revert(FluxError::SupplyCapExceeded);
        }

        let args = runtime_args! {
            "to" => to,
            "amount" => amount
        };
        let call_def = CallDef::new("mint", true, args);
        self.env().call_contract::<()>(self.token_address(), call_def);

        self.vault_refresh(to);
        self.env().emit_event(Minted { to, amount });
    }

    /// Burn supply from the caller
    pub fn burn(&mut self, amount: U256) {
        if amount.is_zero() {
            self.env().revert(FluxError::InvalidAmount);
        }
        let from = self.env().caller();
        self.token_burn_from(from, amount);
        self.vault_refresh(from);
        self.env().emit_event(Burned { from, amount });
    }

    // ========== Pause Control (pauser capability) ==========

    /// Pause transfers and minting
    pub fn pause(&mut self) {
        self.require_capability(ROLE_PAUSER);
        self.paused.set(true);
        self.env().emit_event(PauseSet { paused: true });
    }

    /// Resume transfers and minting
    pub fn unpause(&mut self) {
        self.require_capability(ROLE_PAUSER);
        self.paused.set(false);
        self.env().emit_event(PauseSet { paused: false });
    }

    // ========== Query Functions ==========

    /// Whether transfers are paused
    pub fn is_paused(&self) -> bool {
        self.paused.get().unwrap_or(false)
    }

    /// Supply ceiling (zero = unlimited)
    pub fn get_max_supply(&self) -> U256 {
        self.max_supply.get().unwrap_or(U256::zero())
    }

    /// Per-call mint ceiling (zero = unlimited)
    pub fn get_max_mint_per_call(&self) -> U256 {
        self.max_mint_per_call.get().unwrap_or(U256::zero())
    }

    // ========== Internal Functions ==========

    fn require_not_paused(&self) {
        if self.is_paused() {
            self.env().revert(FluxError::Paused);
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
            self.env().revert(FluxError::Unauthorized);
        }
    }

    fn token_address(&self) -> Address {
        match self.token.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        }
    }

    fn vault_address(&self) -> Address {
        match self.vault.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        }
    }

    fn fee_controller_address(&self) -> Address {
        match self.fee_controller.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        }
    }

    fn treasury_address(&self) -> Address {
        let args = runtime_args! {};
        let call_def = CallDef::new("get_treasury", false, args);
        let treasury: Option<Address> =
            self.env().call_contract(self.fee_controller_address(), call_def);
        match treasury {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        }
    }

    fn token_total_supply(&self) -> U256 {
        let args = runtime_args! {};
        let call_def = CallDef::new("total_supply", false, args);
        self.env().call_contract(self.token_address(), call_def)
    }

    fn token_move(&self, from: Address, to: Address, amount: U256) {
        let args = runtime_args! {
            "from" => from,
            "to" => to,
            "amount" => amount
        };
        let call_def = CallDef::new("protocol_transfer", true, args);
        self.env().call_contract::<()>(self.token_address(), call_def);
    }

    fn token_burn_from(&self, from: Address, amount: U256) {
        let args = runtime_args! {
            "from" => from,
            "amount" => amount
        };
        let call_def = CallDef::new("burn_from", true, args);
        self.env().call_contract::<()>(self.token_address(), call_def);
    }

    fn limiter_check(&self, account: Address, amount: U256, total_supply: U256) {
        let limiter = match self.limiter.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        };
        let args = runtime_args! {
            "account" => account,
            "amount" => amount,
            "total_supply" => total_supply
        };
        let call_def = CallDef::new("check_and_update", true, args);
        self.env().call_contract::<bool>(limiter, call_def);
    }

    fn quote(&self, from: Address, to: Address, amount: U256) -> FeeSplit {
        let args = runtime_args! {
            "from" => from,
            "to" => to,
            "amount" => amount
        };
        let call_def = CallDef::new("quote", false, args);
        self.env().call_contract(self.fee_controller_address(), call_def)
    }

    fn vault_fund_pool(&self, amount: U256) {
        let args = runtime_args! { "amount" => amount };
        let call_def = CallDef::new("fund_pool", true, args);
        self.env().call_contract::<()>(self.vault_address(), call_def);
    }

    fn vault_refresh(&self, account: Address) {
        let args = runtime_args! { "account" => account };
        let call_def = CallDef::new("refresh", true, args);
        self.env().call_contract::<()>(self.vault_address(), call_def);
    }

    fn retarget(&self) {
        let vault = self.vault_address();
        let call_def = CallDef::new("get_total_staked", false, runtime_args! {});
        let total_staked: U256 = self.env().call_contract(vault, call_def);
        let call_def = CallDef::new("get_pool_reserve", false, runtime_args! {});
        let pool_reserve: U256 = self.env().call_contract(vault, call_def);

        let total_supply = self.token_total_supply();
        let args = runtime_args! {
            "staking_pool" => total_staked + pool_reserve,
            "total_supply" => total_supply
        };
        let call_def = CallDef::new("retarget", true, args);
        self.env().call_contract::<()>(self.fee_controller_address(), call_def);
    }

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

/// The null account: transfers to it are rejected
pub fn null_address() -> Address {
    Address::Account(AccountHash::default())
}
