//! FLX Ledger Token Contract
//!
//! CEP-18 compatible fungible ledger with protocol-controlled minting,
//! burning, and unconditional internal moves. This is the ledger
//! collaborator the rest of the protocol builds on: only authorized
//! protocol contracts (the transfer pipeline, staking vault, emergency
//! control) may mint, burn, or move balances unconditionally.

use odra::prelude::*;
use odra::casper_types::{U256, RuntimeArgs, runtime_args, Key};
use odra::casper_types::bytesrepr::ToBytes;
use odra::CallDef;
use crate::errors::FluxError;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

const CEP18_NAME_KEY: &str = "name";
const CEP18_SYMBOL_KEY: &str = "symbol";
const CEP18_DECIMALS_KEY: &str = "decimals";
const CEP18_TOTAL_SUPPLY_KEY: &str = "total_supply";
const CEP18_BALANCES_DICT: &str = "balances";
const CEP18_ALLOWANCES_DICT: &str = "allowances";

/// FLX Ledger Token Contract
#[odra::module]
pub struct FluxToken {
    /// Token name
    name: Var<String>,
    /// Token symbol
    symbol: Var<String>,
    /// Decimals (18 for FLX)
    decimals: Var<u8>,
    /// Total supply
    total_supply: Var<U256>,
    /// Balance mapping
    balances: Mapping<Address, U256>,
    /// Allowance mapping (owner -> spender -> amount)
    allowances: Mapping<(Address, Address), U256>,
    /// Protocol registry address (for access control)
    registry: Var<Address>,
    /// Authorized protocol contracts
    authorized_protocols: Mapping<Address, bool>,
}

#[odra::module]
impl FluxToken {
    /// Initialize the token
    pub fn init(&mut self, registry: Address) {
        self.name.set(String::from("Flux"));
        self.symbol.set(String::from("FLX"));
        self.decimals.set(18);
        self.total_supply.set(U256::zero());
        self.registry.set(registry);
        self.env().init_dictionary(CEP18_BALANCES_DICT);
        self.env().init_dictionary(CEP18_ALLOWANCES_DICT);
        self.env().set_named_value(CEP18_NAME_KEY, String::from("Flux"));
        self.env().set_named_value(CEP18_SYMBOL_KEY, String::from("FLX"));
        self.env().set_named_value(CEP18_DECIMALS_KEY, 18u8);
        self.env().set_named_value(CEP18_TOTAL_SUPPLY_KEY, U256::zero());
    }

    // ========== CEP-18 Standard Functions ==========

    /// Get token name
    pub fn name(&self) -> String {
        self.name.get().unwrap_or_else(|| String::from("Flux"))
    }

    /// Get token symbol
    pub fn symbol(&self) -> String {
        self.symbol.get().unwrap_or_else(|| String::from("FLX"))
    }

    /// Get decimals
    pub fn decimals(&self) -> u8 {
        self.decimals.get().unwrap_or(18)
    }

    /// Get total supply
    pub fn total_supply(&self) -> U256 {
        self.total_supply.get().unwrap_or(U256::zero())
    }

    /// Get balance of an account
    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).unwrap_or(U256::zero())
    }

    /// Get allowance for spender
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or(U256::zero())
    }

    /// Transfer tokens to recipient
    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        self.transfer_internal(sender, recipient, amount);
        true
    }

    /// Approve spender to spend tokens
    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.env().caller();
        self.approve_internal(owner, spender, amount);
        true
    }

    /// Transfer tokens from owner to recipient (requires allowance)
    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        let spender = self.env().caller();

        let current_allowance = self.allowance(owner, spender);
        if current_allowance < amount {
            self.env().revert(FluxError::InsufficientTokenBalance);
        }

        self.transfer_internal(owner, recipient, amount);
        self.approve_internal(owner, spender, current_allowance - amount);
        true
    }

    // ========== Protocol Functions (Restricted) ==========

    /// Mint new tokens (only authorized protocol contracts).
    /// Supply and per-call ceilings are enforced by the transfer pipeline.
    pub fn mint(&mut self, to: Address, amount: U256) {
        self.require_authorized_protocol();

        let current_balance = self.balance_of(to);
        self.balances.set(&to, current_balance + amount);
        self.set_balance_cep18(to, current_balance + amount);

        let new_supply = self.total_supply() + amount;
        self.total_supply.set(new_supply);
        self.set_total_supply_cep18(new_supply);
    }

    /// Burn tokens from an account (only authorized protocol contracts)
    pub fn burn_from(&mut self, from: Address, amount: U256) {
        self.require_authorized_protocol();
        self.burn_from_internal(from, amount);
    }

    /// Protocol transfer: unconditional ledger move between addresses
    /// (only authorized protocol contracts). This is the hook the pipeline
    /// uses for fee sub-transfers and delivery.
    pub fn protocol_transfer(&mut self, from: Address, to: Address, amount: U256) {
        self.require_authorized_protocol();
        self.transfer_internal(from, to, amount);
    }

    // ========== Admin Functions ==========

    /// Add an authorized protocol contract (admin only via registry)
    pub fn add_protocol(&mut self, protocol: Address) {
        self.require_registry_admin();
        self.authorized_protocols.set(&protocol, true);
    }

    /// Remove an authorized protocol contract (admin only via registry)
    pub fn remove_protocol(&mut self, protocol: Address) {
        self.require_registry_admin();
        self.authorized_protocols.set(&protocol, false);
    }

    /// Check if address is an authorized protocol contract
    pub fn is_protocol(&self, account: Address) -> bool {
        self.authorized_protocols.get(&account).unwrap_or(false)
    }

    /// Get registry address
    pub fn get_registry(&self) -> Option<Address> {
        self.registry.get()
    }

    // ========== Internal Functions ==========

    fn transfer_internal(&mut self, from: Address, to: Address, amount: U256) {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            self.env().revert(FluxError::InsufficientTokenBalance);
        }

        let new_from_balance = from_balance - amount;
        self.balances.set(&from, new_from_balance);
        self.set_balance_cep18(from, new_from_balance);

        let to_balance = self.balance_of(to);
        let new_to_balance = to_balance + amount;
        self.balances.set(&to, new_to_balance);
        self.set_balance_cep18(to, new_to_balance);
    }

    fn approve_internal(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.set(&(owner, spender), amount);
        self.set_allowance_cep18(owner, spender, amount);
    }

    fn burn_from_internal(&mut self, from: Address, amount: U256) {
        let current_balance = self.balance_of(from);
        if current_balance < amount {
            self.env().revert(FluxError::InsufficientTokenBalance);
        }

        let new_balance = current_balance - amount;
        self.balances.set(&from, new_balance);
        self.set_balance_cep18(from, new_balance);

        let new_supply = self.total_supply() - amount;
        self.total_supply.set(new_supply);
        self.set_total_supply_cep18(new_supply);
    }

    fn set_balance_cep18(&self, owner: Address, amount: U256) {
        let key = Self::cep18_balance_key(owner);
        self.env().set_dictionary_value(CEP18_BALANCES_DICT, key.as_bytes(), amount);
    }

    fn set_allowance_cep18(&self, owner: Address, spender: Address, amount: U256) {
        let key = Self::cep18_allowance_key(owner, spender);
        self.env().set_dictionary_value(CEP18_ALLOWANCES_DICT, key.as_bytes(), amount);
    }

    fn set_total_supply_cep18(&self, amount: U256) {
        self.env().set_named_value(CEP18_TOTAL_SUPPLY_KEY, amount);
    }

    fn cep18_balance_key(owner: Address) -> String {
        let key = Key::from(owner);
        let bytes = key.to_bytes().unwrap_or_default();
        BASE64_STANDARD.encode(bytes)
    }

    fn cep18_allowance_key(owner: Address, spender: Address) -> String {
        let owner_key = Key::from(owner);
        let spender_key = Key::from(spender);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&owner_key.to_bytes().unwrap_or_default());
        bytes.extend_from_slice(&spender_key.to_bytes().unwrap_or_default());
        BASE64_STANDARD.encode(bytes)
    }

    fn require_authorized_protocol(&self) {
        let caller = self.env().caller();
        if !self.is_protocol(caller) {
            self.env().revert(FluxError::UnauthorizedModule);
        }
    }

    fn require_registry_admin(&self) {
        let caller = self.env().caller();
        let registry_addr = self.registry.get();

        if registry_addr.is_none() {
            self.env().revert(FluxError::InvalidConfig);
        }

        let args = runtime_args! {
            "caller" => caller
        };
        let call_def = CallDef::new("is_admin", false, args);
        let is_admin: bool = self.env().call_contract(registry_addr.unwrap(), call_def);

        if !is_admin {
            self.env().revert(FluxError::Unauthorized);
        }
    }
}
