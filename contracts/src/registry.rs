//! Protocol registry for module addresses and post-deploy wiring.
//!
//! Modules are deployed with no cross-references and wired here in a
//! second pass (address setters plus capability grants on the capability
//! registry), avoiding any circular construction dependency.

use odra::prelude::*;
use crate::errors::FluxError;

/// Registry contract for Flux protocol wiring
#[odra::module]
pub struct ProtocolRegistry {
    /// Protocol admin address
    admin: Var<Address>,
    /// Capability registry address
    capabilities: Var<Option<Address>>,
    /// Ledger token address
    token: Var<Option<Address>>,
    /// Transfer pipeline address
    pipeline: Var<Option<Address>>,
    /// Fee controller address
    fee_controller: Var<Option<Address>>,
    /// Exclusion registry address
    exclusions: Var<Option<Address>>,
    /// Staking vault address
    vault: Var<Option<Address>>,
    /// Security limiter address
    limiter: Var<Option<Address>>,
    /// Emergency control address
    emergency: Var<Option<Address>>,
    /// Timelock store address
    timelock: Var<Option<Address>>,
}

#[odra::module]
impl ProtocolRegistry {
    /// Initialize the registry with its admin
    pub fn init(&mut self, admin: Address) {
        self.admin.set(admin);
    }

    /// Set the capability registry address (admin only)
    pub fn set_capabilities(&mut self, capabilities: Address) {
        self.require_admin();
        self.capabilities.set(Some(capabilities));
    }

    /// Set the ledger token address (admin only)
    pub fn set_token(&mut self, token: Address) {
        self.require_admin();
        self.token.set(Some(token));
    }

    /// Set the transfer pipeline address (admin only)
    pub fn set_pipeline(&mut self, pipeline: Address) {
        self.require_admin();
        self.pipeline.set(Some(pipeline));
    }

    /// Set the fee controller address (admin only)
    pub fn set_fee_controller(&mut self, fee_controller: Address) {
        self.require_admin();
        self.fee_controller.set(Some(fee_controller));
    }

    /// Set the exclusion registry address (admin only)
    pub fn set_exclusions(&mut self, exclusions: Address) {
        self.require_admin();
        self.exclusions.set(Some(exclusions));
    }

    /// Set the staking vault address (admin only)
    pub fn set_vault(&mut self, vault: Address) {
        self.require_admin();
        self.vault.set(Some(vault));
    }

    /// Set the security limiter address (admin only)
    pub fn set_limiter(&mut self, limiter: Address) {
        self.require_admin();
        self.limiter.set(Some(limiter));
    }

    /// Set the emergency control address (admin only)
    pub fn set_emergency(&mut self, emergency: Address) {
        self.require_admin();
        self.emergency.set(Some(emergency));
    }

    /// Set the timelock store address (admin only)
    pub fn set_timelock(&mut self, timelock: Address) {
        self.require_admin();
        self.timelock.set(Some(timelock));
    }

    /// Transfer admin to new address (admin only)
    pub fn transfer_admin(&mut self, new_admin: Address) {
        self.require_admin();
        self.admin.set(new_admin);
    }

    /// Get the admin address
    pub fn get_admin(&self) -> Option<Address> {
        self.admin.get()
    }

    /// Get the capability registry address
    pub fn get_capabilities(&self) -> Option<Address> {
        self.capabilities.get().flatten()
    }

    /// Get the ledger token address
    pub fn get_token(&self) -> Option<Address> {
        self.token.get().flatten()
    }

    /// Get the transfer pipeline address
    pub fn get_pipeline(&self) -> Option<Address> {
        self.pipeline.get().flatten()
    }

    /// Get the fee controller address
    pub fn get_fee_controller(&self) -> Option<Address> {
        self.fee_controller.get().flatten()
    }

    /// Get the exclusion registry address
    pub fn get_exclusions(&self) -> Option<Address> {
        self.exclusions.get().flatten()
    }

    /// Get the staking vault address
    pub fn get_vault(&self) -> Option<Address> {
        self.vault.get().flatten()
    }

    /// Get the security limiter address
    pub fn get_limiter(&self) -> Option<Address> {
        self.limiter.get().flatten()
    }

    /// Get the emergency control address
    pub fn get_emergency(&self) -> Option<Address> {
        self.emergency.get().flatten()
    }

    /// Get the timelock store address
    pub fn get_timelock(&self) -> Option<Address> {
        self.timelock.get().flatten()
    }

    /// Check if caller is admin
    pub fn is_admin(&self, caller: Address) -> bool {
        self.admin.get().map_or(false, |admin| admin == caller)
    }

    fn require_admin(&self) {
        let caller = self.env().caller();
        if !self.is_admin(caller) {
            self.env().revert(FluxError::Unauthorized);
        }
    }
}
