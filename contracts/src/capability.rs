//! Capability Registry
//!
//! Flat (module, role) -> bool capability table gating module-to-module
//! calls. Roles are opaque fixed-width identifiers with no hierarchy: the
//! authorization decision is a single lookup, and absence of an explicit
//! grant is denial.

use odra::prelude::*;
use crate::errors::FluxError;

/// Role constants (u8 for efficient storage)
pub const ROLE_ADMIN: u8 = 0;
pub const ROLE_PIPELINE: u8 = 1;
pub const ROLE_MINTER: u8 = 2;
pub const ROLE_PAUSER: u8 = 3;
pub const ROLE_EMERGENCY: u8 = 4;
pub const ROLE_TREASURY: u8 = 5;
pub const ROLE_FEE_ADMIN: u8 = 6;

/// Capability granted event
#[odra::event]
pub struct CapabilityGranted {
    /// Module receiving the capability
    pub module: Address,
    /// Role identifier
    pub role: u8,
}

/// Capability revoked event
#[odra::event]
pub struct CapabilityRevoked {
    /// Module losing the capability
    pub module: Address,
    /// Role identifier
    pub role: u8,
}

/// Capability Registry Contract
#[odra::module(events = [CapabilityGranted, CapabilityRevoked])]
pub struct CapabilityRegistry {
    /// Owning authority allowed to grant and revoke
    owner: Var<Address>,
    /// Capability table: (module, role) -> authorized
    grants: Mapping<(Address, u8), bool>,
    /// Number of grants per role
    grant_count: Mapping<u8, u32>,
}

#[odra::module]
impl CapabilityRegistry {
    /// Initialize the registry with its owning authority
    pub fn init(&mut self, owner: Address) {
        self.owner.set(owner);
    }

    // ========== Query Functions ==========

    /// Check whether a module holds a role. Fails closed: no grant, no access.
    pub fn is_authorized(&self, module: Address, role: u8) -> bool {
        self.grants.get(&(module, role)).unwrap_or(false)
    }

    /// Number of modules holding a role
    pub fn get_grant_count(&self, role: u8) -> u32 {
        self.grant_count.get(&role).unwrap_or(0)
    }

    /// Get the owning authority
    pub fn get_owner(&self) -> Option<Address> {
        self.owner.get()
    }

    // ========== Grant Management (owner only) ==========

    /// Grant a role to a module
    pub fn authorize(&mut self, module: Address, role: u8) {
        self.require_owner();

        if self.is_authorized(module, role) {
            return; // Already granted
        }

        self.grants.set(&(module, role), true);
        let count = self.get_grant_count(role);
        self.grant_count.set(&role, count + 1);
        self.env().emit_event(CapabilityGranted { module, role });
    }

    /// Revoke a role from a module
    pub fn revoke(&mut self, module: Address, role: u8) {
        self.require_owner();

        if !self.is_authorized(module, role) {
            return; // Nothing to revoke
        }

        self.grants.set(&(module, role), false);
        let count = self.get_grant_count(role);
        if count > 0 {
            self.grant_count.set(&role, count - 1);
        }
        self.env().emit_event(CapabilityRevoked { module, role });
    }

    /// Transfer the owning authority (owner only)
    pub fn transfer_ownership(&mut self, new_owner: Address) {
        self.require_owner();
        self.owner.set(new_owner);
    }

    // ========== Modifier-like Functions (for other contracts) ==========

    /// Revert unless the given module holds the role
    pub fn require_capability(&self, module: Address, role: u8) {
        if !self.is_authorized(module, role) {
            self.env().revert(FluxError::UnauthorizedModule);
        }
    }

    // ========== Internal Functions ==========

    fn require_owner(&self) {
        let caller = self.env().caller();
        match self.owner.get() {
            Some(owner) if caller == owner => {}
            _ => self.env().revert(FluxError::Unauthorized),
        }
    }
}
