//! Exclusion Registry
//!
//! Bounded set of accounts exempt from fee extraction. Mutations are gated
//! through the capability registry (fee-admin role); membership changes are
//! idempotent with respect to the recorded count.

use odra::prelude::*;
use odra::casper_types::{runtime_args, RuntimeArgs};
use odra::CallDef;
use crate::capability::ROLE_FEE_ADMIN;
use crate::errors::FluxError;

/// Maximum cardinality of the exclusion set
pub const MAX_EXCLUSIONS: u32 = 256;

/// Exclusion membership change event
#[odra::event]
pub struct ExclusionUpdated {
    /// Account whose membership changed
    pub account: Address,
    /// Whether the account is now excluded
    pub excluded: bool,
    /// Set cardinality after the change
    pub excluded_count: u32,
}

/// Exclusion Registry Contract
#[odra::module(events = [ExclusionUpdated])]
pub struct ExclusionRegistry {
    /// Capability registry address
    capabilities: Var<Address>,
    /// Membership: account -> excluded
    excluded: Mapping<Address, bool>,
    /// Current set cardinality
    excluded_count: Var<u32>,
}

#[odra::module]
impl ExclusionRegistry {
    /// Initialize with the capability registry address
    pub fn init(&mut self, capabilities: Address) {
        self.capabilities.set(capabilities);
        self.excluded_count.set(0);
    }

    // ========== Query Functions ==========

    /// Whether an account is exempt from fee extraction
    pub fn is_excluded(&self, account: Address) -> bool {
        self.excluded.get(&account).unwrap_or(false)
    }

    /// Current set cardinality
    pub fn get_excluded_count(&self) -> u32 {
        self.excluded_count.get().unwrap_or(0)
    }

    // ========== Admin Functions (fee-admin capability) ==========

    /// Add an account to the exclusion set.
    /// Excluding an already-excluded account is a silent no-op.
    pub fn exclude(&mut self, account: Address) {
        self.require_fee_admin();

        if self.is_excluded(account) {
            return;
        }

        let count = self.get_excluded_count();
        if count >= MAX_EXCLUSIONS {
            self.env().revert(FluxError::ExclusionSetFull);
        }

        self.excluded.set(&account, true);
        self.excluded_count.set(count + 1);
        self.env().emit_event(ExclusionUpdated {
            account,
            excluded: true,
            excluded_count: count + 1,
        });
    }

    /// Remove an account from the exclusion set.
    /// Including an already-included account is a silent no-op.
    pub fn include(&mut self, account: Address) {
        self.require_fee_admin();

        if !self.is_excluded(account) {
            return;
        }

        let count = self.get_excluded_count();
        let new_count = count.saturating_sub(1);
        self.excluded.set(&account, false);
        self.excluded_count.set(new_count);
        self.env().emit_event(ExclusionUpdated {
            account,
            excluded: false,
            excluded_count: new_count,
        });
    }

    // ========== Internal Functions ==========

    fn require_fee_admin(&self) {
        let caller = self.env().caller();
        let capabilities = match self.capabilities.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        };

        let args = runtime_args! {
            "module" => caller,
            "role" => ROLE_FEE_ADMIN
        };
        let call_def = CallDef::new("is_authorized", false, args);
        let authorized: bool = self.env().call_contract(capabilities, call_def);

        if !authorized {
            self.env().revert(FluxError::UnauthorizedModule);
        }
    }
}
