//! Timelock Proposal Store Contract
//!
//! Two-phase commit/reveal gating critical parameter changes. A SHA-256
//! commitment over `(action, payload, salt)` is registered first; the
//! underlying action is authorized only after the execution delay and a
//! matching reveal. Re-execution on the same proposal id is spaced by a
//! minimum interval.
//!
//! The wired action is the treasury change on the fee controller; the
//! store holds the treasury capability for it.

use odra::prelude::*;
use odra::casper_types::bytesrepr::ToBytes;
use odra::casper_types::{runtime_args, RuntimeArgs};
use odra::CallDef;
use sha2::{Digest, Sha256};
use crate::capability::ROLE_ADMIN;
use crate::errors::FluxError;
use crate::types::TimelockProposal;

/// Default execution delay in counter ticks
const DEFAULT_EXECUTION_DELAY: u64 = 86_400;

/// Default minimum spacing between executions on the same id
const DEFAULT_MIN_SPACING: u64 = 172_800;

/// Action tag for treasury changes
const ACTION_SET_TREASURY: &[u8] = b"set_treasury";

/// Proposal committed event
#[odra::event]
pub struct ProposalCommitted {
    /// Proposal identifier
    pub id: [u8; 32],
    /// Counter tick after which the proposal may execute
    pub execute_after: u64,
}

/// Proposal executed event
#[odra::event]
pub struct ProposalExecuted {
    /// Proposal identifier
    pub id: [u8; 32],
}

/// Proposal cancelled event
#[odra::event]
pub struct ProposalCancelled {
    /// Proposal identifier
    pub id: [u8; 32],
}

/// Timelock Proposal Store Contract
#[odra::module(events = [ProposalCommitted, ProposalExecuted, ProposalCancelled])]
pub struct TimelockStore {
    /// Capability registry address
    capabilities: Var<Address>,
    /// Fee controller address (target of the treasury action)
    fee_controller: Var<Address>,
    /// Proposals by id; `execute_after == 0` marks absence
    proposals: Mapping<[u8; 32], TimelockProposal>,
    /// Last execution counter per id (survives proposal replacement)
    last_execution: Mapping<[u8; 32], u64>,
    /// Execution delay in counter ticks
    delay: Var<u64>,
    /// Minimum re-execution spacing in counter ticks
    min_spacing: Var<u64>,
}

#[odra::module]
impl TimelockStore {
    /// Initialize the store
    pub fn init(&mut self, capabilities: Address, fee_controller: Address) {
        self.capabilities.set(capabilities);
        self.fee_controller.set(fee_controller);
        self.delay.set(DEFAULT_EXECUTION_DELAY);
        self.min_spacing.set(DEFAULT_MIN_SPACING);
    }

    // ========== Commit Phase (admin capability) ==========

    /// Commit a proposal hash for an id.
    ///
    /// Fails if a pending (unexecuted) proposal already exists for the id,
    /// or if the minimum spacing since the id's last execution has not
    /// elapsed.
    pub fn commit(&mut self, id: [u8; 32], hash: [u8; 32]) {
        self.require_admin();

        let now = self.env().get_block_time();
        let existing = self.proposals.get(&id).unwrap_or_default();
        if existing.execute_after != 0 && !existing.executed {
            self.env().revert(FluxError::AlreadyCommitted);
        }

        let last_exec = self.last_execution.get(&id).unwrap_or(0);
        let spacing = self.min_spacing.get().unwrap_or(DEFAULT_MIN_SPACING);
        if last_exec != 0 && now < last_exec.saturating_add(spacing) {
            self.env().revert(FluxError::TooSoon);
        }

        let execute_after = now + self.delay.get().unwrap_or(DEFAULT_EXECUTION_DELAY);
        self.proposals.set(
            &id,
            TimelockProposal {
                execute_after,
                commit_hash: hash,
                executed: false,
                revealed: false,
            },
        );
        self.env().emit_event(ProposalCommitted { id, execute_after });
    }

    /// Cancel a committed proposal (admin capability)
    pub fn cancel(&mut self, id: [u8; 32]) {
        self.require_admin();

        let existing = self.proposals.get(&id).unwrap_or_default();
        if existing.execute_after == 0 {
            self.env().revert(FluxError::ProposalNotFound);
        }

        self.proposals.set(&id, TimelockProposal::default());
        self.env().emit_event(ProposalCancelled { id });
    }

    // ========== Reveal/Execute Phase ==========

    /// Reveal and execute a committed treasury change.
    ///
    /// Open to any caller: the commitment hash is the authorization. The
    /// proposal id is derived from the action and its parameters, so the
    /// reveal fails unless it matches a prior commit exactly.
    pub fn execute_set_treasury(&mut self, new_treasury: Address, salt: [u8; 32]) {
        let payload = new_treasury.to_bytes().unwrap_or_default();
        let id = action_id(ACTION_SET_TREASURY, &payload);

        let now = self.env().get_block_time();
        let mut proposal = self.proposals.get(&id).unwrap_or_default();

        if proposal.execute_after == 0 {
            self.env().revert(FluxError::ProposalNotFound);
        }
        if now < proposal.execute_after {
            self.env().revert(FluxError::NotReady);
        }
        if proposal.executed {
            self.env().revert(FluxError::AlreadyExecuted);
        }
        if proposal.revealed {
            self.env().revert(FluxError::AlreadyRevealed);
        }
        if commitment(ACTION_SET_TREASURY, &payload, &salt) != proposal.commit_hash {
            self.env().revert(FluxError::HashMismatch);
        }

        proposal.revealed = true;
        self.proposals.set(&id, proposal.clone());

        // The actual state change; re-arms the spacing guard on success
        let fee_controller = match self.fee_controller.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        };
        let args = runtime_args! { "treasury" => new_treasury };
        let call_def = CallDef::new("set_treasury", true, args);
        self.env().call_contract::<()>(fee_controller, call_def);

        proposal.executed = true;
        self.proposals.set(&id, proposal);
        self.last_execution.set(&id, now);
        self.env().emit_event(ProposalExecuted { id });
    }

    // ========== Query Functions ==========

    /// Proposal by id (zero-defaults when absent)
    pub fn get_proposal(&self, id: [u8; 32]) -> TimelockProposal {
        self.proposals.get(&id).unwrap_or_default()
    }

    /// Last execution counter for an id (zero when never executed)
    pub fn get_last_execution(&self, id: [u8; 32]) -> u64 {
        self.last_execution.get(&id).unwrap_or(0)
    }

    /// Proposal id for a treasury change
    pub fn treasury_proposal_id(&self, new_treasury: Address) -> [u8; 32] {
        let payload = new_treasury.to_bytes().unwrap_or_default();
        action_id(ACTION_SET_TREASURY, &payload)
    }

    /// Commitment hash for a treasury change with a given salt
    pub fn treasury_commitment(&self, new_treasury: Address, salt: [u8; 32]) -> [u8; 32] {
        let payload = new_treasury.to_bytes().unwrap_or_default();
        commitment(ACTION_SET_TREASURY, &payload, &salt)
    }

    // ========== Admin Functions ==========

    /// Update the execution delay
    pub fn set_delay(&mut self, ticks: u64) {
        self.require_admin();
        if ticks == 0 {
            self.env().revert(FluxError::InvalidConfig);
        }
        self.delay.set(ticks);
    }

    /// Update the minimum re-execution spacing
    pub fn set_min_spacing(&mut self, ticks: u64) {
        self.require_admin();
        self.min_spacing.set(ticks);
    }

    // ========== Internal Functions ==========

    fn require_admin(&self) {
        let caller = self.env().caller();
        let capabilities = match self.capabilities.get() {
            Some(addr) => addr,
            None => self.env().revert(FluxError::InvalidConfig),
        };
        let args = runtime_args! {
            "module" => caller,
            "role" => ROLE_ADMIN
        };
        let call_def = CallDef::new("is_authorized", false, args);
        let authorized: bool = self.env().call_contract(capabilities, call_def);
        if !authorized {
            self.env().revert(FluxError::Unauthorized);
        }
    }
}

/// Proposal id: SHA-256 over the action tag and its parameters
pub fn action_id(action: &[u8], payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(action);
    hasher.update(payload);
    hasher.finalize().into()
}

/// Commitment: SHA-256 over the action tag, parameters, and salt
pub fn commitment(action: &[u8], payload: &[u8], salt: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(action);
    hasher.update(payload);
    hasher.update(salt);
    hasher.finalize().into()
}
