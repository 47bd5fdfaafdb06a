//! Flux Protocol Contracts
//!
//! Modular value-transfer ledger with per-transfer fee extraction, a
//! staking pool with epoch-based reward accrual, and capability-gated
//! emergency controls.
//!
//! ## Architecture
//!
//! - **TransferPipeline**: entry point orchestrating every transfer through
//!   validation, security check, fee extraction, ledger mutation, and
//!   reward-accrual refresh
//! - **FluxToken (FLX)**: CEP-18 compatible ledger with protocol-controlled
//!   mint/burn and unconditional internal moves
//! - **FeeController**: per-transfer fee split with dynamic rate
//!   retargeting from the staking-pool ratio
//! - **ExclusionRegistry**: bounded set of fee-exempt accounts
//! - **StakingVault**: stake ledger plus epoch-segmented reward accrual;
//!   holds staked funds and the reward pool
//! - **SecurityLimiter**: per-account cooldown, max-transfer-fraction, and
//!   anti-flash-loan floor
//! - **CapabilityRegistry**: flat (module, role) capability table gating
//!   sensitive operations
//! - **EmergencyControl**: rate-limited fund recovery bounded by the
//!   surplus over known obligations
//! - **TimelockStore**: commit/reveal gating for critical parameter changes
//! - **ProtocolRegistry**: module addresses and post-deploy wiring
//!
//! Modules are deployed without cross-references and wired in a second
//! pass through the registry and capability grants.

#![cfg_attr(target_arch = "wasm32", no_std)]

#[cfg(target_arch = "wasm32")]
extern crate alloc;

// Re-export odra for downstream usage
pub use odra;

// Core module declarations
pub mod types;
pub mod errors;
pub mod fee_math;
pub mod accrual;

// Contract modules
pub mod registry;
pub mod capability;
pub mod exclusion;
pub mod fee_engine;
pub mod staking_vault;
pub mod security;
pub mod emergency;
pub mod timelock;
pub mod pipeline;
pub mod token;
