//! Protocol error definitions.

use odra::prelude::*;

/// Flux protocol errors
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FluxError {
    // Transfer pipeline errors (1xx)
    ZeroAddress = 100,
    InvalidAmount = 101,
    ExceedsLimit = 102,
    Paused = 103,
    SupplyCapExceeded = 104,

    // Fee engine errors (2xx)
    InvalidPercent = 200,
    FeeRangeOutOfBounds = 201,

    // Stake ledger errors (3xx)
    InsufficientBalance = 300,
    StillLocked = 301,
    TooSoon = 302,
    StakerSetFull = 303,
    DepositAboveCeiling = 304,
    ReentrantCall = 305,

    // Reward accrual errors (4xx)
    NothingToClaim = 400,
    Overflow = 401,

    // Authorization errors (5xx)
    Unauthorized = 500,
    UnauthorizedModule = 501,

    // Emergency control errors (6xx)
    SelfDelivery = 600,
    AboveEmergencyCap = 601,

    // Timelock errors (7xx)
    AlreadyCommitted = 700,
    ProposalNotFound = 701,
    NotReady = 702,
    AlreadyExecuted = 703,
    AlreadyRevealed = 704,
    HashMismatch = 705,

    // Exclusion registry errors (8xx)
    ExclusionSetFull = 800,

    // Token errors (9xx)
    TokenTransferFailed = 900,
    InsufficientTokenBalance = 901,

    // Configuration errors (10xx)
    InvalidConfig = 1000,
}

impl FluxError {
    pub const fn message(&self) -> &'static str {
        match self {
            // Pipeline
            FluxError::ZeroAddress => "Recipient is the null account",
            FluxError::InvalidAmount => "Amount is zero or above a ceiling",
            FluxError::ExceedsLimit => "Amount exceeds the configured limit",
            FluxError::Paused => "Operation blocked: transfers paused",
            FluxError::SupplyCapExceeded => "Mint would exceed the supply ceiling",

            // Fee
            FluxError::InvalidPercent => "Stored fee exceeds the per-mille base",
            FluxError::FeeRangeOutOfBounds => "Fee range outside the absolute ceiling",

            // Stake
            FluxError::InsufficientBalance => "Insufficient staked balance",
            FluxError::StillLocked => "Stake lock has not expired",
            FluxError::TooSoon => "Cooldown or minimum duration not elapsed",
            FluxError::StakerSetFull => "Active staker set is at capacity",
            FluxError::DepositAboveCeiling => "Deposit exceeds the per-deposit ceiling",
            FluxError::ReentrantCall => "Reentrant call rejected",

            // Rewards
            FluxError::NothingToClaim => "No pending reward to claim",
            FluxError::Overflow => "Accumulator or distribution ceiling reached",

            // Authorization
            FluxError::Unauthorized => "Unauthorized: caller is not owner/admin",
            FluxError::UnauthorizedModule => "Unauthorized: module lacks the required capability",

            // Emergency
            FluxError::SelfDelivery => "Emergency delivery to the control module itself",
            FluxError::AboveEmergencyCap => "Amount exceeds the absolute emergency cap",

            // Timelock
            FluxError::AlreadyCommitted => "Proposal already committed for this id",
            FluxError::ProposalNotFound => "No committed proposal for this id",
            FluxError::NotReady => "Execution delay has not elapsed",
            FluxError::AlreadyExecuted => "Proposal already executed",
            FluxError::AlreadyRevealed => "Proposal already revealed",
            FluxError::HashMismatch => "Reveal does not match the committed hash",

            // Exclusion
            FluxError::ExclusionSetFull => "Fee exclusion set is at capacity",

            // Token
            FluxError::TokenTransferFailed => "Token transfer failed",
            FluxError::InsufficientTokenBalance => "Insufficient token balance",

            // Config
            FluxError::InvalidConfig => "Invalid configuration parameter",
        }
    }
}

impl core::fmt::Display for FluxError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<FluxError> for OdraError {
    fn from(error: FluxError) -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            OdraError::user(error as u16)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            OdraError::user(error as u16, error.message())
        }
    }
}
