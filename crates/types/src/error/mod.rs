// Path: crates/types/src/error/mod.rs
//! Core error types for the Meridian kernel.

use crate::app::service::{ContextState, RequestContextId, RequestId};
use crate::app::AccountId;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors related to the state tree or state manager.
#[derive(Error, Debug)]
pub enum StateError {
    /// The requested key was not found in the state.
    #[error("Key not found in state")]
    KeyNotFound,
    /// State validation failed.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Applying a state change failed.
    #[error("Apply failed: {0}")]
    Apply(String),
    /// An error occurred in the state backend.
    #[error("State backend error: {0}")]
    Backend(String),
    /// An error occurred while writing to the state.
    #[error("State write error: {0}")]
    WriteError(String),
    /// The provided value was invalid.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    /// An error occurred during state deserialization.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ErrorCode for StateError {
    fn code(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "STATE_KEY_NOT_FOUND",
            Self::Validation(_) => "STATE_VALIDATION_FAILED",
            Self::Apply(_) => "STATE_APPLY_FAILED",
            Self::Backend(_) => "STATE_BACKEND_ERROR",
            Self::WriteError(_) => "STATE_WRITE_ERROR",
            Self::InvalidValue(_) => "STATE_INVALID_VALUE",
            Self::Decode(_) => "STATE_DECODE_ERROR",
        }
    }
}

/// Errors related to the service-market module: the definition/binding
/// registry, the request-context engine, and fee settlement.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A service with the given name already exists.
    #[error("Service '{0}' already exists")]
    DuplicateService(String),
    /// No service with the given name exists.
    #[error("Service '{0}' not found")]
    UnknownService(String),
    /// A definition field failed validation.
    #[error("Invalid service definition: {0}")]
    InvalidDefinition(String),
    /// The provider already holds a binding for this service.
    #[error("Binding for service '{service}' already exists for provider {provider:?}")]
    DuplicateBinding {
        /// The service name.
        service: String,
        /// The providing account.
        provider: AccountId,
    },
    /// No binding exists for this (service, provider) pair.
    #[error("Binding for service '{service}' not found for provider {provider:?}")]
    UnknownBinding {
        /// The service name.
        service: String,
        /// The providing account.
        provider: AccountId,
    },
    /// The deposit is below the pricing-derived minimum.
    #[error("Deposit {got} is below the required minimum {required}")]
    InsufficientDeposit {
        /// The minimum required deposit.
        required: u128,
        /// The deposit offered.
        got: u128,
    },
    /// A deposit refund was requested for a binding that is still available.
    #[error("Binding is still available; disable it before refunding the deposit")]
    StillAvailable,
    /// The binding is already available.
    #[error("Binding is already available")]
    AlreadyAvailable,
    /// The binding is already disabled.
    #[error("Binding is already disabled")]
    AlreadyDisabled,
    /// The deposit refund cool-down has not elapsed since disablement.
    #[error("Deposit is refundable at height {refundable_at}")]
    CooldownNotElapsed {
        /// The first height at which the refund is permitted.
        refundable_at: u64,
    },
    /// No request context with the given identifier exists.
    #[error("Request context {0} not found")]
    UnknownRequestContext(RequestContextId),
    /// The operation is not legal in the context's current lifecycle state.
    #[error("Operation not permitted while the context is {actual:?}")]
    InvalidContextState {
        /// The context's current state.
        actual: ContextState,
    },
    /// The current batch is still collecting responses; parameter updates
    /// apply only between batches.
    #[error("Current batch is still running; wait for it to complete")]
    BatchInFlight,
    /// Fewer eligible providers than the response threshold requires.
    #[error("Only {available} of the required {required} providers are available")]
    InsufficientProviders {
        /// Eligible providers after filtering.
        available: u32,
        /// The minimum required by the threshold.
        required: u32,
    },
    /// A request-context field failed validation.
    #[error("Invalid request context: {0}")]
    InvalidRequestInput(String),
    /// No pending request with the given identifier exists. Raised both for
    /// never-issued identifiers and for requests already answered or expired;
    /// the two are indistinguishable once the pending record is deleted.
    #[error("Request {0} not found, already answered, or expired")]
    UnknownRequest(RequestId),
    /// The context is owned by a module and cannot be driven by user messages.
    #[error("Request context is owned by module '{0}'")]
    ModuleOwned(String),
    /// The signer is not permitted to perform this operation.
    #[error("Not authorized: {0}")]
    Unauthorized(String),
}

impl ErrorCode for ServiceError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateService(_) => "SERVICE_DUPLICATE_DEFINITION",
            Self::UnknownService(_) => "SERVICE_UNKNOWN_DEFINITION",
            Self::InvalidDefinition(_) => "SERVICE_INVALID_DEFINITION",
            Self::DuplicateBinding { .. } => "SERVICE_DUPLICATE_BINDING",
            Self::UnknownBinding { .. } => "SERVICE_UNKNOWN_BINDING",
            Self::InsufficientDeposit { .. } => "SERVICE_INSUFFICIENT_DEPOSIT",
            Self::StillAvailable => "SERVICE_BINDING_STILL_AVAILABLE",
            Self::AlreadyAvailable => "SERVICE_BINDING_ALREADY_AVAILABLE",
            Self::AlreadyDisabled => "SERVICE_BINDING_ALREADY_DISABLED",
            Self::CooldownNotElapsed { .. } => "SERVICE_REFUND_COOLDOWN",
            Self::UnknownRequestContext(_) => "SERVICE_UNKNOWN_CONTEXT",
            Self::InvalidContextState { .. } => "SERVICE_INVALID_CONTEXT_STATE",
            Self::BatchInFlight => "SERVICE_BATCH_IN_FLIGHT",
            Self::InsufficientProviders { .. } => "SERVICE_INSUFFICIENT_PROVIDERS",
            Self::InvalidRequestInput(_) => "SERVICE_INVALID_REQUEST_INPUT",
            Self::UnknownRequest(_) => "SERVICE_UNKNOWN_REQUEST",
            Self::ModuleOwned(_) => "SERVICE_MODULE_OWNED_CONTEXT",
            Self::Unauthorized(_) => "SERVICE_UNAUTHORIZED",
        }
    }
}

/// Errors related to the oracle-feed overlay.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The signer is not a registered profiler.
    #[error("Account {0:?} is not a registered profiler")]
    NotProfiler(AccountId),
    /// A feed with the given name already exists.
    #[error("Feed '{0}' already exists")]
    DuplicateFeed(String),
    /// No feed with the given name exists.
    #[error("Feed '{0}' not found")]
    UnknownFeed(String),
    /// The signer is not the feed's creator.
    #[error("Account {signer:?} is not the creator of feed '{feed}'")]
    NotFeedCreator {
        /// The feed name.
        feed: String,
        /// The offending signer.
        signer: AccountId,
    },
    /// The named aggregation function is not supported.
    #[error("Unknown aggregate function '{0}'")]
    UnknownAggregateFunc(String),
    /// The requested history bound is out of range.
    #[error("Latest history {got} is out of range 1..={max}")]
    InvalidLatestHistory {
        /// The requested bound.
        got: u64,
        /// The module-wide maximum.
        max: u64,
    },
    /// A feed field failed validation.
    #[error("Invalid feed: {0}")]
    InvalidFeed(String),
}

impl ErrorCode for OracleError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotProfiler(_) => "ORACLE_NOT_PROFILER",
            Self::DuplicateFeed(_) => "ORACLE_DUPLICATE_FEED",
            Self::UnknownFeed(_) => "ORACLE_UNKNOWN_FEED",
            Self::NotFeedCreator { .. } => "ORACLE_NOT_FEED_CREATOR",
            Self::UnknownAggregateFunc(_) => "ORACLE_UNKNOWN_AGGREGATE_FUNC",
            Self::InvalidLatestHistory { .. } => "ORACLE_INVALID_LATEST_HISTORY",
            Self::InvalidFeed(_) => "ORACLE_INVALID_FEED",
        }
    }
}

/// Errors related to the guardian profiler registry.
#[derive(Debug, Error)]
pub enum GuardianError {
    /// The account is already a registered profiler.
    #[error("Account {0:?} is already a profiler")]
    ProfilerExists(AccountId),
    /// The account is not a registered profiler.
    #[error("Account {0:?} is not a profiler")]
    ProfilerNotFound(AccountId),
    /// The signer is not permitted to perform this operation.
    #[error("Not authorized: {0}")]
    Unauthorized(String),
}

impl ErrorCode for GuardianError {
    fn code(&self) -> &'static str {
        match self {
            Self::ProfilerExists(_) => "GUARDIAN_PROFILER_EXISTS",
            Self::ProfilerNotFound(_) => "GUARDIAN_PROFILER_NOT_FOUND",
            Self::Unauthorized(_) => "GUARDIAN_UNAUTHORIZED",
        }
    }
}

/// Errors raised while executing a dispatched service call.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// An error occurred during serialization.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred during deserialization.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    /// The transaction is invalid for a model-specific reason.
    #[error("Invalid transaction: {0}")]
    Invalid(String),
    /// An error originating from the service-market module.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
    /// An error originating from the oracle module.
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
    /// An error originating from the guardian module.
    #[error("Guardian error: {0}")]
    Guardian(#[from] GuardianError),
    /// An error originating from the state manager.
    #[error("State error: {0}")]
    State(#[from] StateError),
    /// The account has insufficient funds to cover the transfer amount.
    #[error("Insufficient funds")]
    InsufficientFunds,
    /// The transaction resulted in a balance overflow.
    #[error("Balance overflow")]
    BalanceOverflow,
    /// The transaction type requires a service or method that is not enabled.
    #[error("Unsupported transaction type: {0}")]
    Unsupported(String),
}

impl ErrorCode for TransactionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "TX_SERIALIZATION_ERROR",
            Self::Deserialization(_) => "TX_DESERIALIZATION_ERROR",
            Self::Invalid(_) => "TX_INVALID",
            Self::Service(_) => "TX_SERVICE_ERROR",
            Self::Oracle(_) => "TX_ORACLE_ERROR",
            Self::Guardian(_) => "TX_GUARDIAN_ERROR",
            Self::State(_) => "TX_STATE_ERROR",
            Self::InsufficientFunds => "TX_INSUFFICIENT_FUNDS",
            Self::BalanceOverflow => "TX_BALANCE_OVERFLOW",
            Self::Unsupported(_) => "TX_UNSUPPORTED",
        }
    }
}

impl From<String> for TransactionError {
    fn from(s: String) -> Self {
        TransactionError::Invalid(s)
    }
}
