// Path: crates/types/src/keys/mod.rs
//! Defines constants and builders for well-known state keys.
//!
//! These provide a single source of truth for the keys used to store the
//! service-market, oracle, and guardian records in the state manager. Using
//! these helpers prevents typos and ensures consistency across modules that
//! access the same state entries.
//!
//! Height components of queue keys are encoded big-endian so that an ascending
//! prefix scan visits entries in height order.

use crate::app::service::{RequestContextId, RequestId};
use crate::app::AccountId;

/// The state key prefix for service definitions, keyed by name.
pub const SERVICE_DEFINITION_PREFIX: &[u8] = b"service::definition::";
/// The state key prefix for provider bindings, keyed by (service, provider).
pub const SERVICE_BINDING_PREFIX: &[u8] = b"service::binding::";
/// The state key for the module-wide request-context creation sequence.
pub const SERVICE_CONTEXT_SEQ_KEY: &[u8] = b"service::context_seq";
/// The state key prefix for request contexts, keyed by context ID.
pub const SERVICE_CONTEXT_PREFIX: &[u8] = b"service::context::";
/// The state key prefix for pending requests, keyed by request ID.
pub const SERVICE_ACTIVE_REQUEST_PREFIX: &[u8] = b"service::request::active::";
/// The state key prefix for the per-batch request index, keyed by
/// (context ID, batch counter, provider).
pub const SERVICE_BATCH_REQUEST_PREFIX: &[u8] = b"service::request::batch::";
/// The state key prefix for responses, keyed by (context ID, batch counter, provider).
pub const SERVICE_RESPONSE_PREFIX: &[u8] = b"service::response::";
/// The state key prefix for the expiration queue, keyed by (height, request ID).
pub const SERVICE_EXPIRATION_QUEUE_PREFIX: &[u8] = b"service::queue::expire::";
/// The state key prefix for the new-batch queue, keyed by (height, context ID).
pub const SERVICE_NEW_BATCH_QUEUE_PREFIX: &[u8] = b"service::queue::batch::";
/// The state key prefix for per-account fee accumulators.
pub const SERVICE_FEES_PREFIX: &[u8] = b"service::fees::";

/// The state key prefix for oracle feeds, keyed by name.
pub const ORACLE_FEED_PREFIX: &[u8] = b"oracle::feed::";
/// The state key prefix for the request-context-to-feed back index.
pub const ORACLE_FEED_BY_CONTEXT_PREFIX: &[u8] = b"oracle::feed_by_context::";
/// The state key prefix for aggregated feed values, keyed by (feed, batch counter).
pub const ORACLE_FEED_VALUE_PREFIX: &[u8] = b"oracle::value::";

/// The state key prefix for guardian profiler records, keyed by address.
pub const GUARDIAN_PROFILER_PREFIX: &[u8] = b"guardian::profiler::";

/// The state key prefix for account balances held by the bank.
pub const BANK_BALANCE_PREFIX: &[u8] = b"bank::balance::";
/// The state key prefix for module escrow account balances.
pub const BANK_MODULE_BALANCE_PREFIX: &[u8] = b"bank::module::";

/// The key for a service definition.
pub fn service_definition_key(name: &str) -> Vec<u8> {
    [SERVICE_DEFINITION_PREFIX, name.as_bytes()].concat()
}

/// The key for a provider binding.
pub fn service_binding_key(service: &str, provider: &AccountId) -> Vec<u8> {
    [
        SERVICE_BINDING_PREFIX,
        service.as_bytes(),
        b"::",
        provider.as_ref(),
    ]
    .concat()
}

/// The scan prefix covering every binding of a service.
pub fn service_binding_prefix(service: &str) -> Vec<u8> {
    [SERVICE_BINDING_PREFIX, service.as_bytes(), b"::"].concat()
}

/// The key for a request context.
pub fn request_context_key(context_id: &RequestContextId) -> Vec<u8> {
    [SERVICE_CONTEXT_PREFIX, context_id.as_ref()].concat()
}

/// The key for a pending request.
pub fn active_request_key(request_id: &RequestId) -> Vec<u8> {
    [SERVICE_ACTIVE_REQUEST_PREFIX, request_id.as_ref()].concat()
}

/// The per-batch index key mapping (context, batch, provider) to a request ID.
pub fn batch_request_key(
    context_id: &RequestContextId,
    batch_counter: u64,
    provider: &AccountId,
) -> Vec<u8> {
    [
        SERVICE_BATCH_REQUEST_PREFIX,
        context_id.as_ref(),
        b"::",
        &batch_counter.to_be_bytes(),
        b"::",
        provider.as_ref(),
    ]
    .concat()
}

/// The scan prefix covering every request index entry of one batch.
pub fn batch_request_prefix(context_id: &RequestContextId, batch_counter: u64) -> Vec<u8> {
    [
        SERVICE_BATCH_REQUEST_PREFIX,
        context_id.as_ref(),
        b"::",
        &batch_counter.to_be_bytes(),
        b"::",
    ]
    .concat()
}

/// The key for a response record.
pub fn response_key(
    context_id: &RequestContextId,
    batch_counter: u64,
    provider: &AccountId,
) -> Vec<u8> {
    [
        SERVICE_RESPONSE_PREFIX,
        context_id.as_ref(),
        b"::",
        &batch_counter.to_be_bytes(),
        b"::",
        provider.as_ref(),
    ]
    .concat()
}

/// The scan prefix covering every response of one batch, in provider order.
pub fn response_prefix(context_id: &RequestContextId, batch_counter: u64) -> Vec<u8> {
    [
        SERVICE_RESPONSE_PREFIX,
        context_id.as_ref(),
        b"::",
        &batch_counter.to_be_bytes(),
        b"::",
    ]
    .concat()
}

/// The expiration-queue key for a request due at `height`.
pub fn expiration_queue_key(height: u64, request_id: &RequestId) -> Vec<u8> {
    [
        SERVICE_EXPIRATION_QUEUE_PREFIX,
        &height.to_be_bytes(),
        b"::",
        request_id.as_ref(),
    ]
    .concat()
}

/// Parses an expiration-queue key back into its (height, request ID) parts.
pub fn parse_expiration_queue_key(key: &[u8]) -> Option<(u64, RequestId)> {
    let rest = key.strip_prefix(SERVICE_EXPIRATION_QUEUE_PREFIX)?;
    if rest.len() != 8 + 2 + 32 {
        return None;
    }
    let (height_bytes, rest) = rest.split_at(8);
    let rest = rest.strip_prefix(b"::")?;
    let height = u64::from_be_bytes(height_bytes.try_into().ok()?);
    let id: [u8; 32] = rest.try_into().ok()?;
    Some((height, RequestId(id)))
}

/// The new-batch-queue key for a context scheduled at `height`.
pub fn new_batch_queue_key(height: u64, context_id: &RequestContextId) -> Vec<u8> {
    [
        SERVICE_NEW_BATCH_QUEUE_PREFIX,
        &height.to_be_bytes(),
        b"::",
        context_id.as_ref(),
    ]
    .concat()
}

/// Parses a new-batch-queue key back into its (height, context ID) parts.
pub fn parse_new_batch_queue_key(key: &[u8]) -> Option<(u64, RequestContextId)> {
    let rest = key.strip_prefix(SERVICE_NEW_BATCH_QUEUE_PREFIX)?;
    if rest.len() != 8 + 2 + 32 {
        return None;
    }
    let (height_bytes, rest) = rest.split_at(8);
    let rest = rest.strip_prefix(b"::")?;
    let height = u64::from_be_bytes(height_bytes.try_into().ok()?);
    let id: [u8; 32] = rest.try_into().ok()?;
    Some((height, RequestContextId(id)))
}

/// The key for an account's fee accumulator.
pub fn service_fees_key(account: &AccountId) -> Vec<u8> {
    [SERVICE_FEES_PREFIX, account.as_ref()].concat()
}

/// The key for an oracle feed.
pub fn feed_key(feed_name: &str) -> Vec<u8> {
    [ORACLE_FEED_PREFIX, feed_name.as_bytes()].concat()
}

/// The back-index key mapping a request context to its owning feed.
pub fn feed_by_context_key(context_id: &RequestContextId) -> Vec<u8> {
    [ORACLE_FEED_BY_CONTEXT_PREFIX, context_id.as_ref()].concat()
}

/// The key for one aggregated feed value.
pub fn feed_value_key(feed_name: &str, batch_counter: u64) -> Vec<u8> {
    [
        ORACLE_FEED_VALUE_PREFIX,
        feed_name.as_bytes(),
        b"::",
        &batch_counter.to_be_bytes(),
    ]
    .concat()
}

/// The scan prefix covering a feed's stored values, oldest batch first.
pub fn feed_value_prefix(feed_name: &str) -> Vec<u8> {
    [ORACLE_FEED_VALUE_PREFIX, feed_name.as_bytes(), b"::"].concat()
}

/// The key for a guardian profiler record.
pub fn profiler_key(address: &AccountId) -> Vec<u8> {
    [GUARDIAN_PROFILER_PREFIX, address.as_ref()].concat()
}

/// The key for an account balance.
pub fn balance_key(account: &AccountId) -> Vec<u8> {
    [BANK_BALANCE_PREFIX, account.as_ref()].concat()
}

/// The key for a module escrow balance.
pub fn module_balance_key(module: &str) -> Vec<u8> {
    [BANK_MODULE_BALANCE_PREFIX, module.as_bytes()].concat()
}
