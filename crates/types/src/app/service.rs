// Path: crates/types/src/app/service.rs

//! Canonical records for the decentralized service market: definitions,
//! provider bindings, request contexts, per-batch requests, and responses.

use crate::app::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A content-derived identifier for a request context.
///
/// Derived as `SHA-256(consumer || creation_height || sequence)` so every node
/// allocates the same identifier for the same creation message.
#[derive(
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Default,
    Hash,
)]
pub struct RequestContextId(pub [u8; 32]);

impl RequestContextId {
    /// Derives the identifier from the creating consumer, the creation height,
    /// and the module-wide creation sequence number.
    pub fn derive(consumer: &AccountId, created_at: u64, sequence: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(consumer.as_ref());
        hasher.update(created_at.to_be_bytes());
        hasher.update(sequence.to_be_bytes());
        Self(hasher.finalize().into())
    }
}

impl AsRef<[u8]> for RequestContextId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Display for RequestContextId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A deterministic identifier for a single provider request within a batch.
///
/// Derived as `SHA-256(context_id || batch_counter || provider_index)`.
#[derive(
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Default,
    Hash,
)]
pub struct RequestId(pub [u8; 32]);

impl RequestId {
    /// Derives the identifier from the owning context, the batch counter, and
    /// the provider's index within the batch.
    pub fn derive(context_id: &RequestContextId, batch_counter: u64, provider_index: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(context_id.as_ref());
        hasher.update(batch_counter.to_be_bytes());
        hasher.update(provider_index.to_be_bytes());
        Self(hasher.finalize().into())
    }
}

impl AsRef<[u8]> for RequestId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// The pricing document a provider declares when binding to a service.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Pricing {
    /// The declared price per request, in base denomination units.
    pub base_price: u128,
}

impl Pricing {
    /// The minimum deposit a binding with this pricing must maintain to stay
    /// available, as `base_price * multiple` (saturating).
    pub fn min_deposit(&self, multiple: u64) -> u128 {
        self.base_price.saturating_mul(multiple as u128)
    }
}

/// An immutable service definition. Created by `define`, never mutated or deleted.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// The unique service name.
    pub name: String,
    /// A human-readable description.
    pub description: String,
    /// Free-form tags for discovery.
    pub tags: Vec<String>,
    /// The account that defined the service.
    pub author: AccountId,
    /// The input/output/error schema document (opaque to the engine).
    pub schemas: String,
}

/// A provider's staked offer to serve a named service, keyed by
/// `(service name, provider)`.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ServiceBinding {
    /// The bound service name.
    pub service_name: String,
    /// The providing account.
    pub provider: AccountId,
    /// The deposit held in module escrow until refunded or slashed.
    pub deposit: u128,
    /// The declared pricing.
    pub pricing: Pricing,
    /// Where deposit refunds are sent. Defaults to the provider.
    pub withdraw_address: AccountId,
    /// Whether the binding participates in batch building.
    pub available: bool,
    /// The height at which the binding became unavailable. Zero while available.
    pub disabled_at: u64,
    /// Consecutive missed responses since the last successful answer.
    pub missed_count: u32,
}

/// The lifecycle state of a request context.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    /// Batches are issued on schedule.
    Running,
    /// No new batches are issued until resumed.
    Paused,
    /// Terminal. The record is retained read-only for query.
    Completed,
}

/// The sub-state of the current batch within a request context.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchState {
    /// Requests are outstanding.
    BatchRunning,
    /// All requests in the batch have been resolved.
    BatchCompleted,
}

/// A standing (possibly repeating) service call spanning one or more batches.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    /// The invoked service.
    pub service_name: String,
    /// The ordered candidate provider set. Eligibility is re-checked at every
    /// batch build, not at creation.
    pub providers: Vec<AccountId>,
    /// The paying consumer.
    pub consumer: AccountId,
    /// The request input payload forwarded to every provider.
    pub input: String,
    /// The per-request fee ceiling the consumer is willing to pay.
    pub service_fee_cap: u128,
    /// The response timeout in blocks.
    pub timeout: u64,
    /// Whether the context re-issues batches on a schedule.
    pub repeated: bool,
    /// Blocks between batch starts. Must be >= `timeout` when repeated.
    pub repeated_frequency: u64,
    /// Remaining batch runs. `-1` means unbounded; decremented as batches
    /// finalize.
    pub repeated_total: i64,
    /// 1-based count of batches issued so far.
    pub batch_counter: u64,
    /// Requests issued in the current batch.
    pub batch_request_count: u32,
    /// Requests resolved in the current batch, per the threshold accounting
    /// rules of the engine.
    pub batch_response_count: u32,
    /// The sub-state of the current batch.
    pub batch_state: BatchState,
    /// The height at which the current batch was issued.
    pub batch_start_height: u64,
    /// The height at which the next batch is scheduled, or zero when none is.
    pub next_batch_height: u64,
    /// The lifecycle state.
    pub state: ContextState,
    /// Minimum responses for a batch to be considered sufficient. Zero means
    /// wait for all providers.
    pub response_threshold: u32,
    /// The owning module for callback dispatch. Empty for user-created contexts.
    pub module_name: String,
    /// Consumer fee exemption, granted by profiler privilege at creation.
    pub super_mode: bool,
}

/// The parameters of a new request context, passed to the engine's
/// `create_request_context` keeper operation.
#[derive(Encode, Decode, Clone, Debug)]
pub struct NewRequestContext {
    /// The invoked service.
    pub service_name: String,
    /// The ordered candidate provider set.
    pub providers: Vec<AccountId>,
    /// The paying consumer.
    pub consumer: AccountId,
    /// The request input payload.
    pub input: String,
    /// The per-request fee ceiling.
    pub service_fee_cap: u128,
    /// The response timeout in blocks.
    pub timeout: u64,
    /// Whether the context repeats.
    pub repeated: bool,
    /// Blocks between batch starts. Zero defaults to `timeout`.
    pub repeated_frequency: u64,
    /// Total batch runs, `-1` for unbounded. Ignored when not repeated.
    pub repeated_total: i64,
    /// Minimum responses for batch sufficiency. Zero waits for all.
    pub response_threshold: u32,
    /// The owning module, or empty for user-created contexts.
    pub module_name: String,
}

/// A partial update to a request context's schedule and provider set.
/// `None` fields are left unchanged. Applies from the next batch build.
#[derive(Encode, Decode, Clone, Debug, Default)]
pub struct RequestContextUpdate {
    /// Replacement candidate provider set.
    pub providers: Option<Vec<AccountId>>,
    /// Replacement fee cap.
    pub service_fee_cap: Option<u128>,
    /// Replacement repeat frequency.
    pub repeated_frequency: Option<u64>,
    /// Replacement remaining-run count.
    pub repeated_total: Option<i64>,
}

/// One outstanding obligation of exactly one provider within exactly one batch.
/// Deleted once resolved; the corresponding `Response` record persists.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompactRequest {
    /// The owning context.
    pub request_context_id: RequestContextId,
    /// The batch this request belongs to.
    pub batch_counter: u64,
    /// The obligated provider.
    pub provider: AccountId,
    /// The paying consumer.
    pub consumer: AccountId,
    /// The request input payload.
    pub input: String,
    /// The fee actually charged into escrow: `min(fee_cap, base_price)`, or
    /// zero in super mode.
    pub service_fee: u128,
    /// The height at which the request was issued.
    pub request_height: u64,
    /// The height at which the request expires unanswered.
    pub expiration_height: u64,
    /// Whether the consumer was fee-exempt for this request.
    pub super_mode: bool,
}

/// The payload of a provider's response: exactly one of a successful output or
/// an application-level error string.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ResponseBody {
    /// A successful output payload.
    Output(String),
    /// An application-level error reported by the provider.
    Error(String),
}

/// A provider's answer to a single request. Append-only; never mutated.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// The answering provider.
    pub provider: AccountId,
    /// The consumer the answer is for.
    pub consumer: AccountId,
    /// The owning context.
    pub request_context_id: RequestContextId,
    /// The batch the answer belongs to.
    pub batch_counter: u64,
    /// The response payload.
    pub body: ResponseBody,
}

/// Per-account fee accumulator, drained to zero by the explicit withdraw and
/// refund messages.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ServiceFees {
    /// Fees earned by answering requests, pending withdrawal (provider role).
    pub incoming: u128,
    /// Fees returned because a request expired or its context was torn down,
    /// pending refund (consumer role).
    pub returned: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_id_derivation_is_deterministic() {
        let consumer = AccountId([7u8; 32]);
        let a = RequestContextId::derive(&consumer, 100, 5);
        let b = RequestContextId::derive(&consumer, 100, 5);
        assert_eq!(a, b);

        assert_ne!(a, RequestContextId::derive(&consumer, 100, 6));
        assert_ne!(a, RequestContextId::derive(&consumer, 101, 5));
        assert_ne!(a, RequestContextId::derive(&AccountId([8u8; 32]), 100, 5));
    }

    #[test]
    fn request_id_varies_by_batch_and_index() {
        let ctx = RequestContextId([1u8; 32]);
        let a = RequestId::derive(&ctx, 1, 0);
        assert_eq!(a, RequestId::derive(&ctx, 1, 0));
        assert_ne!(a, RequestId::derive(&ctx, 2, 0));
        assert_ne!(a, RequestId::derive(&ctx, 1, 1));
    }

    #[test]
    fn min_deposit_saturates() {
        let pricing = Pricing {
            base_price: u128::MAX / 2,
        };
        assert_eq!(pricing.min_deposit(1000), u128::MAX);

        let pricing = Pricing { base_price: 12 };
        assert_eq!(pricing.min_deposit(200), 2400);
    }
}
