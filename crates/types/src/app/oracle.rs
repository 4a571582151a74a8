// Path: crates/types/src/app/oracle.rs

//! Oracle feed records. A feed is a thin overlay over a request context: it
//! holds a non-owning back-reference to the context plus the aggregation rule
//! applied to each completed batch of provider outputs.

use crate::app::service::RequestContextId;
use crate::app::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A named oracle feed, keyed by `feed_name`.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Feed {
    /// The unique feed name.
    pub feed_name: String,
    /// A human-readable description.
    pub description: String,
    /// The account that created the feed. Only the creator may start, pause,
    /// or edit it.
    pub creator: AccountId,
    /// The backing request context, owned by the service-market engine.
    pub request_context_id: RequestContextId,
    /// The aggregation function applied to each batch (`max`, `min`, or `avg`).
    pub aggregate_func: String,
    /// A dotted JSON path extracting the scalar from each provider output.
    pub value_json_path: String,
    /// How many aggregated results to retain, oldest trimmed first.
    pub latest_history: u64,
}

/// One aggregated feed result, keyed by `(feed_name, batch_counter)`.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeedValue {
    /// The aggregated scalar, rendered as a decimal string.
    pub data: String,
    /// The height at which the batch completed.
    pub height: u64,
}
