// Path: crates/services/src/oracle/mod.rs
//! The oracle-feed overlay.
//!
//! A feed owns a repeating, paused-at-creation request context in the service
//! engine and registers a batch-completion callback that parses each batch's
//! provider outputs as JSON, extracts a scalar along the feed's value path,
//! aggregates, and appends the result to a bounded history. The engine does
//! all the scheduling and settlement; this module never touches fees or
//! provider state directly.

mod aggregate;

use crate::service_market::ServiceModule;
use crate::store::{get_typed, put_typed};
use async_trait::async_trait;
use meridian_api::callback::ResponseCallback;
use meridian_api::guardian::GuardianKeeper;
use meridian_api::services::BlockchainService;
use meridian_api::state::StateAccess;
use meridian_api::transaction::context::TxContext;
use meridian_types::app::oracle::{Feed, FeedValue};
use meridian_types::app::service::{
    ContextState, NewRequestContext, RequestContext, RequestContextId, RequestContextUpdate,
};
use meridian_types::app::AccountId;
use meridian_types::codec;
use meridian_types::error::{OracleError, StateError, TransactionError};
use meridian_types::keys;
use meridian_types::service_configs::{Capabilities, OracleParams};
use parity_scale_codec::{Decode, Encode};
use std::any::Any;
use std::sync::Arc;

/// The module name, used for dispatch routing and context ownership.
pub const MODULE_NAME: &str = "oracle";

/// Parameters for `create_feed@v1`. The creator is the transaction signer and
/// must hold profiler privilege.
#[derive(Encode, Decode, Clone, Debug)]
pub struct CreateFeedParams {
    /// The unique feed name.
    pub feed_name: String,
    /// A human-readable description.
    pub description: String,
    /// The backing service to invoke.
    pub service_name: String,
    /// The ordered candidate provider set.
    pub providers: Vec<AccountId>,
    /// The request input forwarded to every provider.
    pub input: String,
    /// The per-request fee ceiling.
    pub service_fee_cap: u128,
    /// The response timeout in blocks.
    pub timeout: u64,
    /// Blocks between batch starts. Zero defaults to the timeout.
    pub repeated_frequency: u64,
    /// Total batch runs, `-1` for unbounded.
    pub repeated_total: i64,
    /// Minimum responses for batch sufficiency. Zero waits for all.
    pub response_threshold: u32,
    /// The aggregation function (`max`, `min`, or `avg`).
    pub aggregate_func: String,
    /// A dotted JSON path extracting the scalar from each provider output.
    pub value_json_path: String,
    /// How many aggregated results to retain.
    pub latest_history: u64,
}

/// Parameters for `start_feed@v1` and `pause_feed@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct FeedRefParams {
    /// The target feed.
    pub feed_name: String,
}

/// Parameters for `edit_feed@v1`. `None` fields are left unchanged.
#[derive(Encode, Decode, Clone, Debug, Default)]
pub struct EditFeedParams {
    /// The target feed.
    pub feed_name: String,
    /// Replacement candidate provider set.
    pub providers: Option<Vec<AccountId>>,
    /// Replacement fee cap.
    pub service_fee_cap: Option<u128>,
    /// Replacement repeat frequency.
    pub repeated_frequency: Option<u64>,
    /// Replacement remaining-run count.
    pub repeated_total: Option<i64>,
    /// Replacement history bound. Shrinking trims oldest values immediately.
    pub latest_history: Option<u64>,
}

/// The oracle-feed module.
pub struct OracleModule {
    params: OracleParams,
    service: Arc<ServiceModule>,
    guardian: Arc<dyn GuardianKeeper>,
}

impl OracleModule {
    /// Creates the module and registers its batch-completion handler with the
    /// service engine.
    pub fn new(
        params: OracleParams,
        service: Arc<ServiceModule>,
        guardian: Arc<dyn GuardianKeeper>,
    ) -> Self {
        service.register_response_callback(MODULE_NAME, Arc::new(FeedResultHandler));
        Self {
            params,
            service,
            guardian,
        }
    }

    /// Returns a feed, if one exists.
    pub fn get_feed(&self, state: &dyn StateAccess, feed_name: &str) -> Result<Option<Feed>, StateError> {
        get_typed(state, &keys::feed_key(feed_name))
    }

    /// Returns a feed's retained values, oldest batch first.
    pub fn get_feed_values(
        &self,
        state: &dyn StateAccess,
        feed_name: &str,
    ) -> Result<Vec<FeedValue>, StateError> {
        let mut values = Vec::new();
        for item in state.prefix_scan(&keys::feed_value_prefix(feed_name))? {
            let (_, value) = item?;
            values.push(codec::from_bytes_canonical(&value).map_err(StateError::Decode)?);
        }
        Ok(values)
    }

    fn load_feed(&self, state: &dyn StateAccess, feed_name: &str) -> Result<Feed, TransactionError> {
        Ok(self
            .get_feed(state, feed_name)?
            .ok_or_else(|| OracleError::UnknownFeed(feed_name.to_string()))?)
    }

    fn require_creator(&self, ctx: &TxContext, feed: &Feed) -> Result<(), OracleError> {
        if ctx.signer_account_id != feed.creator {
            return Err(OracleError::NotFeedCreator {
                feed: feed.feed_name.clone(),
                signer: ctx.signer_account_id,
            });
        }
        Ok(())
    }

    fn validate_latest_history(&self, latest_history: u64) -> Result<(), OracleError> {
        if latest_history == 0 || latest_history > self.params.max_latest_history {
            return Err(OracleError::InvalidLatestHistory {
                got: latest_history,
                max: self.params.max_latest_history,
            });
        }
        Ok(())
    }

    /// Creates a feed and its backing request context. The context is owned by
    /// this module, created paused, and repeats until the feed is paused or
    /// its run count runs out. Feed creation is profiler-gated.
    pub fn create_feed(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: CreateFeedParams,
    ) -> Result<(), TransactionError> {
        let creator = ctx.signer_account_id;
        if self.guardian.get_profiler(&*state, &creator)?.is_none() {
            return Err(OracleError::NotProfiler(creator).into());
        }
        if params.feed_name.is_empty() {
            return Err(OracleError::InvalidFeed("feed name must not be empty".into()).into());
        }
        if self.get_feed(&*state, &params.feed_name)?.is_some() {
            return Err(OracleError::DuplicateFeed(params.feed_name).into());
        }
        if !aggregate::is_supported(&params.aggregate_func) {
            return Err(OracleError::UnknownAggregateFunc(params.aggregate_func).into());
        }
        if params.value_json_path.is_empty() {
            return Err(
                OracleError::InvalidFeed("value json path must not be empty".into()).into(),
            );
        }
        self.validate_latest_history(params.latest_history)?;

        let spec = NewRequestContext {
            service_name: params.service_name,
            providers: params.providers,
            consumer: creator,
            input: params.input,
            service_fee_cap: params.service_fee_cap,
            timeout: params.timeout,
            repeated: true,
            repeated_frequency: params.repeated_frequency,
            repeated_total: params.repeated_total,
            response_threshold: params.response_threshold,
            module_name: MODULE_NAME.to_string(),
        };
        let context_id =
            self.service
                .create_request_context(state, ctx, spec, ContextState::Paused)?;

        let feed = Feed {
            feed_name: params.feed_name,
            description: params.description,
            creator,
            request_context_id: context_id,
            aggregate_func: params.aggregate_func,
            value_json_path: params.value_json_path,
            latest_history: params.latest_history,
        };
        put_typed(state, &keys::feed_key(&feed.feed_name), &feed)?;
        state.insert(
            &keys::feed_by_context_key(&context_id),
            feed.feed_name.as_bytes(),
        )?;
        log::info!(
            "feed '{}' created by {} over context {}",
            feed.feed_name,
            creator,
            context_id
        );
        Ok(())
    }

    /// Resumes a feed's backing context. Creator only.
    pub fn start_feed(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        feed_name: &str,
    ) -> Result<(), TransactionError> {
        let feed = self.load_feed(&*state, feed_name)?;
        self.require_creator(ctx, &feed)?;
        self.service
            .start_request_context(state, &ctx.as_internal(), &feed.request_context_id)?;
        log::info!("feed '{}' started", feed_name);
        Ok(())
    }

    /// Pauses a feed's backing context. Creator only.
    pub fn pause_feed(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        feed_name: &str,
    ) -> Result<(), TransactionError> {
        let feed = self.load_feed(&*state, feed_name)?;
        self.require_creator(ctx, &feed)?;
        self.service
            .pause_request_context(state, &ctx.as_internal(), &feed.request_context_id)?;
        log::info!("feed '{}' paused", feed_name);
        Ok(())
    }

    /// Edits a feed's schedule, provider set, and history bound. Creator only;
    /// engine-side fields apply between batches like any context update.
    pub fn edit_feed(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: EditFeedParams,
    ) -> Result<(), TransactionError> {
        let mut feed = self.load_feed(&*state, &params.feed_name)?;
        self.require_creator(ctx, &feed)?;

        let update = RequestContextUpdate {
            providers: params.providers,
            service_fee_cap: params.service_fee_cap,
            repeated_frequency: params.repeated_frequency,
            repeated_total: params.repeated_total,
        };
        if update.providers.is_some()
            || update.service_fee_cap.is_some()
            || update.repeated_frequency.is_some()
            || update.repeated_total.is_some()
        {
            self.service.update_request_context(
                state,
                &ctx.as_internal(),
                &feed.request_context_id,
                update,
            )?;
        }

        if let Some(latest_history) = params.latest_history {
            self.validate_latest_history(latest_history)?;
            feed.latest_history = latest_history;
            trim_feed_values(state, &feed.feed_name, latest_history)?;
            put_typed(state, &keys::feed_key(&feed.feed_name), &feed)?;
        }
        log::info!("feed '{}' edited", params.feed_name);
        Ok(())
    }
}

impl std::fmt::Debug for OracleModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleModule")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BlockchainService for OracleModule {
    fn id(&self) -> &str {
        MODULE_NAME
    }

    fn abi_version(&self) -> u32 {
        1
    }

    fn state_schema(&self) -> &str {
        "v1"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn handle_service_call(
        &self,
        state: &mut dyn StateAccess,
        method: &str,
        params: &[u8],
        ctx: &mut TxContext,
    ) -> Result<(), TransactionError> {
        match method {
            "create_feed@v1" => {
                let p: CreateFeedParams = codec::from_bytes_canonical(params)?;
                self.create_feed(state, ctx, p)
            }
            "start_feed@v1" => {
                let p: FeedRefParams = codec::from_bytes_canonical(params)?;
                self.start_feed(state, ctx, &p.feed_name)
            }
            "pause_feed@v1" => {
                let p: FeedRefParams = codec::from_bytes_canonical(params)?;
                self.pause_feed(state, ctx, &p.feed_name)
            }
            "edit_feed@v1" => {
                let p: EditFeedParams = codec::from_bytes_canonical(params)?;
                self.edit_feed(state, ctx, p)
            }
            _ => Err(TransactionError::Unsupported(format!(
                "Service '{}' has no method '{}'",
                self.id(),
                method
            ))),
        }
    }
}

/// The batch-completion handler registered with the service engine.
///
/// Stateless: everything it needs is keyed off the completed context.
struct FeedResultHandler;

impl ResponseCallback for FeedResultHandler {
    fn on_batch_complete(
        &self,
        state: &mut dyn StateAccess,
        block_height: u64,
        context_id: RequestContextId,
        outputs: &[String],
    ) -> Result<(), TransactionError> {
        let feed_name = state
            .get(&keys::feed_by_context_key(&context_id))?
            .ok_or_else(|| {
                StateError::Apply(format!("no feed owns request context {}", context_id))
            })?;
        let feed_name = String::from_utf8(feed_name)
            .map_err(|_| StateError::Decode("feed back-index entry is not utf-8".into()))?;
        let feed: Feed = get_typed(&*state, &keys::feed_key(&feed_name))?.ok_or_else(|| {
            StateError::Apply(format!("feed '{}' missing behind its back index", feed_name))
        })?;
        let context: RequestContext =
            get_typed(&*state, &keys::request_context_key(&context_id))?.ok_or_else(|| {
                StateError::Apply(format!("callback for missing context {}", context_id))
            })?;

        let values: Vec<f64> = outputs
            .iter()
            .filter(|output| !output.is_empty())
            .filter_map(|output| extract_value(output, &feed.value_json_path))
            .collect();
        if values.is_empty() {
            log::warn!(
                "feed '{}': batch {} produced no parseable values",
                feed_name,
                context.batch_counter
            );
            return Ok(());
        }
        let Some(result) = aggregate::apply(&feed.aggregate_func, &values) else {
            log::warn!(
                "feed '{}': aggregate function '{}' rejected the batch",
                feed_name,
                feed.aggregate_func
            );
            return Ok(());
        };

        let value = FeedValue {
            data: format!("{}", result),
            height: block_height,
        };
        put_typed(
            state,
            &keys::feed_value_key(&feed_name, context.batch_counter),
            &value,
        )?;
        trim_feed_values(state, &feed_name, feed.latest_history)?;
        log::info!(
            "feed '{}': batch {} aggregated {} values to {}",
            feed_name,
            context.batch_counter,
            values.len(),
            value.data
        );
        Ok(())
    }
}

/// Parses one provider output as JSON and pulls a scalar out along a dotted
/// path. Numeric JSON strings are accepted, since upstream APIs commonly quote
/// their numbers.
fn extract_value(output: &str, path: &str) -> Option<f64> {
    let parsed: serde_json::Value = serde_json::from_str(output).ok()?;
    let mut current = &parsed;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Deletes a feed's oldest stored values until at most `keep` remain.
fn trim_feed_values(
    state: &mut dyn StateAccess,
    feed_name: &str,
    keep: u64,
) -> Result<(), StateError> {
    let value_keys: Vec<Vec<u8>> = {
        let mut out = Vec::new();
        for item in state.prefix_scan(&keys::feed_value_prefix(feed_name))? {
            let (key, _) = item?;
            out.push(key.to_vec());
        }
        out
    };
    let excess = value_keys.len().saturating_sub(keep as usize);
    for key in value_keys.into_iter().take(excess) {
        state.delete(&key)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_value_walks_objects_arrays_and_quoted_numbers() {
        let output = r#"{"data":{"prices":[{"usd":"42750.5"}]},"ok":true}"#;
        assert_eq!(extract_value(output, "data.prices.0.usd"), Some(42750.5));

        let output = r#"{"price":101.25}"#;
        assert_eq!(extract_value(output, "price"), Some(101.25));
        assert_eq!(extract_value(output, "missing"), None);
        assert_eq!(extract_value("not json", "price"), None);
        assert_eq!(extract_value(r#"{"price":true}"#, "price"), None);
    }
}
