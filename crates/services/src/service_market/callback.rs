// Path: crates/services/src/service_market/callback.rs
//! Batch-completion dispatch to owning modules.

use super::ServiceModule;
use meridian_api::callback::ResponseCallback;
use meridian_api::state::StateAccess;
use meridian_types::app::service::{RequestContext, RequestContextId, Response, ResponseBody};
use meridian_types::codec;
use meridian_types::error::StateError;
use meridian_types::keys;
use std::sync::Arc;

impl ServiceModule {
    /// Registers the batch-completion handler for a module name.
    ///
    /// Called once per owning module at process start; registering again for
    /// the same name overwrites the previous handler.
    pub fn register_response_callback(
        &self,
        module_name: &str,
        handler: Arc<dyn ResponseCallback>,
    ) {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if callbacks
            .insert(module_name.to_string(), handler)
            .is_some()
        {
            log::debug!("response callback for module '{}' replaced", module_name);
        }
    }

    /// Invokes the owning module's handler with the completed batch's
    /// payloads, ordered by provider key. Error responses contribute empty
    /// strings; expired requests contribute nothing.
    ///
    /// Handler failures are logged and swallowed: the batch transition has
    /// already happened and must not be rolled back by the overlay module.
    pub(crate) fn dispatch_callback(
        &self,
        state: &mut dyn StateAccess,
        context_id: &RequestContextId,
        context: &RequestContext,
        height: u64,
    ) -> Result<(), StateError> {
        let outputs: Vec<String> = {
            let prefix = keys::response_prefix(context_id, context.batch_counter);
            let mut out = Vec::new();
            for item in state.prefix_scan(&prefix)? {
                let (_, value) = item?;
                let response: Response =
                    codec::from_bytes_canonical(&value).map_err(StateError::Decode)?;
                out.push(match response.body {
                    ResponseBody::Output(output) => output,
                    ResponseBody::Error(_) => String::new(),
                });
            }
            out
        };

        let handler = {
            let callbacks = self
                .callbacks
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            callbacks.get(&context.module_name).cloned()
        };
        match handler {
            Some(handler) => {
                if let Err(e) = handler.on_batch_complete(state, height, *context_id, &outputs) {
                    log::warn!(
                        "response callback of module '{}' failed for context {} batch {}: {}",
                        context.module_name,
                        context_id,
                        context.batch_counter,
                        e
                    );
                }
            }
            None => {
                log::warn!(
                    "no response callback registered for module '{}' (context {})",
                    context.module_name,
                    context_id
                );
            }
        }
        Ok(())
    }
}
