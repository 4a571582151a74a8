// Path: crates/services/tests/common/mod.rs
//! Shared harness wiring the service, oracle, and guardian modules over an
//! in-memory state store and bank.
#![allow(dead_code)] // not every test binary uses every helper

use meridian_api::lifecycle::OnEndBlock;
use meridian_services::guardian::GuardianModule;
use meridian_services::oracle::OracleModule;
use meridian_services::service_market::{
    BindServiceParams, CallServiceParams, DefineServiceParams, ServiceModule,
};
use meridian_test_utils::fixtures::{account_id, end_block_context, tx_context};
use meridian_test_utils::{MemState, StateBank};
use meridian_types::app::service::{Pricing, RequestContextId};
use meridian_types::app::AccountId;
use meridian_types::service_configs::{OracleParams, ServiceParams};
use std::sync::Arc;

pub const SERVICE: &str = "price-data";

pub struct TestEnv {
    pub state: MemState,
    pub bank: Arc<StateBank>,
    pub guardian: Arc<GuardianModule>,
    pub service: Arc<ServiceModule>,
    pub oracle: OracleModule,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_params(ServiceParams::default())
    }

    pub fn with_params(params: ServiceParams) -> Self {
        let bank = Arc::new(StateBank::new());
        let guardian = Arc::new(GuardianModule::new());
        let service = Arc::new(ServiceModule::new(params, bank.clone(), guardian.clone()));
        let oracle = OracleModule::new(OracleParams::default(), service.clone(), guardian.clone());
        Self {
            state: MemState::new(),
            bank,
            guardian,
            service,
            oracle,
        }
    }

    /// Runs the end-of-block hook for `height`.
    pub async fn tick(&mut self, height: u64) {
        let ctx = end_block_context(height);
        self.service
            .on_end_block(&mut self.state, &ctx)
            .await
            .unwrap();
    }

    pub fn define(&mut self, author: AccountId, name: &str) {
        self.service
            .define_service(
                &mut self.state,
                &tx_context(1, author),
                DefineServiceParams {
                    name: name.to_string(),
                    description: "spot prices".to_string(),
                    tags: vec!["prices".to_string()],
                    schemas: "{}".to_string(),
                },
            )
            .unwrap();
    }

    /// Mints the deposit and binds `provider` to `name` at the given price.
    /// The deposit is the configured minimum for that price.
    pub fn bind(&mut self, provider: AccountId, name: &str, base_price: u128) -> u128 {
        let pricing = Pricing { base_price };
        let deposit = pricing.min_deposit(self.service.params().min_deposit_multiple);
        self.bank.mint(&mut self.state, &provider, deposit).unwrap();
        self.service
            .bind_service(
                &mut self.state,
                &tx_context(1, provider),
                BindServiceParams {
                    service_name: name.to_string(),
                    deposit,
                    pricing,
                },
            )
            .unwrap();
        deposit
    }

    /// A non-repeating call against [`SERVICE`] with sensible defaults.
    pub fn call_params(&self, providers: Vec<AccountId>, threshold: u32) -> CallServiceParams {
        CallServiceParams {
            service_name: SERVICE.to_string(),
            providers,
            input: r#"{"pair":"atom-usd"}"#.to_string(),
            service_fee_cap: 20,
            timeout: 10,
            repeated: false,
            repeated_frequency: 0,
            repeated_total: 0,
            response_threshold: threshold,
        }
    }

    /// Defines [`SERVICE`], binds two providers at price 10, and funds the
    /// consumer. Returns (consumer, provider_a, provider_b).
    pub fn standard_market(&mut self, consumer_funds: u128) -> (AccountId, AccountId, AccountId) {
        let author = account_id(9);
        let provider_a = account_id(1);
        let provider_b = account_id(2);
        let consumer = account_id(3);
        self.define(author, SERVICE);
        self.bind(provider_a, SERVICE, 10);
        self.bind(provider_b, SERVICE, 10);
        self.bank
            .mint(&mut self.state, &consumer, consumer_funds)
            .unwrap();
        (consumer, provider_a, provider_b)
    }

    pub fn context(&self, id: &RequestContextId) -> meridian_types::app::service::RequestContext {
        self.service
            .get_request_context(&self.state, id)
            .unwrap()
            .unwrap()
    }
}
