// Path: crates/services/tests/lifecycle.rs
//! Request-context lifecycle: batch building, responses, expirations,
//! repetition, and teardown.

mod common;

use common::{TestEnv, SERVICE};
use meridian_api::bank::BankKeeper;
use meridian_api::services::BlockchainService;
use meridian_services::guardian::AddProfilerParams;
use meridian_services::service_market::{BindServiceParams, RespondParams};
use meridian_types::app::service::{
    BatchState, ContextState, NewRequestContext, Pricing, RequestContextUpdate, RequestId,
    ResponseBody,
};
use meridian_types::codec;
use meridian_types::error::{ServiceError, TransactionError};
use meridian_test_utils::fixtures::{account_id, tx_context};

#[test]
fn call_builds_the_first_batch_at_message_time() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);

    let params = env.call_params(vec![a, b], 0);
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();

    let context = env.context(&id);
    assert_eq!(context.state, ContextState::Running);
    assert_eq!(context.batch_state, BatchState::BatchRunning);
    assert_eq!(context.batch_counter, 1);
    assert_eq!(context.batch_request_count, 2);
    assert_eq!(context.batch_start_height, 5);

    // Charge per provider is min(cap 20, price 10) = 10.
    assert_eq!(env.bank.balance_of(&env.state, &consumer).unwrap(), 980);
    // Escrow holds both deposits (2 x 2000) plus the batch fees.
    assert_eq!(
        env.bank.module_balance(&env.state, "service").unwrap(),
        4_020
    );

    let request = env
        .service
        .get_active_request(&env.state, &RequestId::derive(&id, 1, 0))
        .unwrap()
        .unwrap();
    assert_eq!(request.provider, a);
    assert_eq!(request.service_fee, 10);
    assert_eq!(request.expiration_height, 15);
}

#[tokio::test]
async fn answering_pays_even_for_error_bodies() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let params = env.call_params(vec![a, b], 0);
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();

    // First answer arrives through dispatch, like a real transaction.
    let params = codec::to_bytes_canonical(&RespondParams {
        request_id: RequestId::derive(&id, 1, 0),
        body: ResponseBody::Output(r#"{"price":10.5}"#.to_string()),
    })
    .unwrap();
    env.service
        .handle_service_call(
            &mut env.state,
            "respond@v1",
            &params,
            &mut tx_context(6, a),
        )
        .await
        .unwrap();
    assert_eq!(
        env.context(&id).batch_state,
        BatchState::BatchRunning,
        "threshold 0 waits for every provider"
    );

    env.service
        .handle_response(
            &mut env.state,
            &tx_context(7, b),
            &RequestId::derive(&id, 1, 1),
            ResponseBody::Error("upstream unreachable".to_string()),
        )
        .unwrap();

    let context = env.context(&id);
    assert_eq!(context.batch_state, BatchState::BatchCompleted);
    assert_eq!(context.batch_response_count, 2);
    assert_eq!(context.state, ContextState::Completed);

    // An error body is still an answer; both providers earn their fee.
    assert_eq!(env.service.get_fees(&env.state, &a).unwrap().incoming, 10);
    assert_eq!(env.service.get_fees(&env.state, &b).unwrap().incoming, 10);
    env.service
        .withdraw_fees(&mut env.state, &tx_context(8, a))
        .unwrap();
    assert_eq!(env.bank.balance_of(&env.state, &a).unwrap(), 10);
    assert_eq!(env.service.get_fees(&env.state, &a).unwrap().incoming, 0);

    let response = env
        .service
        .get_response(&env.state, &id, 1, &b)
        .unwrap()
        .unwrap();
    assert_eq!(
        response.body,
        ResponseBody::Error("upstream unreachable".to_string())
    );
}

#[tokio::test]
async fn expiry_returns_the_fee_and_penalizes_the_provider() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let params = env.call_params(vec![a, b], 1);
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();

    env.service
        .handle_response(
            &mut env.state,
            &tx_context(6, a),
            &RequestId::derive(&id, 1, 0),
            ResponseBody::Output(r#"{"price":10.5}"#.to_string()),
        )
        .unwrap();
    // Threshold already met; the silent provider keeps the batch open until
    // its request expires at height 15.
    assert_eq!(env.context(&id).batch_state, BatchState::BatchRunning);

    env.tick(15).await;
    let context = env.context(&id);
    assert_eq!(context.batch_state, BatchState::BatchCompleted);
    assert_eq!(context.state, ContextState::Completed);
    // The expiry does not count once the threshold is satisfied.
    assert_eq!(context.batch_response_count, 1);

    // The consumer gets the unanswered request's fee back.
    assert_eq!(
        env.service.get_fees(&env.state, &consumer).unwrap().returned,
        10
    );
    env.service
        .refund_fees(&mut env.state, &tx_context(16, consumer))
        .unwrap();
    assert_eq!(env.bank.balance_of(&env.state, &consumer).unwrap(), 990);

    // 1% of the 2000 deposit is burned, which also drops the deposit below
    // its minimum and disables the binding.
    let binding = env.service.get_binding(&env.state, SERVICE, &b).unwrap().unwrap();
    assert_eq!(binding.missed_count, 1);
    assert_eq!(binding.deposit, 1_980);
    assert!(!binding.available);
    assert_eq!(binding.disabled_at, 15);

    // Conservation: 5000 minted, 20 burned by the slash.
    let total = env.bank.balance_of(&env.state, &consumer).unwrap()
        + env.bank.balance_of(&env.state, &a).unwrap()
        + env.bank.balance_of(&env.state, &b).unwrap()
        + env.bank.module_balance(&env.state, "service").unwrap();
    assert_eq!(total, 4_980);
}

#[tokio::test]
async fn repeated_misses_disable_a_binding_whose_deposit_still_clears_the_minimum() {
    let mut env = TestEnv::new();
    let consumer = account_id(3);
    let silent = account_id(2);
    env.define(account_id(9), SERVICE);
    env.bank.mint(&mut env.state, &consumer, 1_000).unwrap();
    // Pad the deposit well past the 2000 minimum so slashing alone cannot
    // sink it below; only the miss counter can disable this binding.
    env.bank.mint(&mut env.state, &silent, 3_000).unwrap();
    env.service
        .bind_service(
            &mut env.state,
            &tx_context(1, silent),
            BindServiceParams {
                service_name: SERVICE.to_string(),
                deposit: 3_000,
                pricing: Pricing { base_price: 10 },
            },
        )
        .unwrap();

    // Three one-shot calls, each left unanswered until its timeout.
    for (call_height, expiry_height) in [(5, 15), (16, 26), (27, 37)] {
        let params = env.call_params(vec![silent], 0);
        env.service
            .call_service(&mut env.state, &tx_context(call_height, consumer), params)
            .unwrap();
        env.tick(expiry_height).await;
    }

    let binding = env
        .service
        .get_binding(&env.state, SERVICE, &silent)
        .unwrap()
        .unwrap();
    assert_eq!(binding.missed_count, 3);
    // 1% of the running deposit burned per miss: 30, 29, 29.
    assert_eq!(binding.deposit, 2_912);
    assert!(binding.deposit >= 2_000, "deposit alone would not disable");
    assert!(!binding.available);
    assert_eq!(binding.disabled_at, 37);
}

#[tokio::test]
async fn threshold_zero_counts_every_expiry() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let params = env.call_params(vec![a, b], 0);
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();

    env.tick(15).await;
    let context = env.context(&id);
    assert_eq!(context.batch_state, BatchState::BatchCompleted);
    assert_eq!(context.batch_response_count, 2);
    assert_eq!(
        env.service.get_fees(&env.state, &consumer).unwrap().returned,
        20
    );
}

#[test]
fn responding_twice_or_as_the_wrong_account_fails() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let params = env.call_params(vec![a, b], 0);
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();
    let request_id = RequestId::derive(&id, 1, 0);

    let err = env
        .service
        .handle_response(
            &mut env.state,
            &tx_context(6, b),
            &request_id,
            ResponseBody::Output("{}".to_string()),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Service(ServiceError::Unauthorized(_))
    ));

    env.service
        .handle_response(
            &mut env.state,
            &tx_context(6, a),
            &request_id,
            ResponseBody::Output("{}".to_string()),
        )
        .unwrap();
    let err = env
        .service
        .handle_response(
            &mut env.state,
            &tx_context(7, a),
            &request_id,
            ResponseBody::Output("{}".to_string()),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Service(ServiceError::UnknownRequest(_))
    ));
}

#[test]
fn too_few_eligible_providers_fail_stops_the_context() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    env.service
        .disable_binding(&mut env.state, &tx_context(2, a), SERVICE)
        .unwrap();
    env.service
        .disable_binding(&mut env.state, &tx_context(2, b), SERVICE)
        .unwrap();

    // Not a transaction error: the context is created and fail-stops.
    let params = env.call_params(vec![a, b], 0);
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();
    let context = env.context(&id);
    assert_eq!(context.state, ContextState::Completed);
    assert_eq!(context.batch_counter, 0);
    assert_eq!(env.bank.balance_of(&env.state, &consumer).unwrap(), 1_000);
}

#[tokio::test]
async fn repeated_contexts_reschedule_until_the_run_count_is_spent() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let mut params = env.call_params(vec![a, b], 0);
    params.repeated = true;
    params.repeated_frequency = 20;
    params.repeated_total = 2;
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();

    for provider_index in 0..2u32 {
        env.service
            .handle_response(
                &mut env.state,
                &tx_context(6, account_id(1 + provider_index as u8)),
                &RequestId::derive(&id, 1, provider_index),
                ResponseBody::Output("{}".to_string()),
            )
            .unwrap();
    }
    let context = env.context(&id);
    assert_eq!(context.state, ContextState::Running);
    assert_eq!(context.repeated_total, 1);
    // Next run is anchored to the batch start, not the finalize height.
    assert_eq!(context.next_batch_height, 25);

    env.tick(24).await;
    assert_eq!(env.context(&id).batch_counter, 1);
    env.tick(25).await;
    let context = env.context(&id);
    assert_eq!(context.batch_counter, 2);
    assert_eq!(context.batch_start_height, 25);

    for provider_index in 0..2u32 {
        env.service
            .handle_response(
                &mut env.state,
                &tx_context(26, account_id(1 + provider_index as u8)),
                &RequestId::derive(&id, 2, provider_index),
                ResponseBody::Output("{}".to_string()),
            )
            .unwrap();
    }
    let context = env.context(&id);
    assert_eq!(context.repeated_total, 0);
    assert_eq!(context.state, ContextState::Completed);
    // Two batches, 20 each.
    assert_eq!(env.bank.balance_of(&env.state, &consumer).unwrap(), 960);
}

#[tokio::test]
async fn an_extreme_repeat_frequency_defers_the_next_run_without_wrapping() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let mut params = env.call_params(vec![a, b], 0);
    params.repeated = true;
    params.repeated_frequency = u64::MAX;
    params.repeated_total = -1;
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();

    // Finalizing the batch reschedules at start + frequency, which must
    // clamp at the maximum height instead of wrapping into the past.
    for provider_index in 0..2u32 {
        env.service
            .handle_response(
                &mut env.state,
                &tx_context(6, account_id(1 + provider_index as u8)),
                &RequestId::derive(&id, 1, provider_index),
                ResponseBody::Output("{}".to_string()),
            )
            .unwrap();
    }
    let context = env.context(&id);
    assert_eq!(context.state, ContextState::Running);
    assert_eq!(context.next_batch_height, u64::MAX);

    // No hot re-issue loop: later ticks leave the single batch in place.
    env.tick(1_000).await;
    assert_eq!(env.context(&id).batch_counter, 1);
    assert_eq!(env.bank.balance_of(&env.state, &consumer).unwrap(), 980);
}

#[tokio::test]
async fn pausing_discards_the_scheduled_batch_and_resuming_reschedules() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let mut params = env.call_params(vec![a, b], 0);
    params.repeated = true;
    params.repeated_frequency = 20;
    params.repeated_total = -1;
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();
    for provider_index in 0..2u32 {
        env.service
            .handle_response(
                &mut env.state,
                &tx_context(6, account_id(1 + provider_index as u8)),
                &RequestId::derive(&id, 1, provider_index),
                ResponseBody::Output("{}".to_string()),
            )
            .unwrap();
    }
    assert_eq!(env.context(&id).next_batch_height, 25);

    env.service
        .pause_request_context(&mut env.state, &tx_context(10, consumer), &id)
        .unwrap();
    env.tick(25).await;
    assert_eq!(env.context(&id).batch_counter, 1, "stale entry skipped");

    env.service
        .start_request_context(&mut env.state, &tx_context(30, consumer), &id)
        .unwrap();
    assert_eq!(env.context(&id).next_batch_height, 30);
    env.tick(30).await;
    let context = env.context(&id);
    assert_eq!(context.batch_counter, 2);
    assert_eq!(context.batch_start_height, 30);
}

#[test]
fn kill_withdraws_outstanding_requests_and_refunds_their_fees() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let params = env.call_params(vec![a, b], 0);
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();

    env.service
        .kill_request_context(&mut env.state, &tx_context(6, consumer), &id)
        .unwrap();
    let context = env.context(&id);
    assert_eq!(context.state, ContextState::Completed);
    assert_eq!(
        env.service.get_fees(&env.state, &consumer).unwrap().returned,
        20
    );

    let err = env
        .service
        .handle_response(
            &mut env.state,
            &tx_context(7, a),
            &RequestId::derive(&id, 1, 0),
            ResponseBody::Output("{}".to_string()),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Service(ServiceError::UnknownRequest(_))
    ));

    // Terminal: no further lifecycle transitions.
    let err = env
        .service
        .kill_request_context(&mut env.state, &tx_context(8, consumer), &id)
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Service(ServiceError::InvalidContextState { .. })
    ));
}

#[tokio::test]
async fn an_unfunded_consumer_pauses_the_context_at_the_tick() {
    let mut env = TestEnv::new();
    // Exactly one batch of fees.
    let (consumer, a, b) = env.standard_market(20);
    let mut params = env.call_params(vec![a, b], 0);
    params.repeated = true;
    params.repeated_frequency = 20;
    params.repeated_total = -1;
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();
    for provider_index in 0..2u32 {
        env.service
            .handle_response(
                &mut env.state,
                &tx_context(6, account_id(1 + provider_index as u8)),
                &RequestId::derive(&id, 1, provider_index),
                ResponseBody::Output("{}".to_string()),
            )
            .unwrap();
    }

    env.tick(25).await;
    let context = env.context(&id);
    assert_eq!(context.state, ContextState::Paused);
    assert_eq!(context.batch_counter, 1);
}

#[test]
fn profiler_consumers_are_fee_exempt() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    // First profiler on an empty registry bootstraps itself.
    env.guardian
        .add_profiler(
            &mut env.state,
            &tx_context(2, consumer),
            AddProfilerParams {
                address: consumer,
                description: "data team".to_string(),
            },
        )
        .unwrap();

    let params = env.call_params(vec![a, b], 0);
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();
    let context = env.context(&id);
    assert!(context.super_mode);
    assert_eq!(env.bank.balance_of(&env.state, &consumer).unwrap(), 1_000);
    let request = env
        .service
        .get_active_request(&env.state, &RequestId::derive(&id, 1, 0))
        .unwrap()
        .unwrap();
    assert_eq!(request.service_fee, 0);
}

#[test]
fn only_the_consumer_may_drive_a_context() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let mut params = env.call_params(vec![a, b], 0);
    params.repeated = true;
    params.repeated_frequency = 20;
    params.repeated_total = -1;
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();

    let err = env
        .service
        .pause_request_context(&mut env.state, &tx_context(6, a), &id)
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Service(ServiceError::Unauthorized(_))
    ));

    let err = env
        .service
        .update_request_context(
            &mut env.state,
            &tx_context(6, consumer),
            &id,
            RequestContextUpdate {
                service_fee_cap: Some(5),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Service(ServiceError::BatchInFlight)
    ));
}

#[tokio::test]
async fn updates_apply_from_the_next_batch() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let mut params = env.call_params(vec![a, b], 0);
    params.repeated = true;
    params.repeated_frequency = 20;
    params.repeated_total = -1;
    let id = env
        .service
        .call_service(&mut env.state, &tx_context(5, consumer), params)
        .unwrap();
    for provider_index in 0..2u32 {
        env.service
            .handle_response(
                &mut env.state,
                &tx_context(6, account_id(1 + provider_index as u8)),
                &RequestId::derive(&id, 1, provider_index),
                ResponseBody::Output("{}".to_string()),
            )
            .unwrap();
    }

    env.service
        .update_request_context(
            &mut env.state,
            &tx_context(7, consumer),
            &id,
            RequestContextUpdate {
                service_fee_cap: Some(5),
                ..Default::default()
            },
        )
        .unwrap();

    env.tick(25).await;
    // Batch 2 charges min(cap 5, price 10) = 5 per provider.
    let request = env
        .service
        .get_active_request(&env.state, &RequestId::derive(&id, 2, 0))
        .unwrap()
        .unwrap();
    assert_eq!(request.service_fee, 5);
    // 20 for batch 1, 10 for batch 2.
    assert_eq!(env.bank.balance_of(&env.state, &consumer).unwrap(), 970);
}

#[test]
fn one_shot_contexts_reject_updates() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    // Created paused so no batch is in flight; the rejection is about the
    // context being one-shot, not about batch timing.
    let id = env
        .service
        .create_request_context(
            &mut env.state,
            &tx_context(5, consumer),
            NewRequestContext {
                service_name: SERVICE.to_string(),
                providers: vec![a, b],
                consumer,
                input: r#"{"pair":"atom-usd"}"#.to_string(),
                service_fee_cap: 20,
                timeout: 10,
                repeated: false,
                repeated_frequency: 0,
                repeated_total: 0,
                response_threshold: 0,
                module_name: String::new(),
            },
            ContextState::Paused,
        )
        .unwrap();

    let err = env
        .service
        .update_request_context(
            &mut env.state,
            &tx_context(6, consumer),
            &id,
            RequestContextUpdate {
                service_fee_cap: Some(5),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Service(ServiceError::InvalidRequestInput(_))
    ));
    assert_eq!(env.context(&id).service_fee_cap, 20);
}

#[test]
fn withdrawing_with_nothing_accrued_is_a_no_op() {
    let mut env = TestEnv::new();
    let stranger = account_id(8);
    env.service
        .withdraw_fees(&mut env.state, &tx_context(1, stranger))
        .unwrap();
    env.service
        .refund_fees(&mut env.state, &tx_context(1, stranger))
        .unwrap();
    assert_eq!(env.bank.balance_of(&env.state, &stranger).unwrap(), 0);
}

#[test]
fn creation_validates_every_field() {
    let mut env = TestEnv::new();
    let (consumer, a, b) = env.standard_market(1_000);
    let ctx = tx_context(5, consumer);

    let cases: Vec<Box<dyn Fn(&mut meridian_services::service_market::CallServiceParams)>> = vec![
        Box::new(|p| p.timeout = 0),
        Box::new(|p| p.timeout = 101), // max_request_timeout defaults to 100
        Box::new(|p| p.input = String::new()),
        Box::new(|p| p.providers = vec![]),
        Box::new(|p| p.response_threshold = 3),
        Box::new(|p| {
            p.repeated = true;
            p.repeated_frequency = 5; // below the timeout
            p.repeated_total = -1;
        }),
        Box::new(|p| {
            p.repeated = true;
            p.repeated_total = 0;
        }),
        Box::new(|p| {
            p.repeated = true;
            p.repeated_total = -2;
        }),
    ];
    for mutate in cases {
        let mut params = env.call_params(vec![a, b], 0);
        mutate(&mut params);
        let err = env
            .service
            .call_service(&mut env.state, &ctx, params)
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionError::Service(ServiceError::InvalidRequestInput(_))
        ));
    }

    let mut params = env.call_params(vec![a, b], 0);
    params.providers = vec![a, a];
    let err = env
        .service
        .call_service(&mut env.state, &ctx, params)
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Service(ServiceError::InvalidRequestInput(_))
    ));
}
