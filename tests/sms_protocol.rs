//! Phone rental protocol against the shared fake provider.

mod common;

use common::*;
use signup_orchestrator::{
    CodeStatus, PollResponse, RentalState, RetryConfig, RetryingSmsProvider, SmsCode, SmsConfig,
    SmsError, SmsVerifier,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn sms_config() -> SmsConfig {
    SmsConfig::builder()
        .api_key("test-key")
        .service("svc")
        .code_timeout(Duration::from_secs(30))
        .poll_interval(Duration::from_secs(3))
        .rent_retry(rent_retry())
        .build()
}

#[tokio::test(start_paused = true)]
async fn test_poll_after_consumption_changes_nothing() {
    let provider = FakeProvider::new();
    let verifier = SmsVerifier::new(provider.clone(), sms_config());

    let mut rental = verifier.rent_number().await.unwrap();
    let code = verifier
        .wait_for_code(&mut rental, &CancellationToken::new())
        .await
        .unwrap();
    verifier.finish(&mut rental).await.unwrap();
    let before = provider.calls();

    for _ in 0..3 {
        assert_eq!(verifier.poll(&mut rental).await.unwrap(), CodeStatus::Closed);
    }
    verifier.release(&mut rental).await.unwrap();
    verifier.finish(&mut rental).await.unwrap();

    assert_eq!(provider.calls(), before);
    assert_eq!(rental.state(), RentalState::Finished);
    assert_eq!(rental.delivered_codes(), &[code]);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_code_is_not_reused() {
    let provider = FakeProvider::new().with_polls(vec![
        Ok(PollResponse::Code(SmsCode::from("111111"))),
        Ok(PollResponse::Code(SmsCode::from("111111"))),
        Ok(PollResponse::Code(SmsCode::from("222222"))),
    ]);
    let verifier = SmsVerifier::new(provider.clone(), sms_config());
    let cancel = CancellationToken::new();

    let mut rental = verifier.rent_number().await.unwrap();
    let first = verifier.wait_for_code(&mut rental, &cancel).await.unwrap();
    let second = verifier.wait_for_code(&mut rental, &cancel).await.unwrap();

    assert_eq!(first.as_str(), "111111");
    assert_eq!(second.as_str(), "222222");
    assert_eq!(provider.calls().poll, 3);

    verifier.release(&mut rental).await.unwrap();
    verifier.release(&mut rental).await.unwrap();
    assert_eq!(provider.calls().cancel, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_the_wait_without_releasing() {
    let provider = FakeProvider::new().with_delivery(Delivery::Never);
    let verifier = SmsVerifier::new(provider.clone(), sms_config());
    let cancel = CancellationToken::new();

    let mut rental = verifier.rent_number().await.unwrap();
    let waiter = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            cancel.cancel();
        }
    };
    let (result, ()) = tokio::join!(verifier.wait_for_code(&mut rental, &cancel), waiter);

    assert!(matches!(result, Err(SmsError::Cancelled { poll_count: 3, .. })));
    assert!(rental.is_active());
    assert_eq!(provider.calls().cancel, 0);

    verifier.release(&mut rental).await.unwrap();
    assert_eq!(provider.calls().cancel, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retrying_provider_absorbs_transient_poll_errors() {
    let provider = FakeProvider::new().with_polls(vec![
        Err(FakeProviderError::transient()),
        Err(FakeProviderError::transient()),
        Ok(PollResponse::Code(SmsCode::from("424242"))),
    ]);
    let retries = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&retries);
    let retrying = RetryingSmsProvider::with_config(
        provider.clone(),
        RetryConfig::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_retries(3),
    )
    .with_on_retry(move |_error, _delay| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let verifier = SmsVerifier::new(retrying, sms_config());

    let mut rental = verifier.rent_number().await.unwrap();
    let code = verifier
        .wait_for_code(&mut rental, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(code.as_str(), "424242");
    assert_eq!(provider.calls().poll, 3);
    assert_eq!(retries.load(Ordering::SeqCst), 2);
}
