//! Integration tests for the admission pipeline against real Redis and
//! Kafka instances.
//!
//! # Running These Tests
//!
//! Marked `#[ignore]` because they require Docker (testcontainers). Run
//! explicitly:
//! ```bash
//! cargo test -p flashsale-gateway --test admission_integration -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use flashsale_core::{CorrelationId, OrderRequest};
use flashsale_gateway::{admit, Admission, AppState};
use flashsale_queue::OrderProducer;
use flashsale_runtime::{CircuitBreaker, CircuitBreakerConfig};
use flashsale_store::{FixedWindowLimiter, IdempotencyStore, OrderStatusStore};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers_modules::kafka::{Kafka, KAFKA_PORT};
use testcontainers_modules::redis::{Redis, REDIS_PORT};

async fn redis_fixture() -> (ContainerAsync<Redis>, ConnectionManager) {
    let container = Redis::default()
        .start()
        .await
        .expect("failed to start Redis container");
    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(REDIS_PORT)
        .await
        .expect("failed to get port");
    let conn = flashsale_store::connect(&format!("{host}:{port}"))
        .await
        .expect("failed to connect");
    (container, conn)
}

async fn kafka_fixture() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("failed to start Kafka container");
    let host = kafka.get_host().await.expect("failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("failed to get port");
    (kafka, format!("{host}:{port}"))
}

/// Build gateway state over a live Redis and the given broker address.
///
/// A short producer timeout keeps failure-path tests fast; `max_requests`
/// tunes the limiter per test.
fn app_state(
    redis: ConnectionManager,
    brokers: &str,
    max_requests: u32,
    breaker: CircuitBreakerConfig,
) -> AppState {
    let producer = OrderProducer::builder()
        .brokers(brokers)
        .timeout(Duration::from_millis(500))
        .build()
        .expect("failed to create producer");

    AppState {
        idempotency: IdempotencyStore::new(redis.clone()),
        statuses: OrderStatusStore::new(redis.clone()),
        limiter: FixedWindowLimiter::new(redis.clone(), max_requests, Duration::from_secs(60)),
        redis,
        producer: Arc::new(producer),
        breaker: CircuitBreaker::new(breaker),
        metrics: metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder().handle(),
    }
}

fn order(user_id: &str, request_id: &str) -> OrderRequest {
    OrderRequest {
        user_id: user_id.to_string(),
        item_id: "101".to_string(),
        amount: 1,
        request_id: request_id.to_string(),
    }
}

async fn run(state: &AppState, order: &OrderRequest) -> Admission {
    let correlation_id = CorrelationId::generate();
    admit(state, &correlation_id, order, Instant::now()).await
}

#[tokio::test]
#[ignore] // Requires Docker
async fn duplicate_request_id_is_admitted_once() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;
    let state = app_state(redis, &brokers, 60, CircuitBreakerConfig::default());

    let request = order("u1", &format!("r-{}", uuid::Uuid::new_v4()));

    assert!(matches!(
        run(&state, &request).await,
        Admission::Accepted { .. }
    ));
    assert!(matches!(run(&state, &request).await, Admission::Duplicate));

    // The idempotency key stays held after a committed enqueue.
    assert!(state
        .idempotency
        .is_reserved(&request.request_id)
        .await
        .unwrap());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn concurrent_duplicates_admit_exactly_one() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;
    let state = Arc::new(app_state(redis, &brokers, 60, CircuitBreakerConfig::default()));

    let request = order("u2", &format!("r-{}", uuid::Uuid::new_v4()));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let state = Arc::clone(&state);
        let request = request.clone();
        handles.push(tokio::spawn(async move { run(&state, &request).await }));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Admission::Accepted { .. } => accepted += 1,
            Admission::Duplicate => duplicates += 1,
            other => panic!("unexpected admission outcome: {other:?}"),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 4);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn over_quota_user_is_rate_limited_with_zero_remaining() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;
    let state = app_state(redis, &brokers, 2, CircuitBreakerConfig::default());

    let user = format!("u-{}", uuid::Uuid::new_v4());
    for i in 0..2 {
        let request = order(&user, &format!("r-{}-{i}", uuid::Uuid::new_v4()));
        assert!(matches!(
            run(&state, &request).await,
            Admission::Accepted { .. }
        ));
    }

    let request = order(&user, &format!("r-{}", uuid::Uuid::new_v4()));
    match run(&state, &request).await {
        Admission::RateLimited {
            retry_after,
            remaining,
        } => {
            assert_eq!(retry_after, Duration::from_secs(60));
            assert_eq!(remaining, 0);
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn invalid_order_leaves_no_state_behind() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;
    let state = app_state(redis, &brokers, 60, CircuitBreakerConfig::default());

    let mut request = order("u3", &format!("r-{}", uuid::Uuid::new_v4()));
    request.amount = 0;

    match run(&state, &request).await {
        Admission::Invalid(errors) => {
            assert_eq!(errors[0].field, "amount");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    // Validation precedes the idempotency reservation.
    assert!(!state
        .idempotency
        .is_reserved(&request.request_id)
        .await
        .unwrap());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn broker_outage_opens_breaker_and_rolls_back_reservations() {
    let (_redis_c, redis) = redis_fixture().await;
    // No Kafka container: every publish fails at the producer timeout.
    let breaker_config = CircuitBreakerConfig {
        failure_threshold: 5,
        success_threshold: 2,
        base_timeout: Duration::from_secs(30),
        max_timeout: Duration::from_secs(300),
        reset_interval: Duration::from_secs(60),
    };
    let state = app_state(redis, "127.0.0.1:1", 60, breaker_config);

    // Five consecutive enqueue failures trip the breaker; each rolls back
    // its reservation.
    for i in 0..5 {
        let request = order("u4", &format!("r-fail-{i}-{}", uuid::Uuid::new_v4()));
        assert!(matches!(
            run(&state, &request).await,
            Admission::Unavailable
        ));
        assert!(!state
            .idempotency
            .is_reserved(&request.request_id)
            .await
            .unwrap());
    }
    assert_eq!(state.breaker.state(), flashsale_runtime::State::Open);

    // The sixth request is rejected at the precheck, before any enqueue
    // attempt, and its reservation is rolled back too.
    let request = order("u4", &format!("r-open-{}", uuid::Uuid::new_v4()));
    assert!(matches!(
        run(&state, &request).await,
        Admission::Unavailable
    ));
    assert!(!state
        .idempotency
        .is_reserved(&request.request_id)
        .await
        .unwrap());
}
