//! Integration tests for the fulfillment saga against real Redis and Kafka
//! instances.
//!
//! # Running These Tests
//!
//! Marked `#[ignore]` because they require Docker (testcontainers). Run
//! explicitly:
//! ```bash
//! cargo test -p flashsale-worker --test processor_integration -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use flashsale_core::{OrderRequest, OrderStatus};
use flashsale_queue::{DeadLetterPublisher, OrderMessage};
use flashsale_runtime::DlqStats;
use flashsale_store::{InventoryStore, OrderStatusStore};
use flashsale_worker::{
    OrderProcessor, ProcessOutcome, SettlementError, SettlementGateway,
};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};
use rdkafka::ClientConfig;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers_modules::kafka::{Kafka, KAFKA_PORT};
use testcontainers_modules::redis::{Redis, REDIS_PORT};

/// Settlement that always succeeds: forces the completed branch.
struct AlwaysSettle;

impl SettlementGateway for AlwaysSettle {
    fn charge(&self, _order: &OrderRequest) -> Result<(), SettlementError> {
        Ok(())
    }
}

/// Settlement that always fails: forces the compensation branch.
struct NeverSettle;

impl SettlementGateway for NeverSettle {
    fn charge(&self, _order: &OrderRequest) -> Result<(), SettlementError> {
        Err(SettlementError::Timeout)
    }
}

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

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

fn processor<S: SettlementGateway>(
    redis: ConnectionManager,
    brokers: &str,
    dlq_topic: &str,
    settlement: S,
) -> OrderProcessor<S> {
    OrderProcessor::new(
        InventoryStore::new(redis.clone()),
        OrderStatusStore::new(redis),
        DeadLetterPublisher::with_topic(brokers, dlq_topic).expect("failed to create DLQ"),
        Arc::new(DlqStats::new()),
        settlement,
    )
}

fn message_for(order: &OrderRequest) -> OrderMessage {
    OrderMessage {
        payload: serde_json::to_vec(order).unwrap(),
        correlation_id: Some(unique("cid")),
        request_id: Some(order.request_id.clone()),
        partition: 0,
        offset: 0,
    }
}

fn dlq_consumer(brokers: &str, topic: &str) -> StreamConsumer {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", unique("group"))
        .set("auto.offset.reset", "earliest")
        .create()
        .unwrap();
    consumer.subscribe(&[topic]).unwrap();
    consumer
}

async fn dlq_reason(consumer: &StreamConsumer) -> String {
    let message = tokio::time::timeout(Duration::from_secs(15), consumer.recv())
        .await
        .expect("timed out waiting for dead letter")
        .unwrap();
    let headers = message.headers().expect("dead letter must have headers");
    for header in headers.iter() {
        if header.key == "error" {
            return String::from_utf8(header.value.unwrap().to_vec()).unwrap();
        }
    }
    panic!("dead letter missing error header");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn settled_order_completes_and_consumes_one_unit() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;

    let inventory = InventoryStore::new(redis.clone());
    let statuses = OrderStatusStore::new(redis.clone());
    let processor = processor(redis, &brokers, &unique("dlq"), AlwaysSettle);

    let item = unique("item");
    inventory.seed(&item, 1).await.unwrap();

    let order = OrderRequest {
        user_id: "u1".to_string(),
        item_id: item.clone(),
        amount: 1,
        request_id: unique("r"),
    };

    let outcome = processor.process(&message_for(&order)).await;
    assert_eq!(outcome, ProcessOutcome::Completed);
    assert_eq!(inventory.level(&item).await.unwrap(), Some(0));
    assert_eq!(
        statuses.get(&order.request_id).await.unwrap(),
        Some(OrderStatus::Completed)
    );
}

#[tokio::test]
#[ignore] // Requires Docker
async fn settlement_failure_refunds_and_dead_letters() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;

    let dlq_topic = unique("dlq");
    let consumer = dlq_consumer(&brokers, &dlq_topic);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let inventory = InventoryStore::new(redis.clone());
    let statuses = OrderStatusStore::new(redis.clone());
    let processor = processor(redis, &brokers, &dlq_topic, NeverSettle);

    let item = unique("item");
    inventory.seed(&item, 1).await.unwrap();

    let order = OrderRequest {
        user_id: "u1".to_string(),
        item_id: item.clone(),
        amount: 1,
        request_id: unique("r"),
    };

    let outcome = processor.process(&message_for(&order)).await;
    assert_eq!(outcome, ProcessOutcome::SettlementFailed);

    // The compensating refund restored the unit.
    assert_eq!(inventory.level(&item).await.unwrap(), Some(1));
    assert_eq!(
        statuses.get(&order.request_id).await.unwrap(),
        Some(OrderStatus::FailedPayment)
    );
    assert_eq!(dlq_reason(&consumer).await, "Payment Timeout");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn exhausted_inventory_fails_sold_out_without_dead_letter() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;

    let inventory = InventoryStore::new(redis.clone());
    let statuses = OrderStatusStore::new(redis.clone());
    let processor = processor(redis, &brokers, &unique("dlq"), AlwaysSettle);

    let item = unique("item");
    inventory.seed(&item, 1).await.unwrap();

    let first = OrderRequest {
        user_id: "u1".to_string(),
        item_id: item.clone(),
        amount: 1,
        request_id: unique("r"),
    };
    let second = OrderRequest {
        user_id: "u2".to_string(),
        item_id: item.clone(),
        amount: 1,
        request_id: unique("r"),
    };

    assert_eq!(
        processor.process(&message_for(&first)).await,
        ProcessOutcome::Completed
    );
    assert_eq!(
        processor.process(&message_for(&second)).await,
        ProcessOutcome::SoldOut
    );

    assert_eq!(inventory.level(&item).await.unwrap(), Some(0));
    assert_eq!(
        statuses.get(&second.request_id).await.unwrap(),
        Some(OrderStatus::FailedSoldOut)
    );
}

#[tokio::test]
#[ignore] // Requires Docker
async fn unseeded_item_fails_sold_out() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;

    let inventory = InventoryStore::new(redis.clone());
    let statuses = OrderStatusStore::new(redis.clone());
    let processor = processor(redis, &brokers, &unique("dlq"), AlwaysSettle);

    let order = OrderRequest {
        user_id: "u1".to_string(),
        item_id: unique("item"),
        amount: 1,
        request_id: unique("r"),
    };

    assert_eq!(
        processor.process(&message_for(&order)).await,
        ProcessOutcome::SoldOut
    );
    assert_eq!(inventory.level(&order.item_id).await.unwrap(), None);
    assert_eq!(
        statuses.get(&order.request_id).await.unwrap(),
        Some(OrderStatus::FailedSoldOut)
    );
}

#[tokio::test]
#[ignore] // Requires Docker
async fn poison_payload_dead_letters_without_touching_inventory() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;

    let dlq_topic = unique("dlq");
    let consumer = dlq_consumer(&brokers, &dlq_topic);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let inventory = InventoryStore::new(redis.clone());
    let statuses = OrderStatusStore::new(redis.clone());
    let processor = processor(redis, &brokers, &dlq_topic, AlwaysSettle);

    let item = unique("item");
    inventory.seed(&item, 3).await.unwrap();

    let request_id = unique("r");
    let message = OrderMessage {
        payload: b"{definitely not an order".to_vec(),
        correlation_id: Some(unique("cid")),
        request_id: Some(request_id.clone()),
        partition: 0,
        offset: 0,
    };

    assert_eq!(
        processor.process(&message).await,
        ProcessOutcome::Poison
    );
    assert_eq!(inventory.level(&item).await.unwrap(), Some(3));
    assert_eq!(
        statuses.get(&request_id).await.unwrap(),
        Some(OrderStatus::FailedInvalid)
    );
    assert_eq!(dlq_reason(&consumer).await, "Invalid Order Format");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn inventory_is_conserved_across_mixed_outcomes() {
    let (_redis_c, redis) = redis_fixture().await;
    let (_kafka_c, brokers) = kafka_fixture().await;

    let inventory = InventoryStore::new(redis.clone());
    let statuses = OrderStatusStore::new(redis.clone());

    let dlq_topic = unique("dlq");
    let succeeding = processor(redis.clone(), &brokers, &dlq_topic, AlwaysSettle);
    let failing = processor(redis.clone(), &brokers, &dlq_topic, NeverSettle);

    let item = unique("item");
    inventory.seed(&item, 5).await.unwrap();

    let mut completed = Vec::new();
    for i in 0..3 {
        let order = OrderRequest {
            user_id: format!("u{i}"),
            item_id: item.clone(),
            amount: 1,
            request_id: unique("r"),
        };
        assert_eq!(
            succeeding.process(&message_for(&order)).await,
            ProcessOutcome::Completed
        );
        completed.push(order.request_id);
    }
    for i in 0..2 {
        let order = OrderRequest {
            user_id: format!("f{i}"),
            item_id: item.clone(),
            amount: 1,
            request_id: unique("r"),
        };
        assert_eq!(
            failing.process(&message_for(&order)).await,
            ProcessOutcome::SettlementFailed
        );
    }

    // initial - |COMPLETED| = current: 5 - 3 = 2.
    assert_eq!(inventory.level(&item).await.unwrap(), Some(2));
    for request_id in completed {
        assert_eq!(
            statuses.get(&request_id).await.unwrap(),
            Some(OrderStatus::Completed)
        );
    }
}
