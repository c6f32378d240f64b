use std::time::Duration;

use health::HealthRegistry;
use rdkafka::mocking::MockCluster;
use rdkafka::producer::{DefaultProducerContext, FutureProducer};

use crate::config::KafkaConfig;
use crate::kafka_producer::{create_kafka_producer, KafkaContext};

/// Config pointing at a mock cluster, with short timeouts to keep tests fast.
fn mock_kafka_config(cluster: &MockCluster<'static, DefaultProducerContext>) -> KafkaConfig {
    KafkaConfig {
        kafka_producer_linger_ms: 0,
        kafka_producer_queue_mib: 50,
        kafka_producer_queue_messages: 1000,
        kafka_message_timeout_ms: 500,
        kafka_compression_codec: "none".to_string(),
        kafka_tls: false,
        kafka_hosts: cluster.bootstrap_servers(),
    }
}

pub fn create_mock_kafka() -> (
    MockCluster<'static, DefaultProducerContext>,
    FutureProducer<KafkaContext>,
) {
    let registry = HealthRegistry::new("liveness");
    let handle = registry.register("rdkafka", Duration::from_secs(30));
    let cluster = MockCluster::new(1).expect("failed to create mock brokers");
    let config = mock_kafka_config(&cluster);

    let producer =
        create_kafka_producer(&config, handle).expect("failed to create mocked kafka producer");
    (cluster, producer)
}
