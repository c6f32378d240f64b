use std::time::Duration;

use health::HealthHandle;
use metrics::gauge;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, Producer};
use rdkafka::ClientConfig;
use tracing::{debug, error, info};

use crate::config::KafkaConfig;

pub struct KafkaContext {
    liveness: HealthHandle,
}

impl From<HealthHandle> for KafkaContext {
    fn from(value: HealthHandle) -> Self {
        KafkaContext { liveness: value }
    }
}

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, stats: rdkafka::Statistics) {
        // Signal liveness, as the main rdkafka loop is running and calling us
        self.liveness.report_healthy();

        gauge!("gsi_kafka_callback_queue_depth").set(stats.replyq as f64);
        gauge!("gsi_kafka_producer_queue_depth").set(stats.msg_cnt as f64);
        gauge!("gsi_kafka_producer_queue_depth_limit").set(stats.msg_max as f64);

        for (topic, stats) in stats.topics {
            gauge!("gsi_kafka_produce_avg_batch_size_events", "topic" => topic)
                .set(stats.batchcnt.avg as f64);
        }
    }
}

pub fn create_kafka_producer(
    config: &KafkaConfig,
    liveness: HealthHandle,
) -> Result<FutureProducer<KafkaContext>, KafkaError> {
    info!("connecting to Kafka brokers at {}...", config.kafka_hosts);

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_hosts)
        .set("statistics.interval.ms", "10000")
        .set("linger.ms", config.kafka_producer_linger_ms.to_string())
        .set(
            "message.timeout.ms",
            config.kafka_message_timeout_ms.to_string(),
        )
        .set(
            "compression.codec",
            config.kafka_compression_codec.to_owned(),
        )
        .set(
            "queue.buffering.max.kbytes",
            (config.kafka_producer_queue_mib * 1024).to_string(),
        )
        .set(
            "queue.buffering.max.messages",
            config.kafka_producer_queue_messages.to_string(),
        );

    if config.kafka_tls {
        client_config
            .set("security.protocol", "ssl")
            .set("enable.ssl.certificate.verification", "false");
    };

    debug!("rdkafka configuration: {:?}", client_config);
    let producer: FutureProducer<KafkaContext> =
        client_config.create_with_context(liveness.into())?;

    // "Ping" the brokers by requesting metadata, fail after 15 seconds
    match producer
        .client()
        .fetch_metadata(None, Duration::from_secs(15))
    {
        Ok(metadata) => {
            info!(
                "connected to Kafka brokers, found {} topics",
                metadata.topics().len()
            );
        }
        Err(error) => {
            error!("failed to fetch metadata from Kafka brokers: {:?}", error);
            return Err(error);
        }
    }

    Ok(producer)
}
