use std::sync::{Arc, Weak};

use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    ClientConfig, Message,
};
use serde::de::DeserializeOwned;

use crate::config::{ConsumerConfig, KafkaConfig};

#[derive(Clone)]
pub struct SingleTopicConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer,
    topic: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Received empty payload")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum OffsetErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Consumer gone")]
    Gone,
}

impl SingleTopicConsumer {
    pub fn new(
        common_config: &KafkaConfig,
        consumer_config: &ConsumerConfig,
        group: &str,
        topic: &str,
    ) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &common_config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("group.id", group)
            .set(
                "auto.offset.reset",
                &consumer_config.kafka_consumer_offset_reset,
            )
            .set(
                "enable.auto.commit",
                consumer_config.kafka_consumer_auto_commit.to_string(),
            )
            .set(
                "auto.commit.interval.ms",
                consumer_config
                    .kafka_consumer_auto_commit_interval_ms
                    .to_string(),
            );

        // Offsets are only stored once the caller is done with a message
        client_config.set("enable.auto.offset.store", "false");

        if common_config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[topic])?;

        let inner = Inner {
            consumer,
            topic: topic.to_owned(),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Waits for the next message and decodes its JSON payload. Empty and
    /// undecodable payloads have their offset stored before the error is
    /// returned, so they are never redelivered.
    pub async fn json_recv<T>(&self) -> Result<(T, Offset), RecvErr>
    where
        T: DeserializeOwned,
    {
        let message = self.inner.consumer.recv().await?;

        let offset = Offset {
            handle: Arc::downgrade(&self.inner),
            partition: message.partition(),
            offset: message.offset(),
        };

        let Some(payload) = message.payload() else {
            return Err(skip_poison_pill(offset, RecvErr::Empty));
        };

        match serde_json::from_slice(payload) {
            Ok(p) => Ok((p, offset)),
            Err(e) => Err(skip_poison_pill(offset, RecvErr::Serde(e))),
        }
    }
}

fn skip_poison_pill(offset: Offset, err: RecvErr) -> RecvErr {
    match offset.store() {
        Ok(()) | Err(OffsetErr::Gone) => err,
        Err(OffsetErr::Kafka(e)) => RecvErr::Kafka(e),
    }
}

pub struct Offset {
    handle: Weak<Inner>,
    partition: i32,
    offset: i64,
}

impl Offset {
    pub fn store(self) -> Result<(), OffsetErr> {
        let inner = self.handle.upgrade().ok_or(OffsetErr::Gone)?;
        inner
            .consumer
            .store_offset(&inner.topic, self.partition, self.offset)?;
        Ok(())
    }
}
