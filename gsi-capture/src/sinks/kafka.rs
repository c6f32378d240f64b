use std::time::Duration;

use async_trait::async_trait;
use common_kafka::kafka_producer::KafkaContext;
use metrics::counter;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use tracing::{error, info_span, instrument, Instrument};

use crate::metrics_consts::{BUS_PRODUCE_ERRORS, BUS_PRODUCED};
use crate::sinks::{EventSink, SinkError};

#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer<KafkaContext>,
}

impl KafkaSink {
    pub fn new(producer: FutureProducer<KafkaContext>) -> Self {
        KafkaSink { producer }
    }

    pub fn flush(&self) -> Result<(), KafkaError> {
        self.producer.flush(Duration::new(30, 0))
    }

    fn enqueue(&self, topic: &str, key: &str, payload: &[u8]) -> Result<DeliveryFuture, SinkError> {
        match self.producer.send_result(FutureRecord {
            topic,
            payload: Some(payload),
            partition: None,
            key: Some(key),
            timestamp: None,
            headers: None,
        }) {
            Ok(ack) => Ok(ack),
            Err((e, _)) => match e.rdkafka_error_code() {
                Some(RDKafkaErrorCode::MessageSizeTooLarge) => {
                    counter!(BUS_PRODUCE_ERRORS, "cause" => "message_size").increment(1);
                    Err(SinkError::EventTooBig)
                }
                _ => {
                    counter!(BUS_PRODUCE_ERRORS, "cause" => "enqueue").increment(1);
                    error!("failed to produce event: {}", e);
                    Err(SinkError::Produce(e.to_string()))
                }
            },
        }
    }

    async fn process_ack(topic: &str, delivery: DeliveryFuture) -> Result<(), SinkError> {
        match delivery.await {
            Err(_) => {
                // Cancelled due to timeout while retrying
                counter!(BUS_PRODUCE_ERRORS, "cause" => "timeout").increment(1);
                error!("failed to produce to Kafka before write timeout");
                Err(SinkError::Canceled)
            }
            Ok(Err((KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge), _))) => {
                counter!(BUS_PRODUCE_ERRORS, "cause" => "message_size").increment(1);
                Err(SinkError::EventTooBig)
            }
            Ok(Err((err, _))) => {
                counter!(BUS_PRODUCE_ERRORS, "cause" => "delivery").increment(1);
                error!("failed to produce to Kafka: {}", err);
                Err(SinkError::Produce(err.to_string()))
            }
            Ok(Ok(_)) => {
                counter!(BUS_PRODUCED, "topic" => topic.to_owned()).increment(1);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl EventSink for KafkaSink {
    #[instrument(skip_all, fields(topic = topic))]
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), SinkError> {
        let ack = self.enqueue(topic, key, &payload)?;
        Self::process_ack(topic, ack)
            .instrument(info_span!("ack_wait"))
            .await
    }
}
