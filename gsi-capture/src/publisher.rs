use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::config::TopicConfig;
use crate::events::{BusEvent, EventKind};
use crate::metrics_consts::{EVENTS_PUBLISHED, PUBLISH_ERRORS};
use crate::sinks::{EventSink, SinkError};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl PublishError {
    fn cause(&self) -> &'static str {
        match self {
            PublishError::Serialize(_) => "serialize",
            PublishError::Sink(SinkError::EventTooBig) => "too_big",
            PublishError::Sink(_) => "sink",
        }
    }
}

/// Serializes events and hands them to the bus. Nothing is retried: a
/// failed publish is reported to the caller and the event is gone.
#[derive(Clone)]
pub struct EventPublisher {
    sink: Arc<dyn EventSink + Send + Sync>,
    topics: TopicConfig,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink + Send + Sync>, topics: TopicConfig) -> Self {
        Self { sink, topics }
    }

    pub fn topic(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Player => &self.topics.player_events_topic,
            EventKind::Kill => &self.topics.kill_events_topic,
        }
    }

    pub async fn publish_to<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        key: &str,
        event: &T,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        self.sink.send(topic, key, payload).await?;
        Ok(())
    }

    /// Publishes on the event's topic, keyed by player.
    pub async fn publish<E: BusEvent>(&self, event: &E) -> Result<(), PublishError> {
        let result = self
            .publish_to(self.topic(E::KIND), event.partition_key(), event)
            .await;
        match &result {
            Ok(()) => counter!(EVENTS_PUBLISHED, "kind" => E::KIND.as_str()).increment(1),
            Err(err) => {
                counter!(PUBLISH_ERRORS, "kind" => E::KIND.as_str(), "cause" => err.cause())
                    .increment(1);
                error!("failed to publish {} event: {}", E::KIND.as_str(), err);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::events::{KillEvent, PlayerEvent};

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String, Vec<u8>)>>,
        failing_topics: HashMap<String, SinkError>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), SinkError> {
            if let Some(err) = self.failing_topics.get(topic) {
                return Err(err.clone());
            }
            self.sent
                .lock()
                .unwrap()
                .push((topic.to_owned(), key.to_owned(), payload));
            Ok(())
        }
    }

    #[tokio::test]
    async fn routes_by_kind_and_keys_by_player() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = EventPublisher::new(sink.clone(), TopicConfig::default());

        let player = PlayerEvent {
            match_id: "m1".into(),
            steamid: "s1".into(),
            ..Default::default()
        };
        let kill = KillEvent {
            match_id: "m1".into(),
            steamid: "s2".into(),
            kill_number: 1,
            ..Default::default()
        };
        publisher.publish(&player).await.unwrap();
        publisher.publish(&kill).await.unwrap();

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0].0, "player_events");
        assert_eq!(sent[0].1, "s1");
        assert_eq!(
            serde_json::from_slice::<PlayerEvent>(&sent[0].2).unwrap(),
            player
        );
        assert_eq!(sent[1].0, "kill_events");
        assert_eq!(sent[1].1, "s2");
    }

    #[tokio::test]
    async fn sink_failures_are_reported() {
        let sink = RecordingSink {
            failing_topics: HashMap::from([("kill_events".to_string(), SinkError::EventTooBig)]),
            ..Default::default()
        };
        let publisher = EventPublisher::new(Arc::new(sink), TopicConfig::default());

        let err = publisher.publish(&KillEvent::default()).await.unwrap_err();
        assert!(matches!(err, PublishError::Sink(SinkError::EventTooBig)));
        publisher.publish(&PlayerEvent::default()).await.unwrap();
    }
}
