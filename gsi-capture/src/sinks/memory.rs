use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::consumer::{EventSource, RecvError};
use crate::events::BusEvent;
use crate::metrics_consts::BUS_PAYLOADS_DROPPED;
use crate::sinks::{EventSink, SinkError};

const SUBSCRIBER_CAPACITY: usize = 1024;

type Subscribers = HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>;

/// In-process bus for local runs and tests. Every subscriber of a topic gets
/// every payload sent after it subscribed; payloads sent to a topic nobody
/// listens on are dropped.
///
/// Sending never waits on a subscriber: a subscriber that fell `capacity`
/// payloads behind misses the next ones, the other topics keep flowing.
#[derive(Clone)]
pub struct MemoryBus {
    topics: Arc<RwLock<Subscribers>>,
    capacity: usize,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::with_capacity(SUBSCRIBER_CAPACITY)
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe<E: BusEvent>(&self, topic: &str) -> MemorySource<E> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if let Ok(mut topics) = self.topics.write() {
            topics.entry(topic.to_owned()).or_default().push(tx);
        }
        MemorySource {
            rx,
            _event: PhantomData,
        }
    }

    /// Drops every subscription, their sources report end of stream once drained.
    pub fn close(&self) {
        if let Ok(mut topics) = self.topics.write() {
            topics.clear();
        }
    }

    fn subscribers(&self, topic: &str) -> Result<Vec<mpsc::Sender<Vec<u8>>>, SinkError> {
        let topics = self
            .topics
            .read()
            .map_err(|_| SinkError::Produce("poisoned bus lock".to_string()))?;
        Ok(topics.get(topic).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl EventSink for MemoryBus {
    async fn send(&self, topic: &str, _key: &str, payload: Vec<u8>) -> Result<(), SinkError> {
        // A single partition per topic, the key has no effect on ordering
        for subscriber in self.subscribers(topic)? {
            match subscriber.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    counter!(BUS_PAYLOADS_DROPPED, "topic" => topic.to_owned()).increment(1);
                    warn!("{} subscriber is full, dropping payload", topic);
                }
                // A stopped consumer, the others still get the payload
                Err(TrySendError::Closed(_)) => {
                    debug!("dropping payload for a closed {} subscriber", topic);
                }
            }
        }
        Ok(())
    }
}

pub struct MemorySource<E> {
    rx: mpsc::Receiver<Vec<u8>>,
    _event: PhantomData<fn() -> E>,
}

#[async_trait]
impl<E: BusEvent> EventSource<E> for MemorySource<E> {
    async fn recv(&mut self) -> Result<Option<E>, RecvError> {
        match self.rx.recv().await {
            None => Ok(None),
            Some(payload) => serde_json::from_slice(&payload)
                .map(Some)
                .map_err(|e| RecvError::Decode(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{KillEvent, PlayerEvent};

    #[tokio::test]
    async fn delivers_to_every_subscriber_of_the_topic() {
        let bus = MemoryBus::new();
        let mut first = bus.subscribe::<PlayerEvent>("player_events");
        let mut second = bus.subscribe::<PlayerEvent>("player_events");
        let mut kills = bus.subscribe::<KillEvent>("kill_events");

        let event = PlayerEvent {
            match_id: "m1".into(),
            round: 1,
            steamid: "s1".into(),
            ..Default::default()
        };
        bus.send("player_events", "s1", serde_json::to_vec(&event).unwrap())
            .await
            .unwrap();
        bus.close();

        assert_eq!(first.recv().await.unwrap(), Some(event.clone()));
        assert_eq!(second.recv().await.unwrap(), Some(event));
        assert_eq!(first.recv().await.unwrap(), None);
        assert_eq!(kills.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_decode_error() {
        let bus = MemoryBus::new();
        let mut source = bus.subscribe::<PlayerEvent>("player_events");

        bus.send("player_events", "s1", b"not json".to_vec())
            .await
            .unwrap();
        assert!(matches!(source.recv().await, Err(RecvError::Decode(_))));
    }

    #[tokio::test]
    async fn sending_without_subscribers_succeeds() {
        let bus = MemoryBus::new();
        bus.send("kill_events", "s1", b"{}".to_vec()).await.unwrap();
    }

    #[tokio::test]
    async fn stalled_subscriber_does_not_hold_back_other_topics() {
        let bus = MemoryBus::with_capacity(2);
        let mut players = bus.subscribe::<PlayerEvent>("player_events");
        let mut stalled = bus.subscribe::<KillEvent>("kill_events");

        let kill = serde_json::to_vec(&KillEvent {
            kill_number: 1,
            ..Default::default()
        })
        .unwrap();
        for _ in 0..5 {
            bus.send("kill_events", "s1", kill.clone()).await.unwrap();
        }
        let player = serde_json::to_vec(&PlayerEvent::default()).unwrap();
        bus.send("player_events", "s1", player).await.unwrap();
        bus.close();

        assert_eq!(players.recv().await.unwrap(), Some(PlayerEvent::default()));
        let mut delivered = 0;
        while stalled.recv().await.unwrap().is_some() {
            delivered += 1;
        }
        assert_eq!(delivered, 2);
    }
}
