use async_trait::async_trait;
use thiserror::Error;

pub mod kafka;
pub mod memory;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("event too big for the bus")]
    EventTooBig,
    #[error("failed to produce: {0}")]
    Produce(String),
    #[error("produce cancelled before the delivery report")]
    Canceled,
}

/// Write side of the bus. Payloads are already serialized, `key` picks the
/// partition.
#[async_trait]
pub trait EventSink {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), SinkError>;
}
