use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common_kafka::kafka_consumer::{Offset, RecvErr, SingleTopicConsumer};
use health::{ComponentStatus, HealthHandle};
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::cache::EventCache;
use crate::events::BusEvent;
use crate::metrics_consts::{
    CACHE_WRITE_ERRORS, CONSUMER_DECODE_ERRORS, EVENTS_CONSUMED, STORE_BATCH_SIZE,
    STORE_INSERT_ERRORS, STORE_ROWS_INSERTED,
};
use crate::store::EventStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecvError {
    /// The message is skipped, the consumer keeps going
    #[error("failed to decode message: {0}")]
    Decode(String),
    /// The consumer stops
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Read side of the bus, one topic. `Ok(None)` is the end of the stream.
#[async_trait]
pub trait EventSource<E>: Send {
    async fn recv(&mut self) -> Result<Option<E>, RecvError>;

    /// Called once after the consumer stopped and flushed its buffer. The
    /// last event handed out by `recv` is done with.
    async fn finish(&mut self) {}
}

#[async_trait]
impl<E: BusEvent> EventSource<E> for Box<dyn EventSource<E>> {
    async fn recv(&mut self) -> Result<Option<E>, RecvError> {
        (**self).recv().await
    }

    async fn finish(&mut self) {
        (**self).finish().await
    }
}

/// Kafka-backed source. A message's offset is stored when the next one is
/// requested or the consumer finishes, i.e. once the loop is done with it.
pub struct KafkaSource<E> {
    consumer: SingleTopicConsumer,
    pending: Option<Offset>,
    _event: PhantomData<fn() -> E>,
}

impl<E> KafkaSource<E> {
    pub fn new(consumer: SingleTopicConsumer) -> Self {
        Self {
            consumer,
            pending: None,
            _event: PhantomData,
        }
    }

    fn store_pending(&mut self) {
        if let Some(offset) = self.pending.take() {
            if let Err(e) = offset.store() {
                warn!(
                    "failed to store offset on {}: {}",
                    self.consumer.topic(),
                    e
                );
            }
        }
    }
}

#[async_trait]
impl<E: BusEvent> EventSource<E> for KafkaSource<E> {
    async fn recv(&mut self) -> Result<Option<E>, RecvError> {
        self.store_pending();

        match self.consumer.json_recv::<E>().await {
            Ok((event, offset)) => {
                self.pending = Some(offset);
                Ok(Some(event))
            }
            Err(RecvErr::Kafka(e)) => Err(RecvError::Transport(e.to_string())),
            Err(e @ (RecvErr::Serde(_) | RecvErr::Empty)) => Err(RecvError::Decode(e.to_string())),
        }
    }

    async fn finish(&mut self) {
        self.store_pending();
    }
}

/// Rows waiting for the next batch insert.
pub struct WriteBuffer<E> {
    rows: Vec<E>,
    max_rows: usize,
}

impl<E> WriteBuffer<E> {
    pub fn new(max_rows: usize) -> Self {
        let max_rows = max_rows.max(1);
        Self {
            rows: Vec::with_capacity(max_rows),
            max_rows,
        }
    }

    /// Returns true once the buffer is due for a flush.
    pub fn push(&mut self, row: E) -> bool {
        self.rows.push(row);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.max_rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn take(&mut self) -> Vec<E> {
        std::mem::replace(&mut self.rows, Vec::with_capacity(self.max_rows))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerExit {
    Shutdown,
    SourceClosed,
    TransportFailed(RecvError),
}

#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub max_rows: usize,
    pub period: Duration,
}

/// Per-event work of a consumer: cache upsert, then buffered store insert.
struct EventWriter<E> {
    cache: EventCache,
    store: Arc<dyn EventStore>,
    buffer: WriteBuffer<E>,
}

impl<E: BusEvent> EventWriter<E> {
    async fn write(&mut self, event: E) {
        counter!(EVENTS_CONSUMED, "kind" => E::KIND.as_str()).increment(1);

        if let Err(err) = self.cache.upsert(&event).await {
            counter!(CACHE_WRITE_ERRORS, "kind" => E::KIND.as_str()).increment(1);
            error!("failed to cache {} event: {}", E::KIND.as_str(), err);
        }

        if self.buffer.push(event) {
            self.flush().await;
        }
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let rows = self.buffer.take();
        let count = rows.len();
        histogram!(STORE_BATCH_SIZE, "kind" => E::KIND.as_str()).record(count as f64);

        match self.store.insert(E::into_batch(rows)).await {
            Ok(()) => {
                counter!(STORE_ROWS_INSERTED, "kind" => E::KIND.as_str()).increment(count as u64)
            }
            Err(err) => {
                counter!(STORE_INSERT_ERRORS, "kind" => E::KIND.as_str()).increment(1);
                error!(
                    "dropping batch of {} {} events: {}",
                    count,
                    E::KIND.as_str(),
                    err
                );
            }
        }
    }
}

/// Long-running reader of one topic. Writes are awaited inline, so a slow
/// cache or store slows down this topic only.
pub struct EventConsumer<E, S> {
    source: S,
    writer: EventWriter<E>,
    period: Duration,
    liveness: HealthHandle,
}

impl<E, S> EventConsumer<E, S>
where
    E: BusEvent,
    S: EventSource<E>,
{
    pub fn new(
        source: S,
        cache: EventCache,
        store: Arc<dyn EventStore>,
        batch: BatchSettings,
        liveness: HealthHandle,
    ) -> Self {
        Self {
            source,
            writer: EventWriter {
                cache,
                store,
                buffer: WriteBuffer::new(batch.max_rows),
            },
            period: batch.period.max(Duration::from_millis(1)),
            liveness,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> ConsumerExit {
        let Self {
            mut source,
            mut writer,
            period,
            liveness,
        } = self;

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            liveness.report_healthy();
            tokio::select! {
                received = source.recv() => match received {
                    Ok(Some(event)) => writer.write(event).await,
                    Ok(None) => break ConsumerExit::SourceClosed,
                    Err(RecvError::Decode(msg)) => {
                        counter!(CONSUMER_DECODE_ERRORS, "kind" => E::KIND.as_str()).increment(1);
                        warn!("skipping undecodable {} message: {}", E::KIND.as_str(), msg);
                    }
                    Err(err @ RecvError::Transport(_)) => {
                        error!("{} consumer stopping: {}", E::KIND.as_str(), err);
                        break ConsumerExit::TransportFailed(err);
                    }
                },
                _ = ticker.tick() => writer.flush().await,
                _ = shutdown.changed() => break ConsumerExit::Shutdown,
            }
        };

        writer.flush().await;
        source.finish().await;
        liveness.report_status(ComponentStatus::Unhealthy);
        info!("{} consumer exited: {:?}", E::KIND.as_str(), exit);
        exit
    }
}
