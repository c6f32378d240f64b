use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common_kafka::kafka_consumer::SingleTopicConsumer;
use common_kafka::kafka_producer::create_kafka_producer;
use common_redis::RedisClient;
use health::HealthRegistry;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::EventCache;
use crate::config::Config;
use crate::consumer::{BatchSettings, ConsumerExit, EventConsumer, EventSource, KafkaSource};
use crate::events::{BusEvent, KillEvent, PlayerEvent};
use crate::ingest::{IngestState, Pipeline, PipelineSettings};
use crate::lifecycle::UuidSource;
use crate::logs::TracingLogSink;
use crate::publisher::EventPublisher;
use crate::router;
use crate::sinks::kafka::KafkaSink;
use crate::sinks::memory::MemoryBus;
use crate::sinks::EventSink;
use crate::store::clickhouse::ClickHouseStore;
use crate::store::EventStore;
use crate::time::SystemTime;

const LIVENESS_DEADLINE: Duration = Duration::from_secs(30);

/// Write side of the bus, plus what the consumers need to read it back.
enum Bus {
    Kafka(KafkaSink),
    Memory(MemoryBus),
}

impl Bus {
    fn create(config: &Config, liveness: &HealthRegistry) -> anyhow::Result<Self> {
        if config.in_memory_bus {
            info!("local mode, events go through the in-process bus");
            return Ok(Bus::Memory(MemoryBus::new()));
        }
        let sink_liveness = liveness.register("rdkafka", LIVENESS_DEADLINE);
        let producer = create_kafka_producer(&config.kafka, sink_liveness)
            .context("failed to start Kafka producer")?;
        Ok(Bus::Kafka(KafkaSink::new(producer)))
    }

    fn sink(&self) -> Arc<dyn EventSink + Send + Sync> {
        match self {
            Bus::Kafka(sink) => Arc::new(sink.clone()),
            Bus::Memory(bus) => Arc::new(bus.clone()),
        }
    }

    fn source<E: BusEvent>(
        &self,
        config: &Config,
        group: &str,
        topic: &str,
    ) -> anyhow::Result<Box<dyn EventSource<E>>> {
        match self {
            Bus::Kafka(_) => {
                let consumer = SingleTopicConsumer::new(&config.kafka, &config.consumer, group, topic)
                    .with_context(|| format!("failed to subscribe to {topic}"))?;
                Ok(Box::new(KafkaSource::<E>::new(consumer)))
            }
            Bus::Memory(bus) => Ok(Box::new(bus.subscribe::<E>(topic))),
        }
    }

    /// Runs once the webhook stopped: pending writes go out, then consumers stop.
    /// The sender must outlive the consumers, they stop when it is dropped.
    async fn drain(&self, stop_consumers: &watch::Sender<bool>) {
        match self {
            Bus::Kafka(sink) => {
                let sink = sink.clone();
                match tokio::task::spawn_blocking(move || sink.flush()).await {
                    Ok(Ok(())) => info!("kafka producer flushed"),
                    Ok(Err(e)) => error!("failed to flush kafka producer: {}", e),
                    Err(e) => error!("kafka flush task failed: {}", e),
                }
                stop_consumers.send_replace(true);
            }
            // Sources end once they drained what was already published
            Bus::Memory(bus) => bus.close(),
        }
    }
}

fn spawn_consumer<E: BusEvent>(
    config: &Config,
    bus: &Bus,
    group: &str,
    topic: &str,
    deps: &ConsumerDeps,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<JoinHandle<ConsumerExit>> {
    let source = bus.source::<E>(config, group, topic)?;
    let liveness = deps
        .liveness
        .register(&format!("{}_consumer", topic), LIVENESS_DEADLINE);
    let consumer = EventConsumer::new(
        source,
        deps.cache.clone(),
        deps.store.clone(),
        deps.batch,
        liveness,
    );
    info!("consuming {} as {}", topic, group);
    Ok(tokio::spawn(consumer.run(shutdown)))
}

struct ConsumerDeps {
    cache: EventCache,
    store: Arc<dyn EventStore>,
    batch: BatchSettings,
    liveness: HealthRegistry,
}

async fn until_shutdown(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        debug!("shutdown sender dropped");
    }
}

pub async fn serve<F>(
    config: Config,
    gsi_listener: TcpListener,
    api_listener: TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let liveness = HealthRegistry::new("liveness");

    let bus = Bus::create(&config, &liveness)?;

    let redis = RedisClient::new(config.redis_url.clone())
        .await
        .context("failed to create redis client")?;
    let cache = EventCache::new(Arc::new(redis));

    let store: Arc<dyn EventStore> = Arc::new(ClickHouseStore::new(&config.clickhouse));
    store
        .ensure_tables()
        .await
        .context("failed to create store tables")?;

    let deps = ConsumerDeps {
        cache: cache.clone(),
        store: store.clone(),
        batch: BatchSettings {
            max_rows: config.store_batch_max_rows,
            period: Duration::from_millis(config.store_batch_period_ms),
        },
        liveness: liveness.clone(),
    };
    let (stop_consumers, consumers_rx) = watch::channel(false);
    let topics = &config.topics;
    let consumers = vec![
        spawn_consumer::<PlayerEvent>(
            &config,
            &bus,
            &topics.player_events_group,
            &topics.player_events_topic,
            &deps,
            consumers_rx.clone(),
        )?,
        spawn_consumer::<KillEvent>(
            &config,
            &bus,
            &topics.kill_events_group,
            &topics.kill_events_topic,
            &deps,
            consumers_rx,
        )?,
    ];

    let pipeline = Arc::new(Pipeline::new(
        IngestState::new(config.match_boundary_rule, Box::new(UuidSource)),
        EventPublisher::new(bus.sink(), config.topics.clone()),
        Arc::new(TracingLogSink),
        Arc::new(SystemTime {}),
        PipelineSettings {
            tracked_steam_id: config.tracked_steam_id.clone(),
            skip_bomb_kills: config.skip_bomb_kills,
        },
    ));

    let gsi = router::gsi_router(pipeline, liveness.clone());
    let api = router::query_router(cache, store, liveness, config.export_prometheus);

    let (stop_http, http_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        stop_http.send_replace(true);
    });

    info!("gsi listening on {:?}", gsi_listener.local_addr()?);
    info!("api listening on {:?}", api_listener.local_addr()?);
    tokio::try_join!(
        axum::serve(gsi_listener, gsi)
            .with_graceful_shutdown(until_shutdown(http_rx.clone()))
            .into_future(),
        axum::serve(api_listener, api)
            .with_graceful_shutdown(until_shutdown(http_rx))
            .into_future(),
    )?;
    info!("http listeners stopped");

    bus.drain(&stop_consumers).await;
    for consumer in consumers {
        match consumer.await {
            Ok(exit) => info!("consumer finished: {:?}", exit),
            Err(e) => error!("consumer task failed: {}", e),
        }
    }

    Ok(())
}
