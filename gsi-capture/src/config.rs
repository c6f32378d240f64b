use std::net::SocketAddr;

use common_kafka::config::{ConsumerConfig, KafkaConfig};
use envconfig::Envconfig;
use tracing::Level;

use crate::lifecycle::BoundaryRule;

#[derive(Envconfig, Clone)]
pub struct Config {
    /// Query API, liveness and metrics
    #[envconfig(default = "127.0.0.1:8080")]
    pub address: SocketAddr,

    /// Where the game client posts its state snapshots
    #[envconfig(default = "127.0.0.1:3000")]
    pub gsi_address: SocketAddr,

    /// Only snapshots of this player are ingested, every player when unset
    pub tracked_steam_id: Option<String>,

    #[envconfig(default = "round_reset")]
    pub match_boundary_rule: BoundaryRule,

    #[envconfig(default = "true")]
    pub skip_bomb_kills: bool,

    /// Local mode: events go through an in-process bus instead of Kafka
    #[envconfig(default = "false")]
    pub in_memory_bus: bool,

    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    #[envconfig(nested = true)]
    pub clickhouse: ClickHouseConfig,

    #[envconfig(default = "1000")]
    pub store_batch_max_rows: usize,

    #[envconfig(default = "1000")]
    pub store_batch_period_ms: u64,

    #[envconfig(nested = true)]
    pub topics: TopicConfig,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    pub otel_url: Option<String>,

    #[envconfig(default = "1.0")]
    pub otel_sampling_rate: f64,

    #[envconfig(default = "gsi-capture")]
    pub otel_service_name: String,

    #[envconfig(default = "info")]
    pub otel_log_level: Level,
}

#[derive(Envconfig, Clone)]
pub struct ClickHouseConfig {
    #[envconfig(default = "http://localhost:8123")]
    pub clickhouse_url: String,

    #[envconfig(default = "default")]
    pub clickhouse_database: String,

    #[envconfig(default = "default")]
    pub clickhouse_user: String,

    #[envconfig(default = "")]
    pub clickhouse_password: String,
}

#[derive(Envconfig, Clone, Debug)]
pub struct TopicConfig {
    #[envconfig(default = "player_events")]
    pub player_events_topic: String,

    #[envconfig(default = "kill_events")]
    pub kill_events_topic: String,

    #[envconfig(default = "cs2-player-processor")]
    pub player_events_group: String,

    #[envconfig(default = "cs2-kill-processor")]
    pub kill_events_group: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            player_events_topic: common_kafka::PLAYER_EVENTS_TOPIC.to_string(),
            kill_events_topic: common_kafka::KILL_EVENTS_TOPIC.to_string(),
            player_events_group: common_kafka::PLAYER_EVENTS_GROUP.to_string(),
            kill_events_group: common_kafka::KILL_EVENTS_GROUP.to_string(),
        }
    }
}
