pub mod config;
pub mod kafka_consumer;
pub mod kafka_producer;
pub mod test;

pub const PLAYER_EVENTS_TOPIC: &str = "player_events";
pub const KILL_EVENTS_TOPIC: &str = "kill_events";

pub const PLAYER_EVENTS_GROUP: &str = "cs2-player-processor";
pub const KILL_EVENTS_GROUP: &str = "cs2-kill-processor";
