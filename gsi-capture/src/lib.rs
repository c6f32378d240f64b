pub mod api;
pub mod cache;
pub mod config;
pub mod consumer;
pub mod endpoints;
pub mod events;
pub mod ingest;
pub mod kills;
pub mod lifecycle;
pub mod logs;
pub mod metrics_consts;
pub mod prometheus;
pub mod publisher;
pub mod query;
pub mod router;
pub mod server;
pub mod sinks;
pub mod snapshot;
pub mod store;
pub mod time;
