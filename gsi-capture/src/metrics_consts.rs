// Ingestion
pub const SNAPSHOTS_RECEIVED: &str = "gsi_snapshots_received_total";
pub const MATCH_BOUNDARIES: &str = "gsi_match_boundaries_total";
pub const KILLS_DETECTED: &str = "gsi_kills_detected_total";
pub const LOG_LINES_DROPPED: &str = "gsi_log_lines_dropped_total";

// Publishing
pub const EVENTS_PUBLISHED: &str = "gsi_events_published_total";
pub const PUBLISH_ERRORS: &str = "gsi_publish_errors_total";
pub const BUS_PRODUCED: &str = "gsi_bus_produced_total";
pub const BUS_PRODUCE_ERRORS: &str = "gsi_bus_produce_errors_total";
pub const BUS_PAYLOADS_DROPPED: &str = "gsi_bus_payloads_dropped_total";

// Consumers
pub const EVENTS_CONSUMED: &str = "gsi_events_consumed_total";
pub const CONSUMER_DECODE_ERRORS: &str = "gsi_consumer_decode_errors_total";
pub const CACHE_WRITE_ERRORS: &str = "gsi_cache_write_errors_total";
pub const STORE_ROWS_INSERTED: &str = "gsi_store_rows_inserted_total";
pub const STORE_INSERT_ERRORS: &str = "gsi_store_insert_errors_total";
pub const STORE_BATCH_SIZE: &str = "gsi_store_batch_size";
