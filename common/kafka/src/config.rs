use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct KafkaConfig {
    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "100000")]
    pub kafka_producer_queue_messages: u32,

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message: 20 seconds

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,
}

/// Settings shared by every topic consumer of the process. The group and
/// topic are per consumer and passed to `SingleTopicConsumer::new`.
#[derive(Envconfig, Clone, Debug)]
pub struct ConsumerConfig {
    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String, // earliest, latest

    // Offsets are stored manually once a message is processed, this only
    // controls whether stored offsets get committed in the background.
    #[envconfig(default = "true")]
    pub kafka_consumer_auto_commit: bool,

    #[envconfig(default = "5000")]
    pub kafka_consumer_auto_commit_interval_ms: i32,
}
