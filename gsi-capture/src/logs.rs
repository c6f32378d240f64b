use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::metrics_consts::LOG_LINES_DROPPED;

pub const SNAPSHOT_LOG: &str = "Player Update";
pub const KILL_LOG: &str = "Player Kill";
pub const NEW_MATCH_LOG: &str = "New Match";

/// One entry of the live activity feed shown to UI subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub event_type: String,
    pub time: String,
}

/// Fire and forget: pushing never blocks ingestion.
pub trait LogSink: Send + Sync {
    fn push(&self, line: LogLine);
}

pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn push(&self, line: LogLine) {
        debug!(event_type = %line.event_type, time = %line.time, "log line");
    }
}

/// Bounded channel towards the feed, lines are dropped when it is full.
#[derive(Clone)]
pub struct ChannelLogSink {
    tx: mpsc::Sender<LogLine>,
}

impl ChannelLogSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LogLine>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelLogSink {
    fn push(&self, line: LogLine) {
        if self.tx.try_send(line).is_err() {
            counter!(LOG_LINES_DROPPED).increment(1);
        }
    }
}
