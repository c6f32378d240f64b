use std::sync::Arc;

use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::events::{KillEvent, PlayerEvent};
use crate::kills::KillDeltaDetector;
use crate::lifecycle::{BoundaryRule, IdSource, MatchContext, MatchLifecycle};
use crate::logs::{LogLine, LogSink, KILL_LOG, NEW_MATCH_LOG, SNAPSHOT_LOG};
use crate::metrics_consts::{KILLS_DETECTED, MATCH_BOUNDARIES, SNAPSHOTS_RECEIVED};
use crate::publisher::EventPublisher;
use crate::snapshot::Snapshot;
use crate::time::TimeSource;

/// Process-wide ingestion state. Only the pipeline touches it, one snapshot
/// at a time.
pub struct IngestState {
    pub lifecycle: MatchLifecycle,
    pub kills: KillDeltaDetector,
}

impl IngestState {
    pub fn new(rule: BoundaryRule, ids: Box<dyn IdSource>) -> Self {
        Self {
            lifecycle: MatchLifecycle::new(rule, ids),
            kills: KillDeltaDetector::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No player, map or round section
    Incomplete,
    /// Snapshot of a player other than the tracked one
    Untracked,
}

impl SkipReason {
    fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Incomplete => "incomplete",
            SkipReason::Untracked => "untracked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Skipped(SkipReason),
    Ingested {
        match_id: String,
        new_match: bool,
        kills_detected: usize,
        kills_published: usize,
    },
}

pub struct PipelineSettings {
    pub tracked_steam_id: Option<String>,
    pub skip_bomb_kills: bool,
}

pub struct Pipeline {
    state: Mutex<IngestState>,
    publisher: EventPublisher,
    logs: Arc<dyn LogSink>,
    timesource: Arc<dyn TimeSource + Send + Sync>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        state: IngestState,
        publisher: EventPublisher,
        logs: Arc<dyn LogSink>,
        timesource: Arc<dyn TimeSource + Send + Sync>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            state: Mutex::new(state),
            publisher,
            logs,
            timesource,
            settings,
        }
    }

    pub async fn match_context(&self) -> MatchContext {
        self.state.lock().await.lifecycle.context().clone()
    }

    pub async fn last_kills(&self, steamid: &str) -> Option<i32> {
        self.state.lock().await.kills.last_kills(steamid)
    }

    /// Runs one snapshot through lifecycle tracking, normalization, kill
    /// detection and publishing. The state lock is held for the whole
    /// sequence so concurrent deliveries are applied in arrival order.
    /// Publish failures are logged by the publisher and do not fail ingestion.
    #[instrument(skip_all)]
    pub async fn ingest(&self, snapshot: &Snapshot) -> IngestOutcome {
        let Some(ctx) = snapshot.context() else {
            return self.skip(SkipReason::Incomplete);
        };
        if let Some(tracked) = &self.settings.tracked_steam_id {
            if ctx.player.steamid != *tracked {
                return self.skip(SkipReason::Untracked);
            }
        }
        counter!(SNAPSHOTS_RECEIVED, "outcome" => "ingested").increment(1);
        self.log(SNAPSHOT_LOG);

        let mut state = self.state.lock().await;

        let observation = state
            .lifecycle
            .observe(&ctx.map.name, ctx.map.round, &ctx.map.phase);
        if observation.new_match {
            counter!(MATCH_BOUNDARIES).increment(1);
            info!(
                match_id = %observation.match_id,
                map = %ctx.map.name,
                "new match started"
            );
            self.log(NEW_MATCH_LOG);
        }

        let player_event = PlayerEvent::from_snapshot(&observation.match_id, &ctx);
        // Failures are counted and logged by the publisher
        if self.publisher.publish(&player_event).await.is_err() {
            debug!("player event dropped");
        }

        let kills = state.kills.detect(&observation.match_id, &ctx);
        counter!(KILLS_DETECTED).increment(kills.len() as u64);
        let kills_published = self.publish_kills(&kills).await;

        IngestOutcome::Ingested {
            match_id: observation.match_id,
            new_match: observation.new_match,
            kills_detected: kills.len(),
            kills_published,
        }
    }

    async fn publish_kills(&self, kills: &[KillEvent]) -> usize {
        let mut published = 0;
        for kill in kills {
            if self.settings.skip_bomb_kills && kill.active_gun.is_bomb() {
                continue;
            }
            self.log(KILL_LOG);
            if self.publisher.publish(kill).await.is_ok() {
                published += 1;
            }
        }
        published
    }

    fn skip(&self, reason: SkipReason) -> IngestOutcome {
        counter!(SNAPSHOTS_RECEIVED, "outcome" => reason.as_str()).increment(1);
        debug!("skipping snapshot: {}", reason.as_str());
        IngestOutcome::Skipped(reason)
    }

    fn log(&self, event_type: &str) {
        self.logs.push(LogLine {
            event_type: event_type.to_owned(),
            time: self.timesource.current_time(),
        });
    }
}
