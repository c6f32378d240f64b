use std::str::FromStr;

use uuid::Uuid;

/// Decides when the running match is over and a new identifier is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryRule {
    /// New match on a map change, or when the round counter falls back to its
    /// initial value after having moved past it.
    #[default]
    RoundReset,
    /// New match on a map change, or on the first snapshot after a
    /// `gameover` phase.
    TerminalPhase,
}

impl FromStr for BoundaryRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "round_reset" => Ok(BoundaryRule::RoundReset),
            "terminal_phase" => Ok(BoundaryRule::TerminalPhase),
            _ => Err(format!("unknown match boundary rule: {s}")),
        }
    }
}

pub trait IdSource: Send {
    fn next_id(&mut self) -> String;
}

pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Hands out `{prefix}1`, `{prefix}2`, ...
pub struct SequenceSource {
    prefix: String,
    next: u64,
}

impl SequenceSource {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            next: 1,
        }
    }
}

impl IdSource for SequenceSource {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchContext {
    pub current_match_id: String,
    pub last_map: String,
    pub last_round: u32,
    pub last_phase: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub match_id: String,
    pub new_match: bool,
}

pub struct MatchLifecycle {
    rule: BoundaryRule,
    ids: Box<dyn IdSource>,
    context: MatchContext,
}

impl MatchLifecycle {
    pub fn new(rule: BoundaryRule, ids: Box<dyn IdSource>) -> Self {
        Self {
            rule,
            ids,
            context: MatchContext::default(),
        }
    }

    pub fn context(&self) -> &MatchContext {
        &self.context
    }

    pub fn observe(&mut self, map: &str, round: u32, phase: &str) -> Observation {
        let new_match = self.is_boundary(map, round, phase);
        if new_match {
            self.context.current_match_id = self.ids.next_id();
            self.context.last_map = map.to_owned();
        }
        self.context.last_round = round;
        self.context.last_phase = phase.to_owned();

        Observation {
            match_id: self.context.current_match_id.clone(),
            new_match,
        }
    }

    fn is_boundary(&self, map: &str, round: u32, phase: &str) -> bool {
        let ctx = &self.context;
        if ctx.current_match_id.is_empty() || map != ctx.last_map {
            return true;
        }
        match self.rule {
            BoundaryRule::RoundReset => round < ctx.last_round && round <= 1,
            BoundaryRule::TerminalPhase => ctx.last_phase == "gameover" && phase != "gameover",
        }
    }
}
