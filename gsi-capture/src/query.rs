use serde::{Deserialize, Serialize};

/// A bound parameter of a filter clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Str(String),
    UInt(u32),
    Bool(bool),
}

impl FilterValue {
    /// Compares against the JSON form of a row column.
    pub fn matches(&self, column: &serde_json::Value) -> bool {
        match self {
            FilterValue::Str(v) => column.as_str() == Some(v.as_str()),
            FilterValue::UInt(v) => column.as_u64() == Some(u64::from(*v)),
            FilterValue::Bool(v) => column.as_bool() == Some(*v),
        }
    }
}

/// `column = ?`, with the value bound separately.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub column: &'static str,
    pub value: FilterValue,
}

impl Clause {
    fn new(column: &'static str, value: FilterValue) -> Self {
        Self { column, value }
    }
}

pub trait QueryFilter {
    /// One clause per set field. Zero values (empty string, 0, false) are unset.
    fn clauses(&self) -> Vec<Clause>;

    /// ` WHERE a = ? AND b = ?`, or an empty string without any clause.
    fn where_sql(&self) -> String {
        let clauses = self.clauses();
        if clauses.is_empty() {
            return String::new();
        }
        let predicates: Vec<String> = clauses
            .iter()
            .map(|c| format!("{} = ?", c.column))
            .collect();
        format!(" WHERE {}", predicates.join(" AND "))
    }

    fn binds(&self) -> Vec<FilterValue> {
        self.clauses().into_iter().map(|c| c.value).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQueryConfig {
    pub match_id: String,
    pub round: u32,
}

impl EventQueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_match_id(mut self, match_id: &str) -> Self {
        self.match_id = match_id.to_owned();
        self
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = round;
        self
    }
}

impl QueryFilter for EventQueryConfig {
    fn clauses(&self) -> Vec<Clause> {
        let mut clauses = Vec::new();
        if !self.match_id.is_empty() {
            clauses.push(Clause::new(
                "match_id",
                FilterValue::Str(self.match_id.clone()),
            ));
        }
        if self.round != 0 {
            clauses.push(Clause::new("round", FilterValue::UInt(self.round)));
        }
        clauses
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillEventQueryConfig {
    pub base: EventQueryConfig,
    pub weapon_name: String,
    pub weapon_headshot: bool,
}

impl KillEventQueryConfig {
    pub fn new(base: EventQueryConfig) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    pub fn with_weapon_name(mut self, weapon_name: &str) -> Self {
        self.weapon_name = weapon_name.to_owned();
        self
    }

    pub fn with_weapon_headshot(mut self, headshot: bool) -> Self {
        self.weapon_headshot = headshot;
        self
    }
}

impl QueryFilter for KillEventQueryConfig {
    fn clauses(&self) -> Vec<Clause> {
        let mut clauses = self.base.clauses();
        if !self.weapon_name.is_empty() {
            clauses.push(Clause::new(
                "weapon_name",
                FilterValue::Str(self.weapon_name.clone()),
            ));
        }
        // Only `true` filters, there is no way to ask for body shots only
        if self.weapon_headshot {
            clauses.push(Clause::new("weapon_headshot", FilterValue::Bool(true)));
        }
        clauses
    }
}

/// Query string of the player events read API. Values are kept raw and
/// parsed leniently: anything unparsable counts as unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQueryParams {
    pub match_id: Option<String>,
    pub round: Option<String>,
}

impl From<&EventQueryParams> for EventQueryConfig {
    fn from(params: &EventQueryParams) -> Self {
        EventQueryConfig::new()
            .with_match_id(params.match_id.as_deref().unwrap_or_default())
            .with_round(parse_round(params.round.as_deref()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KillEventQueryParams {
    pub match_id: Option<String>,
    pub round: Option<String>,
    pub weapon_name: Option<String>,
    pub headshot: Option<String>,
}

impl From<&KillEventQueryParams> for KillEventQueryConfig {
    fn from(params: &KillEventQueryParams) -> Self {
        let base = EventQueryConfig::new()
            .with_match_id(params.match_id.as_deref().unwrap_or_default())
            .with_round(parse_round(params.round.as_deref()));
        KillEventQueryConfig::new(base)
            .with_weapon_name(params.weapon_name.as_deref().unwrap_or_default())
            .with_weapon_headshot(parse_bool(params.headshot.as_deref()))
    }
}

fn parse_round(raw: Option<&str>) -> u32 {
    raw.and_then(|r| r.trim().parse().ok()).unwrap_or(0)
}

fn parse_bool(raw: Option<&str>) -> bool {
    matches!(
        raw.map(str::trim),
        Some("1" | "t" | "T" | "true" | "TRUE" | "True")
    )
}
