use clickhouse::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::snapshot::{SnapshotContext, Weapon};
use crate::store::StoreBatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Player,
    Kill,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Player => "player",
            EventKind::Kill => "kill",
        }
    }

    /// Last segment of the cache key
    pub fn cache_suffix(&self) -> &'static str {
        match self {
            EventKind::Player => "events",
            EventKind::Kill => "kills",
        }
    }
}

/// Everything that travels over the bus and gets replicated into the cache
/// and the durable store.
pub trait BusEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EventKind;

    fn match_id(&self) -> &str;
    fn round(&self) -> u32;
    fn steamid(&self) -> &str;

    /// Bus partitioning key, keeps a player's events ordered
    fn partition_key(&self) -> &str {
        self.steamid()
    }

    fn cache_key(&self) -> String {
        cache_key(self.match_id(), self.round(), self.steamid(), Self::KIND)
    }

    fn into_batch(events: Vec<Self>) -> StoreBatch;
}

pub fn cache_key(match_id: &str, round: u32, steamid: &str, kind: EventKind) -> String {
    format!(
        "matches:{match_id}:round:{round}:player:{steamid}:{}",
        kind.cache_suffix()
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerEvent {
    pub match_id: String,
    pub round: u32,
    pub map: String,
    pub team: String,
    pub steamid: String,
    pub name: String,
    pub mode: String,

    pub health: u32,
    pub armor: u32,
    pub helmet: bool,
    pub money: u32,
    pub equip_value: u32,

    pub round_kills: i32,
    pub round_killhs: i32,

    pub kills: i32,
    pub assists: i32,
    pub deaths: i32,
    pub mvps: i32,
    pub score: i32,

    /// Provider timestamp, unix seconds
    pub timestamp: i64,
    pub win_team: String,
}

impl PlayerEvent {
    pub fn from_snapshot(match_id: &str, snapshot: &SnapshotContext<'_>) -> Self {
        let player = snapshot.player;
        PlayerEvent {
            match_id: match_id.to_owned(),
            round: snapshot.map.round,
            map: snapshot.map.name.clone(),
            team: player.team.clone(),
            steamid: player.steamid.clone(),
            name: player.name.clone(),
            mode: snapshot.map.mode.clone(),
            health: player.state.health,
            armor: player.state.armor,
            helmet: player.state.helmet,
            money: player.state.money,
            equip_value: player.state.equip_value,
            round_kills: player.state.round_kills,
            round_killhs: player.state.round_killhs,
            kills: player.match_stats.kills,
            assists: player.match_stats.assists,
            deaths: player.match_stats.deaths,
            mvps: player.match_stats.mvps,
            score: player.match_stats.score,
            timestamp: snapshot.timestamp,
            win_team: snapshot.round.win_team.clone(),
        }
    }
}

impl BusEvent for PlayerEvent {
    const KIND: EventKind = EventKind::Player;

    fn match_id(&self) -> &str {
        &self.match_id
    }

    fn round(&self) -> u32 {
        self.round
    }

    fn steamid(&self) -> &str {
        &self.steamid
    }

    fn into_batch(events: Vec<Self>) -> StoreBatch {
        StoreBatch::Players(events.into_iter().map(PlayerEventRow::from).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveGun {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ammo: u32,
    pub reserve: u32,
    pub skin: String,
    pub headshot: bool,
}

impl ActiveGun {
    pub fn from_weapon(weapon: &Weapon, headshot: bool) -> Self {
        ActiveGun {
            name: weapon.name.clone(),
            kind: weapon.kind.clone(),
            ammo: weapon.ammo_clip.unwrap_or_default(),
            reserve: weapon.ammo_reserve.unwrap_or_default(),
            skin: weapon.paintkit.clone(),
            headshot,
        }
    }

    pub fn is_bomb(&self) -> bool {
        self.kind == "C4"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KillEvent {
    pub match_id: String,
    pub round: u32,
    pub map: String,
    pub team: String,
    pub steamid: String,
    pub name: String,
    pub mode: String,
    pub active_gun: ActiveGun,
    /// Provider timestamp of the snapshot that revealed the kill
    pub timestamp: i64,
    /// Value of the cumulative kill counter this event accounts for
    #[serde(default)]
    pub kill_number: i32,
}

impl BusEvent for KillEvent {
    const KIND: EventKind = EventKind::Kill;

    fn match_id(&self) -> &str {
        &self.match_id
    }

    fn round(&self) -> u32 {
        self.round
    }

    fn steamid(&self) -> &str {
        &self.steamid
    }

    fn into_batch(events: Vec<Self>) -> StoreBatch {
        StoreBatch::Kills(events.into_iter().map(KillEventRow::from).collect())
    }
}

/// `cs2_player_events` row. Field names are the column names.
#[derive(Row, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEventRow {
    pub match_id: String,
    pub round: u32,
    pub map: String,
    pub team: String,
    pub steamid: String,
    pub name: String,
    pub mode: String,
    pub health: u32,
    pub armor: u32,
    pub helmet: bool,
    pub money: u32,
    pub equip_value: u32,
    pub round_kills: i32,
    pub round_killhs: i32,
    pub kills: i32,
    pub assists: i32,
    pub deaths: i32,
    pub mvps: i32,
    pub score: i32,
    pub event_timestamp: i64,
    pub win_team: String,
}

impl From<PlayerEvent> for PlayerEventRow {
    fn from(e: PlayerEvent) -> Self {
        PlayerEventRow {
            match_id: e.match_id,
            round: e.round,
            map: e.map,
            team: e.team,
            steamid: e.steamid,
            name: e.name,
            mode: e.mode,
            health: e.health,
            armor: e.armor,
            helmet: e.helmet,
            money: e.money,
            equip_value: e.equip_value,
            round_kills: e.round_kills,
            round_killhs: e.round_killhs,
            kills: e.kills,
            assists: e.assists,
            deaths: e.deaths,
            mvps: e.mvps,
            score: e.score,
            event_timestamp: e.timestamp,
            win_team: e.win_team,
        }
    }
}

/// `cs2_kill_events` row, with the weapon flattened into columns.
#[derive(Row, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillEventRow {
    pub match_id: String,
    pub round: u32,
    pub map: String,
    pub team: String,
    pub steamid: String,
    pub name: String,
    pub mode: String,
    pub weapon_name: String,
    pub weapon_type: String,
    pub weapon_ammo: u32,
    pub weapon_reserve: u32,
    pub weapon_skin: String,
    pub weapon_headshot: bool,
    pub timestamp: i64,
}

impl From<KillEvent> for KillEventRow {
    fn from(e: KillEvent) -> Self {
        KillEventRow {
            match_id: e.match_id,
            round: e.round,
            map: e.map,
            team: e.team,
            steamid: e.steamid,
            name: e.name,
            mode: e.mode,
            weapon_name: e.active_gun.name,
            weapon_type: e.active_gun.kind,
            weapon_ammo: e.active_gun.ammo,
            weapon_reserve: e.active_gun.reserve,
            weapon_skin: e.active_gun.skin,
            weapon_headshot: e.active_gun.headshot,
            timestamp: e.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use super::*;
    use crate::snapshot::Snapshot;

    fn snapshot() -> Snapshot {
        serde_json::from_value(json!({
            "provider": {"timestamp": 1700000100},
            "map": {"mode": "competitive", "name": "de_inferno", "phase": "live", "round": 7},
            "round": {"phase": "over", "win_team": "T"},
            "player": {
                "steamid": "s1", "name": "bob", "team": "T",
                "state": {"health": 0, "armor": 40, "helmet": false, "money": 1900, "round_kills": 2, "round_killhs": 0, "equip_value": 2700},
                "match_stats": {"kills": 11, "assists": 3, "deaths": 6, "mvps": 2, "score": 27}
            }
        }))
        .unwrap()
    }

    #[test]
    fn player_event_wire_format() {
        let snapshot = snapshot();
        let event = PlayerEvent::from_snapshot("m1", &snapshot.context().unwrap());

        assert_json_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "match_id": "m1", "round": 7, "map": "de_inferno", "team": "T",
                "steamid": "s1", "name": "bob", "mode": "competitive",
                "health": 0, "armor": 40, "helmet": false, "money": 1900, "equip_value": 2700,
                "round_kills": 2, "round_killhs": 0,
                "kills": 11, "assists": 3, "deaths": 6, "mvps": 2, "score": 27,
                "timestamp": 1700000100, "win_team": "T"
            })
        );
        assert_eq!(event.cache_key(), "matches:m1:round:7:player:s1:events");
        assert_eq!(event.partition_key(), "s1");
    }

    #[test]
    fn kill_row_flattens_the_weapon() {
        let kill = KillEvent {
            match_id: "m1".into(),
            round: 3,
            steamid: "s1".into(),
            active_gun: ActiveGun {
                name: "weapon_ak47".into(),
                kind: "Rifle".into(),
                ammo: 12,
                reserve: 90,
                skin: "cu_ak47_asiimov".into(),
                headshot: true,
            },
            timestamp: 1700000200,
            kill_number: 4,
            ..Default::default()
        };
        assert_eq!(kill.cache_key(), "matches:m1:round:3:player:s1:kills");

        let row = KillEventRow::from(kill);
        assert_eq!(row.weapon_name, "weapon_ak47");
        assert_eq!(row.weapon_type, "Rifle");
        assert_eq!(row.weapon_ammo, 12);
        assert_eq!(row.weapon_reserve, 90);
        assert!(row.weapon_headshot);
        assert_eq!(row.timestamp, 1700000200);
    }

    #[test]
    fn kill_event_without_counter_still_decodes() {
        let kill: KillEvent = serde_json::from_value(json!({
            "match_id": "m1", "round": 1, "map": "de_dust2", "team": "CT",
            "steamid": "s1", "name": "alice", "mode": "casual",
            "active_gun": {"name": "weapon_glock", "type": "Pistol", "ammo": 19, "reserve": 120, "skin": "", "headshot": false},
            "timestamp": 1700000000
        }))
        .unwrap();
        assert_eq!(kill.kill_number, 0);
        assert_eq!(kill.active_gun.kind, "Pistol");
    }
}
