use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One state update posted by the game client. Every section is optional on
/// the wire: the client omits sections it has no data for (main menu,
/// spectating, loading screens).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub map: Option<MapState>,
    #[serde(default)]
    pub round: Option<RoundState>,
    #[serde(default)]
    pub player: Option<Player>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    pub name: String,
    pub appid: u32,
    pub version: u32,
    pub steamid: String,
    /// Unix seconds, stamped by the game client
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapState {
    pub mode: String,
    pub name: String,
    /// warmup, live, intermission, gameover
    pub phase: String,
    pub round: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundState {
    /// freezetime, live, over
    pub phase: String,
    pub win_team: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub steamid: String,
    pub name: String,
    pub team: String,
    pub state: PlayerState,
    pub match_stats: MatchStats,
    pub weapons: BTreeMap<String, Weapon>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    pub health: u32,
    pub armor: u32,
    pub helmet: bool,
    pub money: u32,
    pub equip_value: u32,
    pub round_kills: i32,
    pub round_killhs: i32,
}

/// Cumulative scoreboard. Team kills and suicides take `kills` and `score`
/// below zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchStats {
    pub kills: i32,
    pub assists: i32,
    pub deaths: i32,
    pub mvps: i32,
    pub score: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weapon {
    pub name: String,
    pub paintkit: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// active, holstered, reloading
    pub state: String,
    pub ammo_clip: Option<u32>,
    pub ammo_reserve: Option<u32>,
}

/// The sections a snapshot must carry to be turned into events.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotContext<'a> {
    pub player: &'a Player,
    pub map: &'a MapState,
    pub round: &'a RoundState,
    pub timestamp: i64,
}

impl Snapshot {
    /// `None` when the player, map or round section is missing.
    pub fn context(&self) -> Option<SnapshotContext<'_>> {
        Some(SnapshotContext {
            player: self.player.as_ref()?,
            map: self.map.as_ref()?,
            round: self.round.as_ref()?,
            timestamp: self.provider.as_ref().map_or(0, |p| p.timestamp),
        })
    }
}

impl Player {
    /// The weapon currently in hand. Map order makes the pick stable if the
    /// client ever reports more than one.
    pub fn active_weapon(&self) -> Option<&Weapon> {
        self.weapons.values().find(|w| w.state == "active")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIVE_SNAPSHOT: &str = r#"{
        "provider": {"name": "Counter-Strike: Global Offensive", "appid": 730, "version": 14000, "steamid": "76561198000000001", "timestamp": 1700000000},
        "map": {"mode": "competitive", "name": "de_mirage", "phase": "live", "round": 4, "team_ct": {"score": 2}},
        "round": {"phase": "live"},
        "player": {
            "steamid": "76561198000000001", "name": "alice", "team": "CT", "activity": "playing",
            "state": {"health": 87, "armor": 100, "helmet": true, "flashed": 0, "money": 3150, "round_kills": 1, "round_killhs": 1, "equip_value": 4700},
            "match_stats": {"kills": 6, "assists": 1, "deaths": 2, "mvps": 1, "score": 15},
            "weapons": {
                "weapon_0": {"name": "weapon_knife", "paintkit": "default", "type": "Knife", "state": "holstered"},
                "weapon_1": {"name": "weapon_m4a1", "paintkit": "cu_m4a1_howling", "type": "Rifle", "ammo_clip": 17, "ammo_clip_max": 20, "ammo_reserve": 60, "state": "active"}
            }
        }
    }"#;

    #[test]
    fn decodes_a_live_snapshot() {
        let snapshot: Snapshot = serde_json::from_str(LIVE_SNAPSHOT).unwrap();
        let ctx = snapshot.context().expect("complete snapshot");

        assert_eq!(ctx.timestamp, 1700000000);
        assert_eq!(ctx.map.round, 4);
        assert_eq!(ctx.player.state.money, 3150);
        assert_eq!(ctx.player.match_stats.kills, 6);

        let weapon = ctx.player.active_weapon().unwrap();
        assert_eq!(weapon.name, "weapon_m4a1");
        assert_eq!(weapon.kind, "Rifle");
        assert_eq!(weapon.ammo_clip, Some(17));
    }

    #[test]
    fn menu_snapshot_has_no_context() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"provider": {"timestamp": 1700000000}, "player": {"steamid": "1", "activity": "menu"}}"#,
        )
        .unwrap();
        assert!(snapshot.context().is_none());
    }

    #[test]
    fn negative_scoreboard_decodes() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{
                "map": {"mode": "competitive", "name": "de_vertigo", "phase": "live", "round": 2},
                "round": {"phase": "live"},
                "player": {
                    "steamid": "s1",
                    "state": {"round_kills": -1, "round_killhs": 0},
                    "match_stats": {"kills": -1, "assists": 0, "deaths": 1, "mvps": 0, "score": -2}
                }
            }"#,
        )
        .unwrap();
        let ctx = snapshot.context().expect("complete snapshot");
        assert_eq!(ctx.player.match_stats.kills, -1);
        assert_eq!(ctx.player.match_stats.score, -2);
        assert_eq!(ctx.player.state.round_kills, -1);
    }

    #[test]
    fn missing_provider_defaults_timestamp() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"map": {"name": "de_nuke"}, "round": {}, "player": {"steamid": "1"}}"#,
        )
        .unwrap();
        assert_eq!(snapshot.context().unwrap().timestamp, 0);
    }
}
