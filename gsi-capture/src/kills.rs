use std::collections::HashMap;

use crate::events::{ActiveGun, KillEvent};
use crate::snapshot::SnapshotContext;

/// Turns increases of the cumulative kill counter into kill events.
///
/// Counters live as long as the process and are not reset on a match
/// boundary: a player whose new match starts below their previous total
/// produces no kill events until they pass it again. The same holds for a
/// counter that drops, including below zero after a team kill or suicide.
#[derive(Debug, Default)]
pub struct KillDeltaDetector {
    counters: HashMap<String, i32>,
}

impl KillDeltaDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_kills(&self, steamid: &str) -> Option<i32> {
        self.counters.get(steamid).copied()
    }

    pub fn detect(&mut self, match_id: &str, snapshot: &SnapshotContext<'_>) -> Vec<KillEvent> {
        let player = snapshot.player;
        let current = player.match_stats.kills;
        let prev = self.last_kills(&player.steamid).unwrap_or_default();
        if current <= prev {
            return Vec::new();
        }

        // The per-round headshot counter is all the client reports, so every
        // kill revealed by this snapshot shares the same flag.
        let headshot = player.state.round_killhs > 0;
        let active_gun = match player.active_weapon() {
            Some(weapon) => ActiveGun::from_weapon(weapon, headshot),
            None => ActiveGun::default(),
        };

        let events = (prev + 1..=current)
            .map(|kill_number| KillEvent {
                match_id: match_id.to_owned(),
                round: snapshot.map.round,
                map: snapshot.map.name.clone(),
                team: player.team.clone(),
                steamid: player.steamid.clone(),
                name: player.name.clone(),
                mode: snapshot.map.mode.clone(),
                active_gun: active_gun.clone(),
                timestamp: snapshot.timestamp,
                kill_number,
            })
            .collect();

        self.counters.insert(player.steamid.clone(), current);
        events
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::snapshot::Snapshot;

    fn snapshot(steamid: &str, kills: i32, round_killhs: i32, ts: i64, weapon: &str) -> Snapshot {
        serde_json::from_value(json!({
            "provider": {"timestamp": ts},
            "map": {"mode": "competitive", "name": "de_dust2", "phase": "live", "round": 3},
            "round": {"phase": "live"},
            "player": {
                "steamid": steamid, "name": "alice", "team": "CT",
                "state": {"round_killhs": round_killhs},
                "match_stats": {"kills": kills},
                "weapons": {
                    "weapon_0": {"name": "weapon_knife", "type": "Knife", "state": "holstered"},
                    "weapon_1": {"name": weapon, "type": "Rifle", "paintkit": "default", "ammo_clip": 25, "ammo_reserve": 60, "state": "active"}
                }
            }
        }))
        .unwrap()
    }

    fn detect(detector: &mut KillDeltaDetector, snapshot: &Snapshot) -> Vec<KillEvent> {
        detector.detect("m1", &snapshot.context().unwrap())
    }

    #[test]
    fn kill_deltas() {
        let mut detector = KillDeltaDetector::new();

        let first = detect(&mut detector, &snapshot("s1", 3, 1, 100, "weapon_ak47"));
        assert_eq!(
            first.iter().map(|k| k.kill_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(detector.last_kills("s1"), Some(3));

        let same = detect(&mut detector, &snapshot("s1", 3, 1, 101, "weapon_ak47"));
        assert!(same.is_empty());
        assert_eq!(detector.last_kills("s1"), Some(3));

        let more = detect(&mut detector, &snapshot("s1", 5, 0, 102, "weapon_awp"));
        assert_eq!(
            more.iter().map(|k| k.kill_number).collect::<Vec<_>>(),
            vec![4, 5]
        );
        for kill in &more {
            assert_eq!(kill.active_gun.name, "weapon_awp");
            assert_eq!(kill.timestamp, 102);
            assert!(!kill.active_gun.headshot);
        }
        assert_eq!(detector.last_kills("s1"), Some(5));
    }

    #[test]
    fn stamps_the_active_weapon() {
        let mut detector = KillDeltaDetector::new();
        let kills = detect(&mut detector, &snapshot("s1", 1, 1, 100, "weapon_m4a1"));

        assert_eq!(
            kills[0].active_gun,
            ActiveGun {
                name: "weapon_m4a1".into(),
                kind: "Rifle".into(),
                ammo: 25,
                reserve: 60,
                skin: "default".into(),
                headshot: true,
            }
        );
        assert_eq!(kills[0].round, 3);
        assert_eq!(kills[0].map, "de_dust2");
        assert_eq!(kills[0].match_id, "m1");
    }

    #[test]
    fn no_active_weapon_gives_an_empty_gun() {
        let mut detector = KillDeltaDetector::new();
        let snapshot: Snapshot = serde_json::from_value(json!({
            "map": {"name": "de_dust2", "round": 2},
            "round": {},
            "player": {"steamid": "s1", "match_stats": {"kills": 1}}
        }))
        .unwrap();

        let kills = detect(&mut detector, &snapshot);
        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].active_gun, ActiveGun::default());
    }

    #[test]
    fn counters_are_per_player() {
        let mut detector = KillDeltaDetector::new();
        detect(&mut detector, &snapshot("s1", 4, 0, 100, "weapon_ak47"));

        let other = detect(&mut detector, &snapshot("s2", 2, 0, 100, "weapon_ak47"));
        assert_eq!(other.len(), 2);
        assert_eq!(detector.last_kills("s1"), Some(4));
        assert_eq!(detector.last_kills("s2"), Some(2));
    }

    #[test]
    fn lower_counter_is_ignored_and_kept() {
        let mut detector = KillDeltaDetector::new();
        detect(&mut detector, &snapshot("s1", 20, 0, 100, "weapon_ak47"));

        // Next match on a fresh scoreboard
        assert!(detect(&mut detector, &snapshot("s1", 2, 0, 200, "weapon_ak47")).is_empty());
        assert_eq!(detector.last_kills("s1"), Some(20));

        let kills = detect(&mut detector, &snapshot("s1", 21, 0, 300, "weapon_ak47"));
        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].kill_number, 21);
    }

    #[test]
    fn negative_counter_is_ignored() {
        let mut detector = KillDeltaDetector::new();

        // Team kill before the first frag
        assert!(detect(&mut detector, &snapshot("s1", -1, 0, 100, "weapon_ak47")).is_empty());
        assert_eq!(detector.last_kills("s1"), None);

        let kills = detect(&mut detector, &snapshot("s1", 1, 0, 101, "weapon_ak47"));
        assert_eq!(
            kills.iter().map(|k| k.kill_number).collect::<Vec<_>>(),
            vec![1]
        );

        // A later penalty keeps the highest count seen
        assert!(detect(&mut detector, &snapshot("s1", -2, 0, 102, "weapon_ak47")).is_empty());
        assert_eq!(detector.last_kills("s1"), Some(1));
    }
}
