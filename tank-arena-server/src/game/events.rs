//! Game Events
//!
//! Immutable records of world mutations, written to the replay log and
//! broadcast to spectators.
//!
//! ## Wire Format
//!
//! Every event is one JSON object tagged by `type` and stamped with `t`
//! (milliseconds since the simulation started):
//!
//! ```text
//! {"t":0,"type":"MapCrt","x_len":15,"y_len":15,"blocks":[[0,0],...]}
//! {"t":0,"type":"EleCrt","uid":57,"name":"Tank","player":"alice","x":3.5,"y":7.25,"rad":0.0,"width":0.6,"height":0.8}
//! {"t":40,"type":"EleUpd","uid":57,"y":7.33}
//! {"t":960,"type":"EleRmv","uid":57}
//! ```
//!
//! Update events carry only the fields that changed.

use serde::{Serialize, Deserialize};

use crate::core::numeric::to_event_fixed;
use crate::game::element::{ElementId, GameElement};
use crate::game::map::GameMap;
use crate::geometry::Collidable;

/// Which fields an update event carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct UpdateMask {
    /// Hit points
    pub hp: bool,
    /// X coordinate of the base footprint center
    pub x: bool,
    /// Y coordinate of the base footprint center
    pub y: bool,
    /// Rotation
    pub rad: bool,
}

impl UpdateMask {
    /// Only hit points.
    pub const HP: Self = Self { hp: true, x: false, y: false, rad: false };

    /// Any field selected.
    #[inline]
    pub fn any(&self) -> bool {
        self.hp || self.x || self.y || self.rad
    }
}

/// Event payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEventData {
    /// Static map snapshot at simulation start
    #[serde(rename = "MapCrt")]
    WorldInit {
        /// Grid width
        x_len: usize,
        /// Grid height
        y_len: usize,
        /// Block cells
        blocks: Vec<[i64; 2]>,
    },

    /// Element entered the world
    #[serde(rename = "EleCrt")]
    EntitySpawn {
        /// Element id
        uid: ElementId,
        /// Display name
        name: String,
        /// Owning player (tanks only)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<String>,
        /// Base center x
        x: f64,
        /// Base center y
        y: f64,
        /// Rotation
        rad: f64,
        /// Base footprint width
        width: f64,
        /// Base footprint height
        height: f64,
    },

    /// Some fields of an element changed
    #[serde(rename = "EleUpd")]
    EntityUpdate {
        /// Element id
        uid: ElementId,
        /// Hit points
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hp: Option<i32>,
        /// Base center x
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        /// Base center y
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        /// Rotation
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rad: Option<f64>,
    },

    /// Element left the world
    #[serde(rename = "EleRmv")]
    EntityRemoved {
        /// Element id
        uid: ElementId,
    },
}

/// A timestamped event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Simulation time in milliseconds
    pub t: u64,
    /// Emission order, tie-breaker for equal timestamps
    #[serde(skip)]
    pub seq: u64,
    /// Payload
    #[serde(flatten)]
    pub data: GameEventData,
}

impl GameEvent {
    /// Sort key: timestamp, then emission order.
    #[inline]
    pub fn order_key(&self) -> (u64, u64) {
        (self.t, self.seq)
    }

    /// Serialize to one JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire tag of this event's kind.
    pub fn tag(&self) -> &'static str {
        match self.data {
            GameEventData::WorldInit { .. } => "MapCrt",
            GameEventData::EntitySpawn { .. } => "EleCrt",
            GameEventData::EntityUpdate { .. } => "EleUpd",
            GameEventData::EntityRemoved { .. } => "EleRmv",
        }
    }
}

impl GameEventData {
    /// Snapshot of the static map.
    pub fn world_init(map: &GameMap) -> Self {
        let snapshot = map.snapshot();
        GameEventData::WorldInit {
            x_len: snapshot.x_len,
            y_len: snapshot.y_len,
            blocks: snapshot.blocks,
        }
    }

    /// Spawn record for an element.
    pub fn spawn(element: &GameElement) -> Self {
        let center = element.position();
        GameEventData::EntitySpawn {
            uid: element.id,
            name: element.serial_name().to_string(),
            player: element.player_name().map(str::to_string),
            x: to_event_fixed(center.x),
            y: to_event_fixed(center.y),
            rad: to_event_fixed(element.shape.angle()),
            width: to_event_fixed(element.shape.width()),
            height: to_event_fixed(element.shape.height()),
        }
    }

    /// Update record carrying the masked fields of an element.
    pub fn update(element: &GameElement, mask: UpdateMask) -> Self {
        let center = element.position();
        GameEventData::EntityUpdate {
            uid: element.id,
            hp: mask.hp.then_some(element.hp),
            x: mask.x.then(|| to_event_fixed(center.x)),
            y: mask.y.then(|| to_event_fixed(center.y)),
            rad: mask.rad.then(|| to_event_fixed(element.shape.angle())),
        }
    }

    /// Removal record.
    pub fn removed(uid: ElementId) -> Self {
        GameEventData::EntityRemoved { uid }
    }
}

/// Ordered buffer of events awaiting collection.
///
/// Assigns emission sequence numbers; timestamps are supplied by the
/// caller from the monotonic simulation clock.
#[derive(Debug, Default)]
pub struct EventLog {
    pending: Vec<GameEvent>,
    next_seq: u64,
    last_t: u64,
}

impl EventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event at time `t`.
    ///
    /// A timestamp earlier than the last one is raised to it, so the log
    /// never goes backwards.
    pub fn push(&mut self, t: u64, data: GameEventData) {
        let t = t.max(self.last_t);
        self.last_t = t;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(GameEvent { t, seq, data });
    }

    /// Events not yet taken.
    pub fn pending(&self) -> &[GameEvent] {
        &self.pending
    }

    /// Take all pending events in emission order.
    pub fn take(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::element::{BulletConfig, TankConfig, WeaponConfig};
    use serde_json::Value;

    fn tank() -> GameElement {
        GameElement::tank(
            ElementId(7),
            "alice",
            Vec2::new(3.14159, 2.0),
            &TankConfig::default(),
            &WeaponConfig::default(),
            &BulletConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_spawn_json() {
        let event = GameEvent { t: 12, seq: 0, data: GameEventData::spawn(&tank()) };
        let v: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "EleCrt");
        assert_eq!(v["t"], 12);
        assert_eq!(v["uid"], 7);
        assert_eq!(v["name"], "Tank");
        assert_eq!(v["player"], "alice");
        assert_eq!(v["x"], 3.142);
        assert_eq!(v["width"], 0.6);
        assert!(v.get("seq").is_none());
    }

    #[test]
    fn test_block_spawn_has_no_player() {
        let block = GameElement::block(ElementId(3), 1, 2);
        let event = GameEvent { t: 0, seq: 0, data: GameEventData::spawn(&block) };
        let v: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert!(v.get("player").is_none());
        assert_eq!(v["x"], 1.5);
        assert_eq!(v["y"], 2.5);
    }

    #[test]
    fn test_update_carries_only_masked_fields() {
        let mask = UpdateMask { hp: false, x: false, y: true, rad: false };
        let event = GameEvent { t: 40, seq: 3, data: GameEventData::update(&tank(), mask) };
        let v: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        let obj = v.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["t", "type", "uid", "y"]);
        assert_eq!(v["y"], 2.0);
    }

    #[test]
    fn test_removed_and_round_trip() {
        let event = GameEvent { t: 99, seq: 0, data: GameEventData::removed(ElementId(5)) };
        let json = event.to_json().unwrap();
        assert_eq!(event.tag(), "EleRmv");

        let back: GameEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.t, 99);
        assert_eq!(back.data, GameEventData::removed(ElementId(5)));
    }

    #[test]
    fn test_log_keeps_order() {
        let mut log = EventLog::new();
        log.push(10, GameEventData::removed(ElementId(1)));
        log.push(10, GameEventData::removed(ElementId(2)));
        log.push(5, GameEventData::removed(ElementId(3)));
        log.push(20, GameEventData::removed(ElementId(4)));

        let events = log.take();
        assert!(log.pending().is_empty());
        let keys: Vec<(u64, u64)> = events.iter().map(|e| e.order_key()).collect();
        assert_eq!(keys, vec![(10, 0), (10, 1), (10, 2), (20, 3)]);
        assert!(events.windows(2).all(|w| w[0].t <= w[1].t));
    }
}
