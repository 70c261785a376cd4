//! Snapshot payload types.
//!
//! The server describes the entities currently in a client's view as a list
//! of sparse payloads. Every field except the id is optional, and an absent
//! field means "unchanged" to the receiver. Sub-fields are sparse too: a
//! `position` carrying only `x` moves the entity along x and leaves y/z.
//!
//! Decoding is lenient. A field of the wrong type reads as absent, and an
//! entry that is not an object reads as an entry without an id, so one bad
//! entry never costs the rest of the snapshot.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::math::Vec3;

/// Resolves one field by presence: the incoming value wins when it exists.
pub fn merge<T>(current: T, incoming: Option<T>) -> T {
    incoming.unwrap_or(current)
}

/// Reads one optional field, treating a value of the wrong type as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Decodes each entry on its own; an undecodable entry becomes an id-less
/// payload that reconciliation skips.
fn lenient_entries<'de, D>(deserializer: D) -> Result<Option<Vec<EntityPayload>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<Value>> = lenient(deserializer)?;
    let Some(entries) = entries else {
        return Ok(None);
    };
    let payloads = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            EntityPayload::deserialize(entry).unwrap_or_else(|e| {
                warn!(index, error = %e, "Entity entry is not an object");
                EntityPayload::default()
            })
        })
        .collect();
    Ok(Some(payloads))
}

/// Point-in-time authoritative description of the entities in view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// `None` and an empty list mean the same thing: nothing is in view.
    #[serde(
        default,
        deserialize_with = "lenient_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub entities: Option<Vec<EntityPayload>>,
}

impl StateSnapshot {
    pub fn new(entities: Vec<EntityPayload>) -> Self {
        Self {
            entities: Some(entities),
        }
    }

    /// Payloads in the order the server listed them.
    pub fn entities(&self) -> &[EntityPayload] {
        self.entities.as_deref().unwrap_or(&[])
    }
}

/// Coarse classification used by type-filtered queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Ship,
    Structure,
    Celestial,
    Projectile,
    /// Anything the client does not recognise.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Sparse state for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3Payload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Vec3Payload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthPayload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ship: Option<ShipPayload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
    /// Id of the entity this one is targeting. Not merged: absent means
    /// "no target".
    #[serde(default, deserialize_with = "lenient")]
    pub target: Option<String>,
    /// Keys the client does not model, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityPayload {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// The id, if present and non-empty.
    pub fn entity_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Some(Vec3Payload::full(Vec3::new(x, y, z)));
        self
    }

    pub fn with_velocity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.velocity = Some(Vec3Payload::full(Vec3::new(x, y, z)));
        self
    }

    pub fn with_health(mut self, health: HealthPayload) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_ship(mut self, ship_type: &str, faction: &str) -> Self {
        self.ship = Some(ShipPayload {
            ship_type: Some(ship_type.to_string()),
            faction: Some(faction.to_string()),
        });
        self
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Sparse vector: each axis is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Payload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl Vec3Payload {
    pub fn full(v: Vec3) -> Self {
        Self {
            x: Some(v.x),
            y: Some(v.y),
            z: Some(v.z),
        }
    }

    pub fn merge_into(&self, current: Vec3) -> Vec3 {
        Vec3::new(
            merge(current.x, self.x),
            merge(current.y, self.y),
            merge(current.z, self.z),
        )
    }
}

/// Sparse vitals. The `*_max` fields are optional capacity hints; when the
/// server sends them, percentages are computed against them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub shield: Option<f32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub armor: Option<f32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub hull: Option<f32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub shield_max: Option<f32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub armor_max: Option<f32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub hull_max: Option<f32>,
}

/// Sparse ship descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipPayload {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub ship_type: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub faction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_entity_list_reads_as_empty() {
        let snap: StateSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snap.entities.is_none());
        assert!(snap.entities().is_empty());

        let snap: StateSnapshot = serde_json::from_str(r#"{"entities":null}"#).unwrap();
        assert!(snap.entities().is_empty());
    }

    #[test]
    fn sparse_payload_parses() {
        let json = r#"{
            "entities": [
                {"id": "ship-1", "position": {"x": 4.0}, "ship": {"type": "Frigate"},
                 "kind": "ship", "target": null},
                {"position": {"x": 1.0, "y": 2.0, "z": 3.0}},
                {"id": "rock", "kind": "asteroid"}
            ]
        }"#;
        let snap: StateSnapshot = serde_json::from_str(json).unwrap();
        let ents = snap.entities();
        assert_eq!(ents.len(), 3);

        assert_eq!(ents[0].entity_id(), Some("ship-1"));
        let pos = ents[0].position.unwrap();
        assert_eq!(pos.x, Some(4.0));
        assert_eq!(pos.y, None);
        assert_eq!(
            ents[0].ship.as_ref().and_then(|s| s.ship_type.as_deref()),
            Some("Frigate")
        );
        assert_eq!(ents[0].kind, Some(EntityKind::Ship));
        assert_eq!(ents[0].target, None);

        assert_eq!(ents[1].entity_id(), None);
        assert_eq!(ents[2].kind, Some(EntityKind::Unknown));
    }

    #[test]
    fn bad_entries_degrade_without_losing_neighbours() {
        let json = r#"{
            "entities": [
                {"id": 7, "position": {"x": 1.0}},
                {"id": "bad", "position": {"x": "fast", "y": 2.0}, "health": "full"},
                "not an object",
                {"id": "good", "position": {"x": 1.0}, "kind": 3, "target": 12}
            ]
        }"#;
        let snap: StateSnapshot = serde_json::from_str(json).unwrap();
        let ents = snap.entities();
        assert_eq!(ents.len(), 4);

        assert_eq!(ents[0].entity_id(), None);

        assert_eq!(ents[1].entity_id(), Some("bad"));
        let pos = ents[1].position.unwrap();
        assert_eq!(pos.x, None);
        assert_eq!(pos.y, Some(2.0));
        assert_eq!(ents[1].health, None);

        assert_eq!(ents[2], EntityPayload::default());

        assert_eq!(ents[3].entity_id(), Some("good"));
        assert_eq!(ents[3].position.unwrap().x, Some(1.0));
        assert_eq!(ents[3].kind, None);
        assert_eq!(ents[3].target, None);
    }

    #[test]
    fn wrongly_typed_entity_list_reads_as_empty() {
        let snap: StateSnapshot = serde_json::from_str(r#"{"entities": 5}"#).unwrap();
        assert!(snap.entities().is_empty());
    }

    #[test]
    fn unmodelled_keys_are_kept() {
        let payload: EntityPayload =
            serde_json::from_str(r#"{"id":"a","shipyard":"Jita","cargo":[1,2]}"#).unwrap();
        assert_eq!(payload.entity_id(), Some("a"));
        assert_eq!(payload.extra.len(), 2);
        assert_eq!(payload.extra["shipyard"], "Jita");
        assert_eq!(payload.extra["cargo"], serde_json::json!([1, 2]));
        assert!(!payload.extra.contains_key("id"));
    }

    #[test]
    fn empty_id_counts_as_missing() {
        assert_eq!(EntityPayload::new("").entity_id(), None);
    }

    #[test]
    fn merge_prefers_incoming() {
        assert_eq!(merge(1.0, Some(2.0)), 2.0);
        assert_eq!(merge(1.0, None), 1.0);

        let partial = Vec3Payload {
            y: Some(9.0),
            ..Default::default()
        };
        assert_eq!(
            partial.merge_into(Vec3::new(1.0, 2.0, 3.0)),
            Vec3::new(1.0, 9.0, 3.0)
        );
    }
}
