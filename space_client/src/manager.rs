//! Entity registry.
//!
//! `EntityManager` owns every entity the client knows about and keeps that
//! set in step with the server:
//! - An id is created the first time a snapshot lists it.
//! - It is updated in place by every later snapshot that lists it.
//! - It is removed by the first snapshot that omits it. Presence is the only
//!   liveness signal; an empty or absent list removes everything.
//!
//! All methods take `&mut self` or `&self` and run to completion, so a frame
//! never interpolates a registry that is halfway through a reconcile.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use space_shared::{
    config::DEFAULT_INTERPOLATION_WINDOW_MS,
    math::Vec3,
    snapshot::{EntityKind, StateSnapshot},
};
use tracing::{debug, info, warn};

use crate::{
    entity::{Entity, HealthPercentage},
    events::{EntityEvent, EventQueue},
};

/// What one reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Payloads dropped for lacking an id.
    pub skipped: usize,
}

/// Registry of live entities for one client session.
#[derive(Debug)]
pub struct EntityManager {
    entities: HashMap<String, Entity>,
    player_id: Option<String>,
    interpolation_window: Duration,
    events: EventQueue,
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_INTERPOLATION_WINDOW_MS))
    }
}

impl EntityManager {
    /// Creates an empty registry. `interpolation_window` applies to every
    /// entity created from now on.
    pub fn new(interpolation_window: Duration) -> Self {
        Self {
            entities: HashMap::new(),
            player_id: None,
            interpolation_window,
            events: EventQueue::default(),
        }
    }

    pub fn interpolation_window(&self) -> Duration {
        self.interpolation_window
    }

    /// Marks which entity is the locally controlled one.
    pub fn set_player_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.player_id.as_deref() == Some(id.as_str()) {
            return;
        }
        info!(player_id = %id, previous = ?self.player_id, "Player entity assigned");
        self.player_id = Some(id);
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    /// The player's entity, if an id is set and that entity is live.
    pub fn player_entity(&self) -> Option<&Entity> {
        self.player_id
            .as_deref()
            .and_then(|id| self.entities.get(id))
    }

    /// Reconciles the registry against one authoritative snapshot.
    ///
    /// Payloads apply in list order. A payload without an id is skipped with
    /// a warning; nothing in a snapshot is ever fatal.
    pub fn update_from_state(
        &mut self,
        snapshot: &StateSnapshot,
        now: Instant,
    ) -> ReconcileSummary {
        let payloads = snapshot.entities();
        let mut summary = ReconcileSummary::default();
        let mut seen: HashSet<&str> = HashSet::with_capacity(payloads.len());

        for (index, payload) in payloads.iter().enumerate() {
            let Some(id) = payload.entity_id() else {
                warn!(index, "Skipping entity payload without id");
                summary.skipped += 1;
                continue;
            };
            seen.insert(id);

            match self.entities.get_mut(id) {
                Some(entity) => {
                    entity.apply_update(payload, now);
                    summary.updated += 1;
                }
                None => {
                    let entity = Entity::new(id, payload, self.interpolation_window, now);
                    info!(
                        id = %id,
                        kind = ?entity.kind(),
                        ship_type = %entity.ship_type(),
                        "Entity spawned"
                    );
                    self.entities.insert(id.to_string(), entity);
                    self.events.push(EntityEvent::Spawned {
                        id: id.to_string(),
                    });
                    summary.created += 1;
                }
            }
        }

        let gone: Vec<String> = self
            .entities
            .keys()
            .filter(|id| !seen.contains(id.as_str()))
            .cloned()
            .collect();
        for id in gone {
            self.entities.remove(&id);
            info!(id = %id, "Entity removed");
            self.events.push(EntityEvent::Removed { id });
            summary.removed += 1;
        }

        debug!(
            created = summary.created,
            updated = summary.updated,
            removed = summary.removed,
            skipped = summary.skipped,
            live = self.entities.len(),
            "Snapshot reconciled"
        );
        summary
    }

    /// Advances every entity's displayed position to `now`.
    pub fn update_interpolation(&mut self, now: Instant) {
        for entity in self.entities.values_mut() {
            entity.interpolate(now);
        }
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Live registry. Iteration order is not stable between calls.
    pub fn entities(&self) -> &HashMap<String, Entity> {
        &self.entities
    }

    /// Entities whose classification matches `kind`.
    pub fn entities_by_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values().filter(move |e| e.kind() == kind)
    }

    /// Displayed position of `id`.
    pub fn position(&self, id: &str) -> Option<Vec3> {
        self.entities.get(id).map(Entity::position)
    }

    pub fn health_percentage(&self, id: &str) -> Option<HealthPercentage> {
        self.entities.get(id).map(Entity::health_percentage)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Empties the registry and forgets the player id; used when a session
    /// ends.
    ///
    /// Dropping the player id goes further than a bare registry flush. A
    /// later session starts unassigned until its own `Welcome` or
    /// `AssignPlayer` names the player's entity, instead of adopting an id
    /// that belonged to the previous session.
    pub fn clear(&mut self) {
        let count = self.entities.len();
        self.entities.clear();
        self.player_id = None;
        info!(count, "Entity registry cleared");
        self.events.push(EntityEvent::Cleared { count });
    }

    /// Takes the notifications queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<EntityEvent> {
        self.events.drain()
    }
}
