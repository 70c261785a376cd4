//! Client-side view of one simulated object.
//!
//! An `Entity` holds the latest authoritative state received from the server
//! plus the interpolation state used to display it. Fields are private; the
//! only way to change them is [`Entity::apply_update`], which merges a sparse
//! payload by presence.

use std::time::{Duration, Instant};

use space_shared::{
    math::Vec3,
    snapshot::{merge, EntityKind, EntityPayload, HealthPayload, ShipPayload},
};

use crate::interp::InterpolationTrack;

/// Placeholder capacity used for a gauge whose maximum the server has not
/// sent. Percentages computed against it are approximate.
pub const NOMINAL_MAX_HEALTH: f32 = 1000.0;

/// Default for descriptive strings the server has not sent.
pub const UNKNOWN: &str = "Unknown";

/// Shield/armor/hull gauges with optional server-supplied maxima.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vitals {
    pub shield: f32,
    pub armor: f32,
    pub hull: f32,
    pub shield_max: Option<f32>,
    pub armor_max: Option<f32>,
    pub hull_max: Option<f32>,
}

impl Vitals {
    fn merged(self, incoming: &HealthPayload) -> Self {
        Self {
            shield: merge(self.shield, incoming.shield),
            armor: merge(self.armor, incoming.armor),
            hull: merge(self.hull, incoming.hull),
            shield_max: incoming.shield_max.or(self.shield_max),
            armor_max: incoming.armor_max.or(self.armor_max),
            hull_max: incoming.hull_max.or(self.hull_max),
        }
    }
}

/// Gauge fractions, each in $[0,1]$.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthPercentage {
    pub shield: f32,
    pub armor: f32,
    pub hull: f32,
}

fn gauge_fraction(value: f32, max: Option<f32>) -> f32 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    let max = max
        .filter(|m| m.is_finite() && *m > 0.0)
        .unwrap_or(NOMINAL_MAX_HEALTH);
    (value / max).clamp(0.0, 1.0)
}

/// One object known to the client.
#[derive(Debug, Clone)]
pub struct Entity {
    id: String,
    track: InterpolationTrack,
    velocity: Vec3,
    vitals: Vitals,
    ship_type: String,
    faction: String,
    kind: EntityKind,
    target_id: Option<String>,
    raw: EntityPayload,
}

impl Entity {
    /// Builds an entity from its first payload. Missing fields take their
    /// defaults and the entity starts at rest on its initial position.
    pub fn new(
        id: impl Into<String>,
        payload: &EntityPayload,
        window: Duration,
        now: Instant,
    ) -> Self {
        let position = payload
            .position
            .map_or(Vec3::ZERO, |p| p.merge_into(Vec3::ZERO));
        let ship = payload.ship.as_ref();

        Self {
            id: id.into(),
            track: InterpolationTrack::new(position, window, now),
            velocity: payload
                .velocity
                .map_or(Vec3::ZERO, |v| v.merge_into(Vec3::ZERO)),
            vitals: payload
                .health
                .map_or_else(Vitals::default, |h| Vitals::default().merged(&h)),
            ship_type: ship
                .and_then(|s| s.ship_type.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            faction: ship
                .and_then(|s| s.faction.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            kind: payload.kind.unwrap_or_default(),
            target_id: payload.target.clone(),
            raw: payload.clone(),
        }
    }

    /// Merges a newer payload into this entity.
    ///
    /// The displayed position becomes the new interpolation anchor and the
    /// blend restarts at `now`, even when the payload carries no position.
    /// Every field group is merged by presence except the target reference,
    /// which is replaced outright.
    pub fn apply_update(&mut self, payload: &EntityPayload, now: Instant) {
        let target = match payload.position {
            Some(p) => p.merge_into(self.track.target()),
            None => self.track.target(),
        };
        self.track.retarget(target, now);

        if let Some(v) = payload.velocity {
            self.velocity = v.merge_into(self.velocity);
        }
        if let Some(h) = payload.health {
            self.vitals = self.vitals.merged(&h);
        }
        if let Some(ship) = payload.ship.as_ref() {
            self.merge_ship(ship);
        }
        self.kind = merge(self.kind, payload.kind);
        self.target_id = payload.target.clone();
        self.raw = payload.clone();
    }

    fn merge_ship(&mut self, ship: &ShipPayload) {
        if let Some(ship_type) = &ship.ship_type {
            self.ship_type.clone_from(ship_type);
        }
        if let Some(faction) = &ship.faction {
            self.faction.clone_from(faction);
        }
    }

    /// Recomputes and returns the displayed position for `now`.
    pub fn interpolate(&mut self, now: Instant) -> Vec3 {
        self.track.sample(now)
    }

    pub fn health_percentage(&self) -> HealthPercentage {
        let v = &self.vitals;
        HealthPercentage {
            shield: gauge_fraction(v.shield, v.shield_max),
            armor: gauge_fraction(v.armor, v.armor_max),
            hull: gauge_fraction(v.hull, v.hull_max),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Displayed (interpolated) position.
    pub fn position(&self) -> Vec3 {
        self.track.current()
    }

    pub fn previous_position(&self) -> Vec3 {
        self.track.previous()
    }

    /// Latest authoritative position.
    pub fn target_position(&self) -> Vec3 {
        self.track.target()
    }

    /// Informational only; the displayed position is never extrapolated.
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    pub fn ship_type(&self) -> &str {
        &self.ship_type
    }

    pub fn faction(&self) -> &str {
        &self.faction
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Entity this one is targeting. Not checked against the registry.
    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    pub fn last_update(&self) -> Instant {
        self.track.last_update()
    }

    pub fn interpolation_window(&self) -> Duration {
        self.track.window()
    }

    /// The most recent payload exactly as received.
    pub fn raw(&self) -> &EntityPayload {
        &self.raw
    }
}
