//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend. A
//! renderer only reads the registry: displayed positions, health gauges and
//! which entity is the player's.

use crate::{entity::Entity, manager::EntityManager};

/// A minimal per-frame rendering API.
pub trait RenderBackend {
    fn begin_frame(&mut self);
    fn draw_entity(&mut self, entity: &Entity, is_player: bool);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless runs and tests.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self) {}
    fn draw_entity(&mut self, _entity: &Entity, _is_player: bool) {}
    fn end_frame(&mut self) {}
}

/// Draws every live entity once. Returns how many were drawn.
pub fn render_frame(manager: &EntityManager, backend: &mut dyn RenderBackend) -> usize {
    let player = manager.player_id();
    backend.begin_frame();
    for (id, entity) in manager.entities() {
        backend.draw_entity(entity, player == Some(id.as_str()));
    }
    backend.end_frame();
    manager.len()
}
