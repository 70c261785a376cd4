//! `space_client`
//!
//! Client-side systems:
//! - Entity registry reconciled from authoritative snapshots
//! - Per-entity linear interpolation between snapshot arrivals
//! - Membership notifications (log lines plus a drainable queue)
//! - Connection management (reliable + unreliable channels)
//! - Rendering abstraction (read-only)
//!
//! No client-side prediction: the server owns every position.

pub mod client;
pub mod entity;
pub mod events;
pub mod interp;
pub mod manager;
pub mod render;

pub use client::GameClient;
pub use entity::Entity;
pub use manager::EntityManager;
