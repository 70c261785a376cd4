//! Configuration system.
//!
//! Loads client configuration from JSON strings/files. Every field has a
//! default, so an empty object `{}` is a valid config.

use std::{path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default blend duration from the pre-update position to a new target.
pub const DEFAULT_INTERPOLATION_WINDOW_MS: u64 = 100;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address, e.g. `127.0.0.1:40000`. Reliable and unreliable
    /// channels share it.
    pub server_addr: String,
    /// Render frame rate driving interpolation.
    pub frame_hz: u32,
    /// Interpolation window applied to every entity, in milliseconds.
    pub interpolation_window_ms: u64,
    /// How long a single snapshot poll waits for a datagram, in milliseconds.
    pub snapshot_poll_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            frame_hz: 60,
            interpolation_window_ms: DEFAULT_INTERPOLATION_WINDOW_MS,
            snapshot_poll_ms: 2,
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn interpolation_window(&self) -> Duration {
        Duration::from_millis(self.interpolation_window_ms)
    }

    pub fn snapshot_poll(&self) -> Duration {
        Duration::from_millis(self.snapshot_poll_ms)
    }

    /// Frame interval; a zero rate falls back to 60 Hz.
    pub fn frame_interval(&self) -> Duration {
        let hz = if self.frame_hz == 0 { 60 } else { self.frame_hz };
        Duration::from_secs_f64(1.0 / f64::from(hz))
    }
}
