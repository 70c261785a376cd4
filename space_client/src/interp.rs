//! Interpolation.
//!
//! The server sends discrete snapshots at its own cadence.
//! The client renders at a higher rate and blends each entity from where it
//! was displayed when a snapshot landed towards the new authoritative
//! position, over a fixed window.

use std::time::{Duration, Instant};

use space_shared::math::Vec3;

/// Fraction of the window that has elapsed, clamped to $[0,1]$.
///
/// A zero window means "snap": the factor is 1 immediately.
pub fn blend_factor(elapsed: Duration, window: Duration) -> f32 {
    if window.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / window.as_secs_f32()).clamp(0.0, 1.0)
}

/// Spatial state of one interpolated object.
#[derive(Debug, Clone)]
pub struct InterpolationTrack {
    previous: Vec3,
    target: Vec3,
    current: Vec3,
    last_update: Instant,
    window: Duration,
}

impl InterpolationTrack {
    /// Starts at rest on `position`.
    pub fn new(position: Vec3, window: Duration, now: Instant) -> Self {
        Self {
            previous: position,
            target: position,
            current: position,
            last_update: now,
            window,
        }
    }

    /// Begins a new blend towards `target`.
    ///
    /// The anchor is the displayed position, not the previous target: a
    /// blend still in progress hands off from wherever it got to.
    pub fn retarget(&mut self, target: Vec3, now: Instant) {
        self.previous = self.current;
        self.target = target;
        self.last_update = now;
    }

    /// Recomputes the displayed position for `now` and returns it.
    pub fn sample(&mut self, now: Instant) -> Vec3 {
        let elapsed = now.saturating_duration_since(self.last_update);
        let t = blend_factor(elapsed, self.window);
        self.current = self.previous.lerp(self.target, t);
        self.current
    }

    pub fn previous(&self) -> Vec3 {
        self.previous
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn current(&self) -> Vec3 {
        self.current
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn factor_clamps() {
        assert_eq!(blend_factor(Duration::ZERO, WINDOW), 0.0);
        assert!((blend_factor(Duration::from_millis(50), WINDOW) - 0.5).abs() < 1e-6);
        assert_eq!(blend_factor(Duration::from_millis(500), WINDOW), 1.0);
        assert_eq!(blend_factor(Duration::from_millis(5), Duration::ZERO), 1.0);
    }

    #[test]
    fn sample_converges_without_overshoot() {
        let t0 = Instant::now();
        let mut track = InterpolationTrack::new(Vec3::ZERO, WINDOW, t0);
        track.retarget(Vec3::new(10.0, 0.0, 0.0), t0);

        let mid = track.sample(t0 + Duration::from_millis(50));
        assert!((mid.x - 5.0).abs() < 1e-4);

        assert_eq!(
            track.sample(t0 + Duration::from_millis(200)),
            Vec3::new(10.0, 0.0, 0.0)
        );
        assert_eq!(
            track.sample(t0 + Duration::from_secs(5)),
            Vec3::new(10.0, 0.0, 0.0)
        );
    }

    #[test]
    fn retarget_anchors_on_displayed_position() {
        let t0 = Instant::now();
        let mut track = InterpolationTrack::new(Vec3::ZERO, WINDOW, t0);
        track.retarget(Vec3::new(10.0, 0.0, 0.0), t0);
        let t1 = t0 + Duration::from_millis(50);
        track.sample(t1);

        track.retarget(Vec3::new(20.0, 0.0, 0.0), t1);
        assert!((track.previous().x - 5.0).abs() < 1e-4);
        assert_eq!(track.target(), Vec3::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn sample_before_last_update_holds_anchor() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(10);
        let mut track = InterpolationTrack::new(Vec3::ZERO, WINDOW, t0);
        track.retarget(Vec3::new(1.0, 1.0, 1.0), t1);
        assert_eq!(track.sample(t0), Vec3::ZERO);
    }
}
