//! Time based interpolation curves used to animate overlay opacity and scale.
//!
//! A curve is started at an instant and then sampled with later instants.
//! Progress is `(now - start) / duration` and is deliberately left
//! unclamped: callers stop sampling once the owning phase has ended.

use std::time::{Duration, Instant};

use glam::Vec2;

/// Shape of an [`EasingCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EasingKind {
    /// Slow start and slow end.
    InOutCubic,
    /// Fast start decelerating into the end point.
    OutCubic,
}

impl EasingKind {
    /// Applies the easing function to a normalised progress value.
    pub fn apply(self, t: f64) -> f64 {
        match self {
            EasingKind::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            EasingKind::OutCubic => 1.0 - (1.0 - t).powi(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EasingCurve {
    kind: EasingKind,
    duration: Duration,
    started_at: Option<Instant>,
    from: Vec2,
    to: Vec2,
}

impl EasingCurve {
    pub fn new(kind: EasingKind, duration: Duration) -> Self {
        Self {
            kind,
            duration,
            started_at: None,
            from: Vec2::ZERO,
            to: Vec2::ONE,
        }
    }

    /// Sets the two points [`EasingCurve::point_at`] interpolates between.
    pub fn with_points(mut self, from: Vec2, to: Vec2) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Convenience constructor returning a curve already started at `now`.
    pub fn started(kind: EasingKind, duration: Duration, now: Instant) -> Self {
        let mut curve = Self::new(kind, duration);
        curve.start(now);
        curve
    }

    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    pub fn kind(&self) -> EasingKind {
        self.kind
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Raw progress through the curve. Zero before the curve is started.
    pub fn progress_at(&self, now: Instant) -> f64 {
        let Some(start) = self.started_at else {
            return 0.0;
        };
        if self.duration.is_zero() {
            return 1.0;
        }
        now.saturating_duration_since(start).as_secs_f64() / self.duration.as_secs_f64()
    }

    /// Eased value for `now`. Not clamped past 1.0.
    pub fn value_at(&self, now: Instant) -> f64 {
        self.kind.apply(self.progress_at(now))
    }

    /// Point between the configured endpoints for `now`.
    pub fn point_at(&self, now: Instant) -> Vec2 {
        self.from.lerp(self.to, self.value_at(now) as f32)
    }
}
