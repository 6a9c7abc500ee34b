//! Playback state machine for the overlay.
//!
//! A single [`AnimationScheduler`] owns at most one [`PlaybackSession`].
//! It is shared through [`SchedulerHandle`] so detectors running on host
//! I/O threads go through the same locked check-and-set as the render
//! thread.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use glam::Vec2;

use crate::{
    AudioGate, AudioOutput, DeathScreenError, EasingCurve, EasingKind, PhaseTimings, Result,
    SoundTrigger,
};

/// Scale applied to the foreground image when a session starts.
pub const SCALE_FROM: f32 = 0.95;
/// Scale reached when a session ends.
pub const SCALE_TO: f32 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPhase {
    Idle,
    FadingIn,
    Holding,
    FadingOut,
}

/// What triggered a playback. Picks the foreground image only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationCategory {
    PlayerDeath,
    CraftFailure,
    EnemyDefeated,
}

/// Start instant of the running session.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    started_at: Instant,
}

impl PlaybackClock {
    pub fn start(now: Instant) -> Self {
        Self { started_at: now }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

/// The one live playback. Dropped when the scheduler returns to idle.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    phase: AnimationPhase,
    category: AnimationCategory,
    clock: PlaybackClock,
    alpha_curve: EasingCurve,
    scale_curve: EasingCurve,
    alpha_value: f64,
    scale_value: f32,
}

impl PlaybackSession {
    fn begin(category: AnimationCategory, timings: &PhaseTimings, now: Instant) -> Self {
        let alpha_curve = EasingCurve::started(EasingKind::InOutCubic, timings.fade_in, now);
        let scale_curve = EasingCurve::started(EasingKind::OutCubic, timings.total(), now)
            .with_points(Vec2::splat(SCALE_FROM), Vec2::splat(SCALE_TO));

        let mut session = Self {
            phase: AnimationPhase::FadingIn,
            category,
            clock: PlaybackClock::start(now),
            alpha_curve,
            scale_curve,
            alpha_value: 0.0,
            scale_value: SCALE_FROM,
        };
        session.sample(now);
        session
    }

    /// Scale is sampled no later than the end of its curve, so a late frame
    /// cannot push it past [`SCALE_TO`].
    fn sample(&mut self, now: Instant) {
        self.alpha_value = self.alpha_curve.value_at(now);
        let scale_end = self.clock.started_at() + self.scale_curve.duration();
        self.scale_value = self.scale_curve.point_at(now.min(scale_end)).x;
    }

    pub fn phase(&self) -> AnimationPhase {
        self.phase
    }

    pub fn category(&self) -> AnimationCategory {
        self.category
    }

    pub fn clock(&self) -> PlaybackClock {
        self.clock
    }

    pub fn alpha_curve(&self) -> &EasingCurve {
        &self.alpha_curve
    }

    /// Opacity of the composited overlay for the last sampled instant.
    /// Fade-in reads the curve directly, holding stays at the fade-in end
    /// value and fade-out reads the curve inverted.
    pub fn alpha(&self) -> f32 {
        match self.phase {
            AnimationPhase::FadingIn => self.alpha_value as f32,
            AnimationPhase::Holding => 1.0,
            AnimationPhase::FadingOut => (1.0 - self.alpha_value) as f32,
            AnimationPhase::Idle => 0.0,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale_value
    }
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    pub phase: AnimationPhase,
    pub category: AnimationCategory,
    pub alpha: f32,
    pub scale: f32,
}

/// Owns the phase machine. Use through a [`SchedulerHandle`] when more than
/// one thread submits requests.
#[derive(Debug, Default)]
pub struct AnimationScheduler {
    timings: PhaseTimings,
    session: Option<PlaybackSession>,
}

impl AnimationScheduler {
    pub fn new(timings: PhaseTimings) -> Self {
        Self {
            timings,
            session: None,
        }
    }

    pub fn timings(&self) -> PhaseTimings {
        self.timings
    }

    pub fn timings_mut(&mut self) -> &mut PhaseTimings {
        &mut self.timings
    }

    pub fn phase(&self) -> AnimationPhase {
        self.session
            .as_ref()
            .map_or(AnimationPhase::Idle, PlaybackSession::phase)
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Starts a session unless one is already running. Returns whether the
    /// request was accepted; rejected requests leave the session untouched.
    pub fn try_start(&mut self, category: AnimationCategory, now: Instant) -> bool {
        if let Some(active) = &self.session {
            tracing::trace!(
                requested = ?category,
                active = ?active.category,
                phase = ?active.phase,
                "dropping playback request while busy"
            );
            return false;
        }

        self.session = Some(PlaybackSession::begin(category, &self.timings, now));
        tracing::debug!(?category, "playback started");
        true
    }

    /// Samples both curves, then applies at most one phase transition.
    pub fn advance(&mut self, now: Instant) {
        let timings = self.timings;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.sample(now);
        let elapsed = session.clock.elapsed(now);
        let phase = session.phase;

        match phase {
            AnimationPhase::FadingIn => {
                if elapsed > timings.fade_in_end() {
                    session.phase = AnimationPhase::Holding;
                }
            }
            AnimationPhase::Holding => {
                if elapsed > timings.hold_end() {
                    session.phase = AnimationPhase::FadingOut;
                    session.alpha_curve =
                        EasingCurve::started(EasingKind::InOutCubic, timings.fade_out, now);
                    session.sample(now);
                }
            }
            AnimationPhase::FadingOut => {
                if elapsed > timings.total() {
                    tracing::debug!(category = ?session.category, "playback finished");
                    self.session = None;
                }
            }
            AnimationPhase::Idle => {}
        }
    }

    /// Renderer view of the current session, `None` while idle.
    pub fn frame_state(&self) -> Option<FrameState> {
        self.session.as_ref().map(|session| FrameState {
            phase: session.phase,
            category: session.category,
            alpha: session.alpha(),
            scale: session.scale(),
        })
    }
}

struct Shared {
    scheduler: Mutex<AnimationScheduler>,
    gate: AudioGate,
    audio: AudioOutput,
}

/// Cloneable, thread-safe entry point to the one process-wide scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    pub fn new(timings: PhaseTimings, gate: AudioGate, audio: AudioOutput) -> Self {
        Self {
            shared: Arc::new(Shared {
                scheduler: Mutex::new(AnimationScheduler::new(timings)),
                gate,
                audio,
            }),
        }
    }

    /// Requests a playback. Dropped silently when one is already running.
    /// On acceptance the death sound is played if the host's audio
    /// settings allow it. The lock is released before the audio path runs.
    pub fn request_playback(&self, category: AnimationCategory, now: Instant) -> Result<bool> {
        let accepted = self.lock()?.try_start(category, now);
        if accepted && self.shared.gate.is_sfx_enabled() {
            if let Err(err) = self.shared.audio.play(SoundTrigger::Death) {
                tracing::error!(error = %err, "failed to play death sound");
            }
        }
        Ok(accepted)
    }

    /// Per-frame tick. Returns the state to draw, `None` while idle.
    pub fn advance(&self, now: Instant) -> Result<Option<FrameState>> {
        let mut scheduler = self.lock()?;
        scheduler.advance(now);
        Ok(scheduler.frame_state())
    }

    pub fn phase(&self) -> Result<AnimationPhase> {
        Ok(self.lock()?.phase())
    }

    pub fn frame_state(&self) -> Result<Option<FrameState>> {
        Ok(self.lock()?.frame_state())
    }

    pub fn timings(&self) -> Result<PhaseTimings> {
        Ok(self.lock()?.timings())
    }

    pub fn set_timings(&self, timings: PhaseTimings) -> Result<()> {
        *self.lock()?.timings_mut() = timings;
        Ok(())
    }

    pub fn audio(&self) -> &AudioOutput {
        &self.shared.audio
    }

    /// Runs `f` against the locked scheduler.
    pub fn with_scheduler<T>(&self, f: impl FnOnce(&mut AnimationScheduler) -> T) -> Result<T> {
        Ok(f(&mut *self.lock()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, AnimationScheduler>> {
        self.shared
            .scheduler
            .lock()
            .map_err(|_| DeathScreenError::msg("animation scheduler has been poisoned"))
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle").finish()
    }
}
