//! Host-facing wiring: one [`Overlay`] per process, fed by frame ticks and
//! event callbacks.

use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;

use crate::{
    AssetStore, AudioGate, AudioOutput, CraftFailureDetector, DeathDetector, Deferred,
    DrawTarget, EnemyDefeatedDetector, FrameState, LogMessageSheet, OverlayConfig,
    OverlayRenderer, PhaseTimings, Result, SchedulerHandle, SoundSink, SystemConfig,
};

/// Collaborators the host hands over when the overlay is created.
pub struct OverlayServices {
    pub assets: AssetStore,
    pub sound: Arc<dyn SoundSink>,
    pub system_config: Arc<dyn SystemConfig>,
    pub deferred: Arc<dyn Deferred>,
    pub config: OverlayConfig,
    pub timings: PhaseTimings,
}

pub struct Overlay {
    scheduler: SchedulerHandle,
    death: DeathDetector,
    craft: Option<CraftFailureDetector>,
    enemy: EnemyDefeatedDetector,
    renderer: OverlayRenderer,
}

impl Overlay {
    /// Builds the overlay. Fails when an image is missing; a missing
    /// localized failure text only disables craft failure detection.
    pub fn new(services: OverlayServices, sheet: &dyn LogMessageSheet) -> Result<Self> {
        services.assets.ensure_complete()?;

        let audio = AudioOutput::new(services.sound, services.config.volume);
        let gate = AudioGate::new(services.system_config);
        let scheduler = SchedulerHandle::new(services.timings, gate, audio);

        let craft = match CraftFailureDetector::new(sheet, scheduler.clone()) {
            Ok(detector) => Some(detector),
            Err(err) => {
                tracing::warn!(error = %err, "craft failure detection disabled");
                None
            }
        };

        Ok(Self {
            death: DeathDetector::new(scheduler.clone()),
            craft,
            enemy: EnemyDefeatedDetector::new(scheduler.clone(), services.deferred),
            renderer: OverlayRenderer::new(services.assets),
            scheduler,
        })
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    pub fn audio(&self) -> &AudioOutput {
        self.scheduler.audio()
    }

    pub fn craft_detection_enabled(&self) -> bool {
        self.craft.is_some()
    }

    /// Replaces the packet detector, e.g. to match another opcode.
    pub fn set_network_detector(&mut self, detector: EnemyDefeatedDetector) {
        self.enemy = detector;
    }

    /// Cloneable packet listener for hosts delivering network messages on
    /// their own thread.
    pub fn network_listener(&self) -> EnemyDefeatedDetector {
        self.enemy.clone()
    }

    pub fn on_framework_update(&mut self, unconscious: bool, now: Instant) -> Result<()> {
        self.death.on_framework_update(unconscious, now)
    }

    pub fn on_chat_message(&self, text: &str, now: Instant) -> Result<()> {
        match &self.craft {
            Some(detector) => detector.on_chat_message(text, now),
            None => Ok(()),
        }
    }

    pub fn on_network_message(&self, opcode: u16, payload: &[u8]) -> bool {
        self.enemy.on_network_message(opcode, payload)
    }

    /// Frame tick: advances the animation and draws it.
    pub fn draw(
        &self,
        now: Instant,
        viewport: Vec2,
        target: &mut dyn DrawTarget,
    ) -> Result<Option<FrameState>> {
        let frame = self.scheduler.advance(now)?;
        self.renderer.draw(frame.as_ref(), viewport, target)?;
        Ok(frame)
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("craft_detection", &self.craft.is_some())
            .field("enemy", &self.enemy)
            .finish()
    }
}
