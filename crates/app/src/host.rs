//! Scripted stand-in for the game host: replays condition flags, chat lines
//! and network packets against an [`Overlay`] on a simulated frame clock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use death_screen_core::{
    AnimationCategory, AnimationPhase, AssetStore, ConfigEntry, ConfigEntryKind, DeathScreenError,
    DrawTarget, ImageQuad, LogMessageSheet, ManualDeferred, Overlay, OverlayConfig, OverlayImage,
    OverlayServices, PhaseTimings, Result, SoundSink, SoundTrigger, SystemConfig, Texture,
    TextureId, ENEMY_DEFEATED_OPCODE,
};
use glam::Vec2;
use serde::Deserialize;

/// A recorded session of host signals.
#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default = "default_viewport")]
    pub viewport: [f32; 2],
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    pub duration_ms: u64,
    #[serde(default = "default_opcode")]
    pub opcode: u16,
    /// Localized log message rows, keyed by row id.
    #[serde(default)]
    pub log_messages: HashMap<u32, String>,
    /// Live system configuration. Absent means the table cannot be read.
    #[serde(default)]
    pub system_config: Option<Vec<ScriptConfigEntry>>,
    /// Image sizes in pixels; unlisted images use the viewport size.
    #[serde(default)]
    pub textures: HashMap<String, [u32; 2]>,
    #[serde(default)]
    pub fade_in_ms: Option<u64>,
    #[serde(default)]
    pub hold_ms: Option<u64>,
    #[serde(default)]
    pub fade_out_ms: Option<u64>,
    pub events: Vec<ScriptEvent>,
}

fn default_viewport() -> [f32; 2] {
    [1920.0, 1080.0]
}

fn default_frame_ms() -> u64 {
    16
}

fn default_opcode() -> u16 {
    ENEMY_DEFEATED_OPCODE
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfigEntry {
    pub name: Option<String>,
    pub value: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub signal: Signal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    /// Sets the level of the unconscious condition flag from now on.
    Condition { unconscious: bool },
    Chat { text: String },
    Network { opcode: u16, payload: Vec<u8> },
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn timings(&self) -> PhaseTimings {
        let defaults = PhaseTimings::default();
        PhaseTimings {
            fade_in: self.fade_in_ms.map_or(defaults.fade_in, Duration::from_millis),
            hold: self.hold_ms.map_or(defaults.hold, Duration::from_millis),
            fade_out: self.fade_out_ms.map_or(defaults.fade_out, Duration::from_millis),
        }
    }

    fn assets(&self) -> AssetStore {
        let mut store = AssetStore::new();
        for (index, image) in OverlayImage::ALL.into_iter().enumerate() {
            let [width, height] = self
                .textures
                .get(image.file_name())
                .copied()
                .unwrap_or([self.viewport[0] as u32, self.viewport[1] as u32]);
            store.register(
                image,
                Texture {
                    id: TextureId(index as u64),
                    width,
                    height,
                },
            );
        }
        store
    }
}

struct ScriptSheet(HashMap<u32, String>);

impl LogMessageSheet for ScriptSheet {
    fn text(&self, row: u32) -> Option<String> {
        self.0.get(&row).cloned()
    }
}

struct ScriptSystemConfig(Option<Vec<ConfigEntry>>);

impl SystemConfig for ScriptSystemConfig {
    fn entries(&self) -> Result<Vec<ConfigEntry>> {
        self.0.clone().ok_or_else(|| {
            DeathScreenError::ConfigScan("system configuration is not available".into())
        })
    }
}

/// Logs sounds instead of playing them.
#[derive(Debug, Default)]
struct LoggingSink {
    played: AtomicUsize,
}

impl SoundSink for LoggingSink {
    fn play(&self, trigger: SoundTrigger, volume: f32) {
        self.played.fetch_add(1, Ordering::Relaxed);
        tracing::info!(?trigger, volume, "playing sound");
    }
}

/// Counts draw calls and logs each quad.
#[derive(Debug, Default)]
struct TracingCanvas {
    quads: usize,
}

impl DrawTarget for TracingCanvas {
    fn draw_image(&mut self, quad: ImageQuad) {
        self.quads += 1;
        tracing::trace!(
            texture = quad.texture.0,
            x = quad.position.x,
            y = quad.position.y,
            width = quad.size.x,
            height = quad.size.y,
            alpha = quad.alpha,
            "draw image"
        );
    }
}

/// What a replay produced.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub frames: usize,
    pub frames_drawn: usize,
    pub quads: usize,
    pub sounds: usize,
    pub playbacks: Vec<(u64, AnimationCategory)>,
}

/// Runs `script` frame by frame. `config` supplies the user's volume.
pub fn replay(script: &Script, config: OverlayConfig) -> Result<ReplayReport> {
    let base = Instant::now();
    let sink = Arc::new(LoggingSink::default());
    let deferred = Arc::new(ManualDeferred::new(base));
    let system_config = script.system_config.as_ref().map(|entries| {
        entries
            .iter()
            .map(|entry| ConfigEntry {
                name: entry.name.clone(),
                kind: ConfigEntryKind::UInt,
                value: entry.value,
            })
            .collect()
    });

    let mut overlay = Overlay::new(
        OverlayServices {
            assets: script.assets(),
            sound: sink.clone(),
            system_config: Arc::new(ScriptSystemConfig(system_config)),
            deferred: deferred.clone(),
            config,
            timings: script.timings(),
        },
        &ScriptSheet(script.log_messages.clone()),
    )?;
    if script.opcode != ENEMY_DEFEATED_OPCODE {
        let detector = overlay.network_listener().with_opcode(script.opcode);
        overlay.set_network_detector(detector);
    }

    let mut events = script.events.clone();
    events.sort_by_key(|event| event.at_ms);
    let mut pending = events.into_iter().peekable();

    let viewport = Vec2::from(script.viewport);
    let frame_ms = script.frame_ms.max(1);
    let mut unconscious = false;
    let mut canvas = TracingCanvas::default();
    let mut report = ReplayReport::default();
    let mut last_phase = AnimationPhase::Idle;

    let mut t = 0;
    while t <= script.duration_ms {
        let now = base + Duration::from_millis(t);

        while let Some(event) = pending.next_if(|event| event.at_ms <= t) {
            let at = base + Duration::from_millis(event.at_ms);
            deferred.run_due(at);
            match event.signal {
                Signal::Condition { unconscious: level } => unconscious = level,
                Signal::Chat { text } => overlay.on_chat_message(&text, at)?,
                Signal::Network { opcode, payload } => {
                    if overlay.on_network_message(opcode, &payload) {
                        tracing::debug!(at_ms = event.at_ms, "enemy felled packet matched");
                    }
                }
            }
        }
        deferred.run_due(now);

        overlay.on_framework_update(unconscious, now)?;
        let frame = overlay.draw(now, viewport, &mut canvas)?;

        report.frames += 1;
        if let Some(state) = frame {
            report.frames_drawn += 1;
            if last_phase == AnimationPhase::Idle {
                report.playbacks.push((t, state.category));
            }
            if state.phase != last_phase {
                tracing::info!(t_ms = t, phase = ?state.phase, category = ?state.category, "phase");
            }
            last_phase = state.phase;
        } else {
            if last_phase != AnimationPhase::Idle {
                tracing::info!(t_ms = t, "overlay idle");
            }
            last_phase = AnimationPhase::Idle;
        }

        t += frame_ms;
    }

    report.quads = canvas.quads;
    report.sounds = sink.played.load(Ordering::Relaxed);
    Ok(report)
}
