//! Core library for the death screen overlay.
//!
//! The host feeds frame ticks and event callbacks into an [`Overlay`]. Three
//! detectors turn those signals into playback requests, a single
//! [`AnimationScheduler`] walks the accepted request through its fade
//! phases, and the [`OverlayRenderer`] composites the result through the
//! host's [`DrawTarget`]. Asset decoding, audio playback and the game's
//! configuration tables stay on the host side behind small traits.

pub mod assets;
pub mod audio;
pub mod command;
pub mod config;
pub mod detect;
pub mod easing;
pub mod error;
pub mod overlay;
pub mod render;
pub mod timeline;

pub use assets::{AssetStore, OverlayImage, Texture, TextureId};
pub use audio::{
    AudioGate, AudioOutput, ConfigEntry, ConfigEntryKind, SoundSink, SoundTrigger, SystemConfig,
    MASTER_AUDIO_SETTING, SOUND_EFFECTS_SETTING,
};
pub use command::{parse_volume_percent, ChatLine, CommandHandler, CommandKind, COMMAND_NAME};
pub use config::{OverlayConfig, PhaseTimings};
pub use detect::{
    CraftFailureDetector, DeathDetector, Deferred, DeferredTask, EnemyDefeatedDetector,
    LogMessageSheet, ManualDeferred, ThreadDeferred, DEFEAT_CATEGORY, DEFEAT_UPDATE_TYPE,
    ENEMY_DEFEATED_DELAY, ENEMY_DEFEATED_OPCODE, SYNTHESIS_FAILED_ROW,
};
pub use easing::{EasingCurve, EasingKind};
pub use error::{DeathScreenError, Result};
pub use overlay::{Overlay, OverlayServices};
pub use render::{centered_quad, cover_size, DrawTarget, ImageQuad, OverlayRenderer};
pub use timeline::{
    AnimationCategory, AnimationPhase, AnimationScheduler, FrameState, PlaybackClock,
    PlaybackSession, SchedulerHandle,
};
