use std::sync::{Arc, Mutex, MutexGuard};

use crate::{DeathScreenError, Result};

/// Name of the host setting that mutes sound effects.
pub const SOUND_EFFECTS_SETTING: &str = "IsSndSe";
/// Name of the host setting that mutes all audio.
pub const MASTER_AUDIO_SETTING: &str = "IsSndMaster";

/// Sounds the overlay knows how to trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundTrigger {
    Death,
}

/// Playback backend provided by the host.
pub trait SoundSink: Send + Sync {
    /// Plays `trigger` at `volume` in `[0, 1]`. Must not block.
    fn play(&self, trigger: SoundTrigger, volume: f32);
}

/// Value type tag of a host configuration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEntryKind {
    Empty,
    UInt,
    Float,
    String,
}

/// One entry of the host's live system configuration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub name: Option<String>,
    pub kind: ConfigEntryKind,
    pub value: u32,
}

impl ConfigEntry {
    pub fn uint(name: impl Into<String>, value: u32) -> Self {
        Self {
            name: Some(name.into()),
            kind: ConfigEntryKind::UInt,
            value,
        }
    }
}

/// Read-only view over the host's live configuration table.
pub trait SystemConfig: Send + Sync {
    /// Returns the table in host order. Errors when the table is unreachable.
    fn entries(&self) -> Result<Vec<ConfigEntry>>;
}

/// Decides from live host settings whether the death sound may play.
///
/// Scan failures fail open so the visual overlay is never held back by
/// the sound path, while an absent setting counts as muted.
#[derive(Clone)]
pub struct AudioGate {
    config: Arc<dyn SystemConfig>,
}

impl AudioGate {
    pub fn new(config: Arc<dyn SystemConfig>) -> Self {
        Self { config }
    }

    /// Scans the live table once. Nothing is cached between calls.
    pub fn is_sfx_enabled(&self) -> bool {
        let entries = match self.config.entries() {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(error = %err, "error checking if sfx is enabled");
                return true;
            }
        };

        let mut effects_enabled = false;
        let mut master_enabled = false;

        for entry in &entries {
            let Some(name) = entry.name.as_deref() else {
                continue;
            };
            match name {
                SOUND_EFFECTS_SETTING => {
                    tracing::trace!(name, kind = ?entry.kind, value = entry.value, "read sound setting");
                    effects_enabled = entry.value == 0;
                }
                MASTER_AUDIO_SETTING => {
                    tracing::trace!(name, kind = ?entry.kind, value = entry.value, "read sound setting");
                    master_enabled = entry.value == 0;
                }
                _ => {}
            }
        }

        effects_enabled && master_enabled
    }
}

impl std::fmt::Debug for AudioGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGate").finish()
    }
}

/// Shared handle over the sound backend and the user's volume.
#[derive(Clone)]
pub struct AudioOutput {
    sink: Arc<dyn SoundSink>,
    volume: Arc<Mutex<f32>>,
}

impl AudioOutput {
    pub fn new(sink: Arc<dyn SoundSink>, volume: f32) -> Self {
        Self {
            sink,
            volume: Arc::new(Mutex::new(volume.clamp(0.0, 1.0))),
        }
    }

    /// Returns the current volume in `[0, 1]`.
    pub fn volume(&self) -> Result<f32> {
        Ok(*self.lock_volume()?)
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        let mut slot = self.lock_volume()?;
        *slot = volume.clamp(0.0, 1.0);
        Ok(())
    }

    /// Plays `trigger` at the volume configured right now.
    pub fn play(&self, trigger: SoundTrigger) -> Result<()> {
        let volume = self.volume()?;
        self.sink.play(trigger, volume);
        Ok(())
    }

    fn lock_volume(&self) -> Result<MutexGuard<'_, f32>> {
        self.volume
            .lock()
            .map_err(|_| DeathScreenError::msg("audio volume has been poisoned"))
    }
}

impl std::fmt::Debug for AudioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioOutput")
            .field("volume", &self.volume)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn gate(entries: Option<Vec<ConfigEntry>>) -> AudioGate {
        AudioGate::new(Arc::new(StaticConfig(entries)))
    }

    #[test]
    fn enabled_when_both_settings_are_zero() {
        assert!(gate(Some(vec![
            ConfigEntry::uint("Fps", 2),
            ConfigEntry::uint(SOUND_EFFECTS_SETTING, 0),
            ConfigEntry::uint(MASTER_AUDIO_SETTING, 0),
        ]))
        .is_sfx_enabled());
    }

    #[test]
    fn disabled_when_either_setting_is_muted() {
        assert!(!gate(Some(vec![
            ConfigEntry::uint(SOUND_EFFECTS_SETTING, 1),
            ConfigEntry::uint(MASTER_AUDIO_SETTING, 0),
        ]))
        .is_sfx_enabled());
        assert!(!gate(Some(vec![
            ConfigEntry::uint(SOUND_EFFECTS_SETTING, 0),
            ConfigEntry::uint(MASTER_AUDIO_SETTING, 7),
        ]))
        .is_sfx_enabled());
    }

    #[test]
    fn scan_failure_fails_open() {
        assert!(gate(None).is_sfx_enabled());
    }

    #[test]
    fn absent_setting_counts_as_muted() {
        assert!(!gate(Some(vec![ConfigEntry::uint(SOUND_EFFECTS_SETTING, 0)])).is_sfx_enabled());
        assert!(!gate(Some(Vec::new())).is_sfx_enabled());
    }

    #[test]
    fn unnamed_entries_are_skipped() {
        let unnamed = ConfigEntry {
            name: None,
            kind: ConfigEntryKind::Empty,
            value: 9,
        };
        assert!(gate(Some(vec![
            unnamed,
            ConfigEntry::uint(SOUND_EFFECTS_SETTING, 0),
            ConfigEntry::uint(MASTER_AUDIO_SETTING, 0),
        ]))
        .is_sfx_enabled());
    }

    #[test]
    fn plays_at_current_volume() {
        let sink = Arc::new(RecordingSink::default());
        let audio = AudioOutput::new(sink.clone(), 1.0);
        audio.set_volume(0.25).unwrap();
        audio.play(SoundTrigger::Death).unwrap();

        let played = sink.played.lock().unwrap();
        assert_eq!(played.as_slice(), &[(SoundTrigger::Death, 0.25)]);
    }

    #[test]
    fn volume_is_kept_in_unit_range() {
        let audio = AudioOutput::new(Arc::new(RecordingSink::default()), 3.0);
        assert_eq!(audio.volume().unwrap(), 1.0);
        audio.set_volume(-1.0).unwrap();
        assert_eq!(audio.volume().unwrap(), 0.0);
    }
}
