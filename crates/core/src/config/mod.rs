use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Persisted overlay settings. The volume scalar is the only value that
/// survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub version: u32,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_volume() -> f32 {
    1.0
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            version: 0,
            volume: default_volume(),
        }
    }
}

impl OverlayConfig {
    /// Reads the configuration at `path`, falling back to defaults when the
    /// file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Durations of the three visible animation phases. Runtime-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    pub fade_in: Duration,
    pub hold: Duration,
    pub fade_out: Duration,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            fade_in: Duration::from_millis(1000),
            hold: Duration::from_millis(1600),
            fade_out: Duration::from_millis(2000),
        }
    }
}

impl PhaseTimings {
    /// Elapsed time after which fade-in hands over to the hold phase.
    pub fn fade_in_end(&self) -> Duration {
        self.fade_in
    }

    /// Elapsed time after which the hold phase starts fading out.
    pub fn hold_end(&self) -> Duration {
        self.fade_in + self.hold
    }

    /// Length of a whole playback session.
    pub fn total(&self) -> Duration {
        self.fade_in + self.hold + self.fade_out
    }
}
