//! Slash command surface: `vol <0-100>` and `help`.

use std::num::IntErrorKind;
use std::path::PathBuf;

use crate::{AudioOutput, DeathScreenError, OverlayConfig, Result};

/// Chat command the overlay registers with the host.
pub const COMMAND_NAME: &str = "/deathscreen";

const VOLUME_ERROR: &str = "Please use a number between 0-100";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Volume,
    Help,
    Invalid,
}

impl CommandKind {
    pub fn parse(arg: &str) -> Self {
        match arg {
            "v" | "vol" => CommandKind::Volume,
            "h" | "help" => CommandKind::Help,
            _ => CommandKind::Invalid,
        }
    }
}

/// A line printed back to the user's chat log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine {
    Info(String),
    Error(String),
}

/// Parses a user supplied volume percentage, clamping above 100.
pub fn parse_volume_percent(input: &str) -> Result<u8> {
    let invalid = || DeathScreenError::InvalidVolume {
        input: input.to_string(),
    };
    let value: i64 = match input.trim().parse() {
        Ok(value) => value,
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => return Ok(100),
        Err(_) => return Err(invalid()),
    };
    if value < 0 {
        return Err(invalid());
    }
    Ok(value.min(100) as u8)
}

/// Handles the overlay's slash command and owns the persisted settings.
#[derive(Debug)]
pub struct CommandHandler {
    audio: AudioOutput,
    config: OverlayConfig,
    config_path: Option<PathBuf>,
}

impl CommandHandler {
    pub fn new(audio: AudioOutput, config: OverlayConfig) -> Self {
        Self {
            audio,
            config,
            config_path: None,
        }
    }

    /// Saves the configuration to `path` whenever the volume changes.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn help_text() -> String {
        [
            format!("{COMMAND_NAME} vol <0-100> - Sets sound volume"),
            format!("{COMMAND_NAME} help - Print this help text"),
        ]
        .join("\n")
    }

    /// Applies a volume percentage to the persisted settings and then the
    /// live output. Leaves both untouched on invalid input or a failed save.
    pub fn set_volume(&mut self, input: &str) -> Result<u8> {
        let percent = parse_volume_percent(input)?;
        let volume = f32::from(percent) / 100.0;
        tracing::debug!(volume, "setting volume");

        let updated = OverlayConfig {
            volume,
            ..self.config.clone()
        };
        if let Some(path) = &self.config_path {
            updated.save(path)?;
        }
        self.audio.set_volume(volume)?;
        self.config = updated;
        Ok(percent)
    }

    /// Runs the command with the raw argument string and returns the lines
    /// to print.
    pub fn process(&mut self, args: &str) -> Vec<ChatLine> {
        if args.trim().is_empty() {
            return vec![ChatLine::Info(Self::help_text())];
        }
        tracing::debug!(command = COMMAND_NAME, args, "processing command");

        let parts: Vec<&str> = args.split(' ').collect();
        match CommandKind::parse(parts[0]) {
            CommandKind::Volume => {
                if parts.len() == 2 {
                    match self.set_volume(parts[1]) {
                        Ok(percent) => vec![ChatLine::Info(format!("Volume set to {percent}%"))],
                        Err(err @ DeathScreenError::InvalidVolume { .. }) => {
                            tracing::error!(error = %err, "volume change rejected");
                            vec![ChatLine::Error(VOLUME_ERROR.to_string())]
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "volume change failed");
                            vec![ChatLine::Error(err.to_string())]
                        }
                    }
                } else {
                    match self.audio.volume() {
                        Ok(volume) => vec![ChatLine::Info(format!(
                            "Volume is {}%",
                            (volume * 100.0).round() as u32
                        ))],
                        Err(err) => vec![ChatLine::Error(err.to_string())],
                    }
                }
            }
            CommandKind::Help => vec![ChatLine::Info(Self::help_text())],
            CommandKind::Invalid => vec![ChatLine::Error("Invalid command".to_string())],
        }
    }
}
