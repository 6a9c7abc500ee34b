use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use death_screen_core::{
    AudioOutput, ChatLine, CommandHandler, OverlayConfig, SoundSink, SoundTrigger,
};
use tracing_subscriber::EnvFilter;

mod host;

fn main() -> death_screen_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { script } => run_replay(&script, &cli.config),
        Commands::Command { args } => run_command(&args, &cli.config),
    }
}

fn run_replay(script: &PathBuf, config: &PathBuf) -> death_screen_core::Result<()> {
    tracing::info!(?script, ?config, "replaying host script");

    let settings = OverlayConfig::load(config)?;
    let script = host::Script::load(script)?;
    let report = host::replay(&script, settings)?;

    tracing::info!(
        frames = report.frames,
        frames_drawn = report.frames_drawn,
        quads = report.quads,
        sounds = report.sounds,
        "replay finished"
    );
    for (t_ms, category) in &report.playbacks {
        println!("{t_ms:>8} ms  {category:?}");
    }
    Ok(())
}

fn run_command(args: &[String], config: &PathBuf) -> death_screen_core::Result<()> {
    let settings = OverlayConfig::load(config)?;
    let audio = AudioOutput::new(Arc::new(SilentSink), settings.volume);
    let mut handler = CommandHandler::new(audio, settings).with_config_path(config);

    for line in handler.process(&args.join(" ")) {
        match line {
            ChatLine::Info(text) => println!("{text}"),
            ChatLine::Error(text) => eprintln!("{text}"),
        }
    }
    Ok(())
}

/// The command surface never plays sounds.
struct SilentSink;

impl SoundSink for SilentSink {
    fn play(&self, _trigger: SoundTrigger, _volume: f32) {}
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Death screen overlay host simulator", long_about = None)]
struct Cli {
    /// Persisted overlay settings.
    #[arg(short, long, global = true, default_value = "death-screen.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded script of host signals against the overlay.
    Replay {
        /// Path to the JSON script.
        script: PathBuf,
    },
    /// Run the overlay's chat command, e.g. `command vol 40`.
    Command {
        /// Arguments as typed after the command name.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}
