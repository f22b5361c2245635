use anyhow::Context;
use clap::Parser;
use sasplayer::app::{self, LaunchOptions};
use sasplayer::config;
use sasplayer::model::RepeatMode;
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Terminal music player
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Audio files or folders to load
    paths: Vec<PathBuf>,
    /// Start in the mini-player view
    #[arg(long)]
    mini: bool,
    /// Start with shuffle on
    #[arg(long)]
    shuffle: bool,
    /// Repeat mode: off, one or all
    #[arg(long, value_parser = parse_repeat)]
    repeat: Option<RepeatMode>,
    /// Initial volume
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,
}

fn parse_repeat(value: &str) -> Result<RepeatMode, String> {
    RepeatMode::parse(value).ok_or_else(|| format!("expected off, one or all, got {value:?}"))
}

fn init_logging() -> anyhow::Result<()> {
    config::ensure_config_dir()?;
    let path = config::log_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(err) = init_logging() {
        eprintln!("logging disabled: {err:#}");
    }
    log::info!("sasplayer {} starting", env!("CARGO_PKG_VERSION"));

    app::run(LaunchOptions {
        inputs: cli.paths,
        mini: cli.mini,
        shuffle: cli.shuffle,
        repeat: cli.repeat,
        volume: cli.volume,
    })
}
