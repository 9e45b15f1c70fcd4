/// Chime daemon - background audio playback service
use anyhow::Context;
use chime_playback::{watch, PlayerEngine};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod control;
mod output;
mod platform;

use config::DaemonConfig;
use output::CpalSink;

#[derive(Parser)]
#[command(name = "chimed")]
#[command(about = "Chime background audio playback daemon", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control socket path (overrides configuration)
    #[arg(long)]
    socket: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chimed=info,chime_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let cfg = DaemonConfig::load(cli.config.as_deref())?;
    let socket_path = cli.socket.unwrap_or_else(|| cfg.socket_path.clone());

    let engine = Arc::new(PlayerEngine::new(Box::new(chime_audio::open_source)));
    engine.set_volume(cfg.volume);

    let mut sink = CpalSink::new().context("failed to open audio output")?;
    let playback = {
        let engine = engine.clone();
        thread::spawn(move || engine.run(&mut sink))
    };

    let (power_tx, power_rx) = platform::power_events();
    let power = {
        let engine = engine.clone();
        thread::spawn(move || watch::power_watcher(engine, power_rx))
    };
    let jack = {
        let engine = engine.clone();
        let interval = Duration::from_millis(cfg.jack_poll_ms);
        thread::spawn(move || {
            watch::jack_watcher(engine, Box::new(platform::AlwaysPlugged), interval);
        })
    };

    info!("chimed started");
    control::serve(engine.clone(), &socket_path)?;

    // quit_server flipped the running flag; unwind the worker threads
    drop(power_tx);
    for (name, handle) in [("playback", playback), ("power", power), ("jack", jack)] {
        if handle.join().is_err() {
            error!(thread = name, "worker thread panicked");
        }
    }

    info!("chimed stopped");
    Ok(())
}
