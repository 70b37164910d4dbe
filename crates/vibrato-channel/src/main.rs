//! # vibrato
//!
//! Hosts a Vibrato playback session on the default audio device and serves
//! method calls as JSON lines over stdin/stdout. Logs go to stderr.

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vibrato_audio::output::{default_device_name, list_output_devices};
use vibrato_audio::{CpalOutput, PlaybackSession};
use vibrato_channel::config::CONFIG_ENV;
use vibrato_channel::{serve, PlaybackService, VibratoConfig, CHANNEL_NAME};

#[derive(Parser)]
#[command(name = "vibrato")]
#[command(about = "Concurrent multi-stream audio playback over JSON lines", long_about = None)]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Print output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = VibratoConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .init();

    if cli.list_devices {
        let default = default_device_name();
        for name in list_output_devices()? {
            let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
            println!("{marker} {name}");
        }
        return Ok(());
    }

    info!("Starting {CHANNEL_NAME} v{}", env!("CARGO_PKG_VERSION"));

    let output = CpalOutput::new(&config.output).context("Failed to open audio output")?;
    let session = Arc::new(PlaybackSession::new(Arc::new(output)));
    let service = PlaybackService::new(Arc::clone(&session));

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    serve(&service, stdin, stdout).context("Channel I/O failed")?;

    session.close_all();
    info!("Shut down");
    Ok(())
}
