use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use silence_monitor::audio::frame_amplitude;
use silence_monitor::{
    Acquisition, AudioSource, CollectorServer, Config, EventEmitter, HttpSink, MicrophoneSource,
    SilenceDetector,
};

/// Silence Monitor - report sustained microphone silences to a collector
#[derive(Parser)]
#[command(name = "silence-monitor", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML config file
    #[arg(short, long, env = "SILENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP collector that receives silence events
    Collect {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,silence_monitor=info",
        1 => "info,silence_monitor=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::Collect { port, host }) => run_collector(config, port, host).await,
        Some(Command::TestMic { duration }) => test_mic(&config, duration).await,
        None => run_monitor(config).await,
    }
}

/// Run the silence detector until interrupted
#[allow(clippy::future_not_send)]
async fn run_monitor(config: Config) -> anyhow::Result<()> {
    tracing::info!(sink = %config.sink.url, "starting silence monitor");

    // Set up shutdown signal
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    let sink = HttpSink::new(config.sink.url.clone(), config.sink.timeout)?;
    let emitter = EventEmitter::spawn(Arc::new(sink));

    let source = MicrophoneSource::new(config.audio.sample_rate, config.audio.frame_size);
    let acquisition = Acquisition::new(source, config.audio.retry_backoff);

    // Startup waits on the device and calibration, so it must be interruptible too
    let mut detector = tokio::select! {
        detector = SilenceDetector::new(acquisition, config.detector.clone(), emitter) => detector,
        _ = shutdown_rx.recv() => {
            tracing::info!("shutdown requested during startup");
            return Ok(());
        }
    };

    detector.run(&mut shutdown_rx).await;
    detector.shutdown().await;

    Ok(())
}

/// Run the collector
async fn run_collector(
    mut config: Config,
    port: Option<u16>,
    host: Option<String>,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.collector.port = port;
    }
    if let Some(host) = host {
        config.collector.host = host;
    }

    tracing::info!(
        host = %config.collector.host,
        port = config.collector.port,
        "starting silence collector"
    );

    CollectorServer::new(config.collector).run().await?;
    Ok(())
}

/// Print one amplitude reading per second to help choose a sensitivity
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Stay quiet for a few seconds, then speak.\n");

    let mut source = MicrophoneSource::new(config.audio.sample_rate, config.audio.frame_size);
    source.open().await?;

    println!("Sample rate: {} Hz", source.sample_rate());
    println!("---");

    let mut levels = Vec::new();
    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let frame = source.read_frame().await?;
        let level = frame_amplitude(&frame);
        let peak = frame.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        levels.push(level);

        // Visual meter, full scale at a quarter of i16 range
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (level / 8192.0 * 50.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] Level: {level:8.2} | Peak: {peak:5} | [{meter}]", i + 1);
    }

    source.close();

    if let Some(quietest) = levels.iter().copied().reduce(f64::min) {
        println!("\n---");
        println!(
            "Quietest reading: {quietest:.2}; with sensitivity {} the threshold would be {:.2}",
            config.detector.sensitivity_factor,
            quietest * config.detector.sensitivity_factor
        );
    }
    println!("If the level never moved, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}
