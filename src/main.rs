use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use seamloop::{Config, EngineContext, Orchestrator, PipelineEvent, ProcessingRequest, RunOutcome};

/// Exit status after an interrupt, as shells report SIGINT
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(
    name = "seamloop",
    version,
    about = "Turn a short clip into a long, seamlessly looping video",
    long_about = "Seamloop bridges a clip's last frame back to its first, either with neural frame interpolation or a crossfade, and repeats the resulting loop to the requested length without re-encoding it."
)]
struct Cli {
    /// Source video clip
    #[arg(short, long, required_unless_present = "print_config")]
    input: Option<PathBuf>,

    /// Target duration of the looped output, in minutes
    #[arg(short, long, default_value_t = 10.0)]
    minutes: f64,

    /// Output video file path
    #[arg(short, long, required_unless_present = "print_config")]
    output: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Always use the crossfade bridge
    #[arg(long)]
    no_ai: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", Config::default().to_toml()?);
        return Ok(());
    }

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        anyhow::bail!("--input and --output are required");
    };

    info!("Starting Seamloop v{}", env!("CARGO_PKG_VERSION"));
    info!("Input: {:?}", input);
    info!("Output: {:?}", output);
    info!("Target: {} min", cli.minutes);

    // Load configuration
    let mut config = match cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(&config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    if cli.no_ai {
        config.model.enabled = false;
    }

    let orchestrator = Orchestrator::new(config.clone(), EngineContext::from_config(&config));
    if orchestrator.is_ai_backend_available() {
        info!("AI bridge available, model cache at {:?}", config.model.cache_dir());
    } else {
        info!("AI bridge unavailable, using crossfade");
    }

    let request = ProcessingRequest::from_path(&input, cli.minutes)
        .await
        .with_context(|| format!("cannot read {:?}", input))?;

    let (events, mut receiver) = mpsc::unbounded_channel();
    let handle = orchestrator.start_run(request, Arc::new(events))?;

    let token = handle.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling after the current step");
            token.cancel();
        }
    });

    let reporter = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                PipelineEvent::Stage(stage) => info!("Stage: {}", stage),
                PipelineEvent::Progress(percent) => info!("Progress: {}%", percent),
                PipelineEvent::ModeChanged(mode) => info!("Bridge mode: {}", mode),
            }
        }
    });

    let outcome = handle.wait().await;
    let _ = reporter.await;

    match outcome {
        Ok(RunOutcome::Completed(result)) => {
            result.write_to(&output).await?;
            info!(
                "Loop complete! {:.1}s ({} bridge, unit {:.2}s x{}) saved to: {:?}",
                result.duration_secs,
                result.mode,
                result.unit_duration_secs,
                result.repeat_count + 1,
                output
            );
            Ok(())
        }
        Ok(RunOutcome::Cancelled) => {
            warn!("Run cancelled, nothing written");
            std::process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            error!("{}", e.user_message());
            Err(e.into())
        }
    }
}
