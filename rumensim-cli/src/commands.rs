use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use rumensim_config::RumensimConfig;
use rumensim_core::model::{GompertzModel, KineticParams, KineticSummary};
use rumensim_core::thermal;
use rumensim_engine::Supervisor;
use rumensim_telemetry::MetricsRecorder;
use rumensim_transport::{command_channel, LogSink};

#[derive(Parser)]
#[command(version, about = "Rumen fermentation gas-production simulator")]
pub struct Cli {
    /// Path to a configuration YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the flask simulation, publishing telemetry to the log sink
    Run(RunArgs),
    /// Emit a deterministic noise-free pressure series as JSON lines
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of flasks (1-30)
    #[arg(long)]
    pub flasks: Option<u32>,

    /// Virtual sampling interval (1-120 min)
    #[arg(long)]
    pub interval: Option<u32>,

    /// Virtual run duration (hours)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Simulated-to-wall speed multiplier
    #[arg(long)]
    pub speed: Option<f64>,

    /// Relief valve threshold (bar)
    #[arg(long)]
    pub relief_threshold: Option<f64>,

    /// Assay identifier (defaults to a dated SAQ name)
    #[arg(long)]
    pub assay: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Virtual series duration (hours)
    #[arg(long, default_value_t = 48.0)]
    pub duration: f64,

    /// Sampling interval (minutes)
    #[arg(long, default_value_t = 15)]
    pub interval: u32,

    /// Index into the configured kinetic profiles
    #[arg(long, default_value_t = 0)]
    pub profile: usize,
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => RumensimConfig::load_from_path(path)?,
        None => RumensimConfig::load()?,
    };

    match cli.command {
        Commands::Run(args) => run_simulation(config, args).await,
        Commands::Generate(args) => generate_series(config, args),
    }
}

async fn run_simulation(mut config: RumensimConfig, args: RunArgs) -> anyhow::Result<()> {
    if let Some(flasks) = args.flasks {
        config.simulation.num_flasks = flasks;
    }
    if let Some(interval) = args.interval {
        config.simulation.sampling_interval_min = interval;
    }
    if let Some(duration) = args.duration {
        config.simulation.duration_hours = duration;
    }
    if let Some(speed) = args.speed {
        config.simulation.speed_multiplier = speed;
    }
    if let Some(relief) = args.relief_threshold {
        config.safety.relief_threshold = relief;
    }
    if args.assay.is_some() {
        config.simulation.assay_id = args.assay.clone();
    }
    config.ensure_valid()?;

    // Standalone runs publish to the log sink; the command channel is held
    // open so an embedding process could feed control messages instead.
    let (_command_tx, command_source) = command_channel(64);
    let supervisor = Arc::new(Supervisor::new(
        config.clone(),
        Arc::new(LogSink),
        MetricsRecorder::new(),
    )?);
    supervisor.start(command_source)?;

    let wall_seconds =
        config.simulation.duration_hours * 3600.0 / config.simulation.speed_multiplier;
    info!(
        duration_h = config.simulation.duration_hours,
        speed = config.simulation.speed_multiplier,
        wall_seconds,
        "running; ctrl-c stops early"
    );

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs_f64(wall_seconds)) => {
            info!("configured duration elapsed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted by user");
        }
    }

    supervisor.stop().await;
    if let Ok(report) = supervisor.metrics().gather_metrics() {
        debug!(%report, "final metrics");
    }
    Ok(())
}

fn generate_series(config: RumensimConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let profile = config
        .simulation
        .profiles
        .get(args.profile)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "profile index {} out of range ({} configured)",
                args.profile,
                config.simulation.profiles.len()
            )
        })?;

    let model = GompertzModel::new(
        KineticParams {
            a: profile.a,
            mu: profile.mu,
            lambda: profile.lambda,
        },
        config.simulation.baseline_bar,
    )?;

    let series = model.sample_series(args.duration, args.interval);
    for point in &series {
        let p_std = thermal::normalize(point.p_bar, config.simulation.temperature_c);
        println!(
            "{}",
            serde_json::json!({
                "t_hours": point.t_hours,
                "P_bar_abs": rumensim_core::record::round_to(point.p_bar, 3),
                "P_bar_std": rumensim_core::record::round_to(p_std, 3),
            })
        );
    }

    if let Some(summary) = KineticSummary::from_series(&series, model.baseline()) {
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
