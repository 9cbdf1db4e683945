//! limvid CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use vid_engine::{draw_histograms, DrawChannel, GaussLegendre, VidConfig, VidModel};

#[derive(Parser)]
#[command(name = "limvid")]
#[command(about = "limvid - voxel intensity distributions for line-intensity mapping")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the VID (densities and binned probabilities)
    Run {
        /// Configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Histogram Monte Carlo maps drawn from the same population
    Draw {
        /// Configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Number of independent maps.
        #[arg(long, default_value = "100")]
        draws: usize,

        /// Voxels per map.
        #[arg(long, default_value = "10000")]
        voxels: usize,

        /// Seed of the first map; map `d` uses `seed + d`.
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Gaussian term added to each voxel.
        #[arg(long, value_enum, default_value = "full")]
        channel: ChannelArg,

        /// Also report the analytic binned VID of the same channel.
        #[arg(long)]
        compare: bool,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Write a Gauss-Legendre table for `quadrature.ft` / `quadrature.ift`
    Quadrature {
        /// Number of nodes.
        #[arg(long)]
        order: usize,

        /// Destination file.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the default configuration as JSON
    Defaults,

    /// Print version
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelArg {
    /// Stabilization width only.
    Control,
    /// Instrument noise.
    Full,
}

impl From<ChannelArg> for DrawChannel {
    fn from(c: ChannelArg) -> Self {
        match c {
            ChannelArg::Control => DrawChannel::Control,
            ChannelArg::Full => DrawChannel::Full,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).with_writer(std::io::stderr).init();

    match cli.command {
        Commands::Run { config, output, threads } => cmd_run(&config, output.as_ref(), threads),
        Commands::Draw { config, draws, voxels, seed, channel, compare, output, threads } => {
            cmd_draw(&config, draws, voxels, seed, channel.into(), compare, output.as_ref(), threads)
        }
        Commands::Quadrature { order, output } => cmd_quadrature(order, &output),
        Commands::Defaults => write_json(None, serde_json::to_value(VidConfig::default())?),
        Commands::Version => {
            println!("limvid {}", vid_core::VERSION);
            Ok(())
        }
    }
}

fn load_model(config: &Path, threads: usize) -> Result<VidModel> {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    tracing::info!(path = %config.display(), "loading configuration");
    let cfg = VidConfig::from_path(config).with_context(|| format!("invalid configuration {}", config.display()))?;
    let model = VidModel::new(cfg)?;
    tracing::info!(population = ?model.population(), "population resolved");
    Ok(model)
}

fn cmd_run(config: &Path, output: Option<&PathBuf>, threads: usize) -> Result<()> {
    let mut model = load_model(config, threads)?;
    let report = model.report().context("VID computation failed")?;
    tracing::info!(
        z = report.redshift,
        mean_intensity = report.mean_intensity,
        occupancy = report.mean_occupancy,
        norm = report.pt.norm,
        "VID computed"
    );
    write_json(output, serde_json::to_value(&report)?)
}

#[allow(clippy::too_many_arguments)]
fn cmd_draw(
    config: &Path,
    draws: usize,
    voxels: usize,
    seed: u64,
    channel: DrawChannel,
    compare: bool,
    output: Option<&PathBuf>,
    threads: usize,
) -> Result<()> {
    let mut model = load_model(config, threads)?;
    let result = draw_histograms(&mut model, draws, voxels, seed, channel).context("Monte Carlo draw failed")?;
    tracing::info!(draws, voxels, seed, "maps drawn");

    let analytic = if compare {
        let binned = match channel {
            DrawChannel::Control => model.bi_s()?,
            DrawChannel::Full => model.bi()?,
        };
        Some(binned.probabilities.clone())
    } else {
        None
    };

    let output_json = serde_json::json!({
        "unit": result.unit,
        "seed": seed,
        "n_draws": draws,
        "n_voxels": voxels,
        "channel": channel,
        "edges": result.edges,
        "mean_probabilities": result.mean_probabilities,
        "analytic_probabilities": analytic,
        "counts": result.counts,
    });
    write_json(output, output_json)
}

fn cmd_quadrature(order: usize, output: &Path) -> Result<()> {
    let rule = GaussLegendre::new(order)?;
    rule.write_table(output).with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(order, path = %output.display(), "quadrature table written");
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
