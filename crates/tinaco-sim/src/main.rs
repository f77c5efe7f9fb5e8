//! Tinaco simulation CLI.
//!
//! Commands:
//! - run: Run the tank with all actors for a fixed time or until Ctrl-C
//! - show-config: Print the effective configuration as JSON

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tinaco_sim::results::{format_duration, timestamped_path};
use tinaco_sim::simulation::DEFAULT_SHUTDOWN_GRACE;
use tinaco_sim::{Simulation, SimulationConfig};

#[derive(Parser)]
#[command(name = "tinaco-sim")]
#[command(version)]
#[command(about = "Rooftop water tank shared by concurrent sources, outlets, and a pump")]
struct Cli {
    /// JSON configuration file (missing fields keep their defaults)
    #[arg(long, env = "TINACO_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation
    Run {
        /// Stop after this many seconds (runs until Ctrl-C if omitted)
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Length of one tick in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Chance of rain per pluvial tick
        #[arg(long)]
        rain_probability: Option<f64>,

        /// Keep rain falling until cleared externally
        #[arg(long)]
        sticky_rain: bool,

        /// Initial level in litres
        #[arg(long)]
        initial_level: Option<f64>,

        /// Random seed for the rain stimulus
        #[arg(long)]
        seed: Option<u64>,

        /// Time each actor gets to stop after cancellation before it is aborted
        #[arg(long, default_value_t = DEFAULT_SHUTDOWN_GRACE.as_millis() as u64)]
        shutdown_grace_ms: u64,

        /// Output file for the run report (timestamp is appended)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };

    match cli.command {
        Commands::Run {
            duration_secs,
            tick_ms,
            rain_probability,
            sticky_rain,
            initial_level,
            seed,
            shutdown_grace_ms,
            output,
        } => {
            if let Some(tick_ms) = tick_ms {
                config.schedule.tick_ms = tick_ms;
            }
            if let Some(probability) = rain_probability {
                config.schedule.rain_probability = probability;
            }
            if sticky_rain {
                config.schedule.sticky_rain = true;
            }
            if let Some(level) = initial_level {
                config.reservoir.initial_level = level;
            }

            let simulation = Simulation::new(config)?
                .with_seed(seed)
                .with_shutdown_grace(Duration::from_millis(shutdown_grace_ms));

            let shutdown = CancellationToken::new();
            let ctrl_c = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Interrupt received");
                        ctrl_c.cancel();
                    }
                    Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
                }
            });

            let report = simulation
                .run(duration_secs.map(Duration::from_secs), shutdown)
                .await?;

            println!("\n=== Simulation Result ===");
            println!("Run: {}", report.run_id);
            println!("Duration: {}", format_duration(report.duration()));
            println!("Final state: {}", report.final_snapshot);
            if let Some(stats) = &report.level_stats {
                println!(
                    "Level: min {:.1}L, max {:.1}L, mean {:.1}L",
                    stats.min_level, stats.max_level, stats.mean_level
                );
                println!("Pump on in {:.1}% of samples", stats.pump_active_ratio * 100.0);
            }
            println!(
                "Samples: {} ({} invariant violations)",
                report.samples_taken, report.invariant_violations
            );

            println!("\nOperations:");
            for (source, count) in &report.events.fills {
                let rejected = report.events.fill_rejections.get(source).copied().unwrap_or(0);
                println!("  {:<9} filled {:>5}  rejected {:>5}", source, count, rejected);
            }
            for (consumer, count) in &report.events.consumptions {
                let rejected = report
                    .events
                    .consumption_rejections
                    .get(consumer)
                    .copied()
                    .unwrap_or(0);
                println!("  {:<9} drew   {:>5}  rejected {:>5}", consumer, count, rejected);
            }
            println!(
                "  Pump      on     {:>5}  off      {:>5}  blocked {:>5}",
                report.events.pump_activations,
                report.events.pump_deactivations,
                report.events.pump_activation_rejections
            );

            println!("\nActors:");
            for actor in &report.actors {
                println!(
                    "  {:<9} ticks {:>5}  successes {:>5}",
                    actor.actor, actor.ticks, actor.successes
                );
            }
            if !report.force_stopped.is_empty() {
                println!("Force-stopped: {}", report.force_stopped.join(", "));
            }

            if let Some(output) = output {
                let output_path = timestamped_path(&output);
                report.save(&output_path)?;
                println!("\nReport saved to: {}", output_path.display());
            }
        }

        Commands::ShowConfig => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
