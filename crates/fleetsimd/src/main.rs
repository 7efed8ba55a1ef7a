//! fleetsimd: the fleet simulation daemon.
//!
//! Loads `fleetsim.toml`, builds the engine and runs the simulation and
//! scaling loops until Ctrl-C (or a fixed duration), logging a summary of
//! the operational pool at a regular interval.
//!
//! # Usage
//!
//! ```text
//! fleetsimd run --config fleetsim.toml --tick-interval 1s --seed 42
//! fleetsimd run --duration 2m --inject disk-full-cascade --dump
//! fleetsimd config > fleetsim.toml
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fleetsim_core::config::parse_duration;
use fleetsim_core::{EngineConfig, FleetConfig};
use fleetsim_engine::FleetEngine;

const DEFAULT_FILTER: &str = "info,fleetsimd=debug,fleetsim=debug";

#[derive(Parser)]
#[command(name = "fleetsimd", about = "Fleet simulation and autoscaling daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the simulation.
    Run {
        /// Path to fleetsim.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the simulation tick interval (e.g. "1s", "250ms").
        #[arg(long)]
        tick_interval: Option<String>,

        /// Override the scaling policy interval (e.g. "30s").
        #[arg(long)]
        policy_interval: Option<String>,

        /// Seed for the random source; entropy when omitted.
        #[arg(long)]
        seed: Option<u64>,

        /// Stop after this long instead of waiting for Ctrl-C.
        #[arg(long)]
        duration: Option<String>,

        /// How often to log the operational pool summary.
        #[arg(long, default_value = "30s")]
        report_interval: String,

        /// Failure scenarios to inject right after start.
        #[arg(long = "inject")]
        inject: Vec<String>,

        /// Print the final aggregated view as JSON on exit.
        #[arg(long)]
        dump: bool,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },

    /// Print the default configuration as TOML.
    Config,
}

/// Settings for one `run` invocation after parsing.
struct RunOptions {
    engine: EngineConfig,
    duration: Option<Duration>,
    report_interval: Duration,
    inject: Vec<String>,
    dump: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            tick_interval,
            policy_interval,
            seed,
            duration,
            report_interval,
            inject,
            dump,
            log_json,
        } => {
            init_tracing(log_json);
            let mut engine = load_config(config.as_deref())?;
            apply_overrides(
                &mut engine,
                tick_interval.as_deref(),
                policy_interval.as_deref(),
                seed,
            )?;
            let options = RunOptions {
                engine,
                duration: duration.as_deref().map(parse_duration).transpose()?,
                report_interval: parse_duration(&report_interval)?,
                inject,
                dump,
            };
            run(options).await
        }
        Command::Config => {
            print!("{}", FleetConfig::defaults().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let file = match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            FleetConfig::from_file(path)?
        }
        None => FleetConfig::default(),
    };
    Ok(file.resolve()?)
}

/// Layer command-line flags over the file configuration.
fn apply_overrides(
    config: &mut EngineConfig,
    tick_interval: Option<&str>,
    policy_interval: Option<&str>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    if let Some(s) = tick_interval {
        config.tick_interval = parse_duration(s)?;
    }
    if let Some(s) = policy_interval {
        config.policy_interval = parse_duration(s)?;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate()?;
    Ok(())
}

async fn run(options: RunOptions) -> anyhow::Result<()> {
    info!(
        tick_interval = ?options.engine.tick_interval,
        policy_interval = ?options.engine.policy_interval,
        seed = ?options.engine.seed,
        "fleetsimd starting"
    );

    let engine = FleetEngine::new(options.engine)?;
    engine.start().await?;

    for id in &options.inject {
        match engine.inject_scenario(id).await {
            Ok(fired) => info!(scenario = %id, steps_fired = fired, "scenario injected"),
            Err(e) => warn!(scenario = %id, error = %e, "scenario injection failed"),
        }
    }

    let deadline = async {
        match options.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(options.report_interval) => {
                report(&engine).await;
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                info!("shutdown signal received");
                break;
            }
            _ = &mut deadline => {
                info!("run duration elapsed");
                break;
            }
        }
    }

    engine.stop().await?;

    if options.dump {
        let view = engine.aggregated_view().await;
        println!("{}", serde_json::to_string_pretty(&view)?);
    }

    info!("fleetsimd stopped");
    Ok(())
}

async fn report(engine: &FleetEngine) {
    let view = engine.aggregated_view().await;
    let run = engine.snapshot().await.run;
    let pool = &view.operational_summary;
    info!(
        tick = run.tick,
        servers = pool.total_servers,
        healthy = pool.healthy,
        warning = pool.warning,
        critical = pool.critical,
        avg_cpu = format_args!("{:.1}", pool.avg_cpu),
        avg_memory = format_args!("{:.1}", pool.avg_memory),
        active_scenarios = ?run.active_scenarios,
        scaling_events = view.recent_scaling_events.len(),
        "operational pool"
    );
}
