//! HPA simulator CLI
//!
//! Computes the replica count a horizontal pod autoscaler would choose for
//! a workload, live against a cluster or from a recorded fixture.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{decide, replay, simulate};
use simulator_lib::config::{
    DEFAULT_CPU_INITIALIZATION_PERIOD, DEFAULT_INITIAL_READINESS_DELAY, DEFAULT_SYNC_INTERVAL,
    DEFAULT_TARGET_UTILIZATION_PERCENT, DEFAULT_TOLERANCE,
};
use simulator_lib::{ErrorPolicy, LoopConfig, ResourceName, SimulationConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// HPA replica decision simulator
#[derive(Parser)]
#[command(name = "hpasim")]
#[command(author, version, about = "Horizontal pod autoscaler decision simulator", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Namespace of the workload
    #[arg(long, short, default_value = "default", global = true)]
    pub namespace: String,

    /// Label selector of the workload's pods (e.g. app=web,tier!=cache)
    #[arg(long, short = 'l', default_value = "", global = true)]
    pub selector: String,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Parameters of the replica calculation
#[derive(Args, Debug, Clone)]
pub struct TuningArgs {
    /// Resource the target utilization applies to
    #[arg(long, default_value = ResourceName::CPU)]
    pub resource: String,

    /// Target average utilization, percent of request
    #[arg(long, default_value_t = DEFAULT_TARGET_UTILIZATION_PERCENT)]
    pub target_utilization: u32,

    /// Deadband around a usage ratio of 1.0
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Seconds after start during which unready CPU samples are distrusted
    #[arg(long, default_value_t = DEFAULT_CPU_INITIALIZATION_PERIOD.as_secs())]
    pub cpu_initialization_period: u64,

    /// Seconds after start before an unready pod counts as having been ready
    #[arg(long, default_value_t = DEFAULT_INITIAL_READINESS_DELAY.as_secs())]
    pub initial_readiness_delay: u64,
}

impl TuningArgs {
    pub fn simulation_config(&self, namespace: &str, selector: &str) -> Result<SimulationConfig> {
        Ok(SimulationConfig::new(namespace, selector)?
            .with_resource(ResourceName::new(self.resource.as_str()))
            .with_target_utilization(self.target_utilization)
            .with_tolerance(self.tolerance)
            .with_cpu_initialization_period(Duration::from_secs(self.cpu_initialization_period))
            .with_initial_readiness_delay(Duration::from_secs(self.initial_readiness_delay))
            .validate()?)
    }
}

/// Cadence and failure handling of repeated cycles
#[derive(Args, Debug, Clone)]
pub struct LoopArgs {
    /// Seconds between cycles
    #[arg(long, default_value_t = DEFAULT_SYNC_INTERVAL.as_secs())]
    pub interval: u64,

    /// Stop on the first failed cycle instead of retrying
    #[arg(long)]
    pub stop_on_error: bool,

    /// Replica count assumed before the first decision
    #[arg(long, default_value_t = 1)]
    pub initial_replicas: u32,
}

impl LoopArgs {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            interval: Duration::from_secs(self.interval),
            on_error: if self.stop_on_error {
                ErrorPolicy::Stop
            } else {
                ErrorPolicy::Continue
            },
            initial_replicas: self.initial_replicas,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the decision loop against the live cluster
    Simulate {
        #[command(flatten)]
        tuning: TuningArgs,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Report utilization on an interval without recommending a replica count
    Watch {
        #[command(flatten)]
        tuning: TuningArgs,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Replay a recorded fixture through the decision engine
    Replay {
        /// Path to the fixture JSON file
        fixture: PathBuf,

        #[command(flatten)]
        tuning: TuningArgs,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Compute a single decision from the current cluster state
    Decide {
        #[command(flatten)]
        tuning: TuningArgs,

        /// Replica count currently in effect
        #[arg(long, default_value_t = 1)]
        current_replicas: u32,

        /// Only report utilization
        #[arg(long)]
        observe_only: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cluster = commands::ClusterArgs {
        kubeconfig: cli.kubeconfig.as_deref(),
        context: cli.context.as_deref(),
    };

    match &cli.command {
        Commands::Simulate { tuning, loop_args } => {
            let config = tuning.simulation_config(&cli.namespace, &cli.selector)?;
            simulate::run(&cluster, config, loop_args.loop_config(), cli.format).await?;
        }
        Commands::Watch { tuning, loop_args } => {
            let config = tuning.simulation_config(&cli.namespace, &cli.selector)?;
            simulate::watch(&cluster, config, loop_args.loop_config(), cli.format).await?;
        }
        Commands::Replay {
            fixture,
            tuning,
            loop_args,
        } => {
            let config = tuning.simulation_config(&cli.namespace, &cli.selector)?;
            replay::run(fixture, config, loop_args.loop_config(), cli.format).await?;
        }
        Commands::Decide {
            tuning,
            current_replicas,
            observe_only,
        } => {
            let config = tuning.simulation_config(&cli.namespace, &cli.selector)?;
            decide::run(&cluster, config, *current_replicas, *observe_only, cli.format).await?;
        }
    }

    Ok(())
}
