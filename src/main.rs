//! Command line driver
//!
//! Steady state of the cylinder wake at Re 60, reached through continuation:
//! ```text
//! cargo run --release -- --flow cylinder steady --ramp 20,40,60 --checkpoint cyl.json
//! ```
//! Restart from the checkpoint and integrate in time:
//! ```text
//! RUST_LOG=info cargo run --release -- --restart cyl.json run --time 5 --dt 0.02
//! ```
use clap::{Parser, Subcommand};
use flowctl::callbacks::{CheckpointCallback, LogCallback};
use flowctl::config::{FlowConfig, FlowKind, Resolution};
use flowctl::flow::{ramp_reynolds, Backend, Transient};
use flowctl::{integrate, Flow, FlowVariant, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowctl", version, about = "Finite-element flows for flow control")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Flow to build, overrides the configuration file
    #[arg(short, long, value_enum)]
    flow: Option<FlowKind>,

    /// Reynolds number
    #[arg(long)]
    re: Option<f64>,

    /// Mesh resolution
    #[arg(long, value_enum)]
    resolution: Option<Resolution>,

    /// Start from a checkpoint instead of the rest state. Without `--flow`
    /// the flow stored in the checkpoint is rebuilt.
    #[arg(long, value_name = "FILE")]
    restart: Option<PathBuf>,

    /// Control values, comma separated
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    control: Vec<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve for the steady state
    Steady {
        /// Reynolds numbers to ramp through, comma separated
        #[arg(long, value_delimiter = ',')]
        ramp: Vec<f64>,

        /// Write the result to this checkpoint
        #[arg(long, value_name = "FILE")]
        checkpoint: Option<PathBuf>,
    },
    /// Integrate in time
    Run {
        /// Time step
        #[arg(long, default_value_t = 0.01)]
        dt: f64,

        /// Final time
        #[arg(long, default_value_t = 1.)]
        time: f64,

        /// Log every n steps
        #[arg(long, default_value_t = 10)]
        log_every: usize,

        /// Amplitude of the initial noise
        #[arg(long)]
        noise: Option<f64>,

        /// Checkpoint file, overwritten during the run
        #[arg(long, value_name = "FILE")]
        checkpoint: Option<PathBuf>,

        /// Checkpoint every n steps
        #[arg(long, default_value_t = 100)]
        checkpoint_every: usize,
    },
    /// Linearize around the steady state
    Linearize {
        /// Operator storage
        #[arg(long, value_enum, default_value_t = Backend::Sparse)]
        backend: Backend,
    },
}

fn build_config(cli: &Cli) -> Result<FlowConfig> {
    let mut config = match &cli.config {
        Some(path) => FlowConfig::from_file(path)?,
        None => FlowConfig::default(),
    };
    if let Some(kind) = cli.flow {
        config.kind = kind;
    }
    if let Some(re) = cli.re {
        config.reynolds = Some(re);
    }
    if let Some(resolution) = cli.resolution {
        config.resolution = resolution;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    let mut flow = match (&cli.restart, cli.flow) {
        (Some(path), Some(_)) => FlowVariant::from_checkpoint(path, &config)?,
        (Some(path), None) => FlowVariant::restart(path, &config)?,
        (None, _) => FlowVariant::new(&config)?,
    };
    if !cli.control.is_empty() {
        flow.set_control(&cli.control)?;
    }
    tracing::info!(
        flow = flow.kind().name(),
        reynolds = flow.reynolds(),
        dofs = flow.state().len(),
        "flow ready"
    );

    match cli.command {
        Command::Steady { ramp, checkpoint } => {
            if ramp.is_empty() {
                flow.solve_steady()?;
            } else {
                ramp_reynolds(&mut flow, &ramp)?;
            }
            tracing::info!(observation = ?flow.collect_observations()?, "steady state");
            if let Some(path) = checkpoint {
                flow.save_checkpoint(&path)?;
            }
        }
        Command::Run {
            dt,
            time,
            log_every,
            noise,
            checkpoint,
            checkpoint_every,
        } => {
            if let Some(amp) = noise {
                flow.random_disturbance(amp)?;
            }
            let mut solver = Transient::new(flow, dt)?;
            solver.add_callback(Box::new(LogCallback::new(log_every, dt)));
            if let Some(path) = &checkpoint {
                solver.add_callback(Box::new(CheckpointCallback::new(checkpoint_every, path)));
            }
            integrate(&mut solver, time, None)?;
            if let Some(path) = &checkpoint {
                solver.flow().save_checkpoint(path)?;
            }
        }
        Command::Linearize { backend } => {
            let base = flow.solve_steady()?;
            for index in 0..flow.num_controls() {
                let sens = flow.control_sensitivity(index)?;
                tracing::info!(index, observation = ?sens.observation, "control sensitivity");
            }
            let control = flow.num_controls() > 0;
            let system = flow.linearize(&base, control, backend)?;
            tracing::info!(
                size = system.len(),
                controls = system.control.as_ref().map_or(0, Vec::len),
                ?backend,
                "linearized"
            );
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
