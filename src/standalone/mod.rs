use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;

pub mod engine;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Glob pattern for the input CSV files
    #[arg(short, long)]
    pub input: String,

    /// Output CSV file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Name of the workload
    #[arg(short, long, default_value = "weather")]
    pub workload: String,

    /// Records per batch
    #[arg(long, default_value_t = 1_000_000)]
    pub batch: usize,

    /// Workers per dispatcher
    #[arg(long)]
    pub workers: Option<usize>,

    /// Inbound queue capacity per dispatcher
    #[arg(long)]
    pub queue: Option<usize>,

    /// Broadcast timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Number of dispatchers subscribed to the producer
    #[arg(long)]
    pub dispatchers: Option<usize>,

    /// JSON file with pipeline settings; flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Defaults, then the config file, then flags.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(queue) = self.queue {
            config.queue_capacity = queue;
        }
        if let Some(secs) = self.timeout {
            config.broadcast_timeout = Duration::from_secs(secs);
        }
        if let Some(dispatchers) = self.dispatchers {
            config.dispatchers = dispatchers;
        }
        config.validate()?;
        Ok(config)
    }
}

/// A parsed standalone run.
#[derive(Debug, Clone)]
pub struct Job {
    pub input: String,
    pub workload: String,
    pub output: PathBuf,
    pub batch_size: usize,
    pub config: PipelineConfig,
}

impl TryFrom<Args> for Job {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        let config = args.pipeline_config()?;
        Ok(Job {
            input: args.input,
            workload: args.workload,
            output: args.output,
            batch_size: args.batch,
            config,
        })
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 3)
        .init();

    debug!("standalone started with verbosity level: {}", verbose);
}
