use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use mrflow::records::{BatchReader, StationWriter};
use mrflow::standalone::{engine::run_pipeline, init_logging, Args, Job};
use mrflow::workload;
use tracing::info;

async fn run_standalone_job(job: Job) -> Result<()> {
    let engine = workload::named(&job.workload)?;
    let reader = BatchReader::open(&job.input, job.batch_size)?;

    let results = run_pipeline(&job.config, engine, reader).await?;

    let mut writer = StationWriter::new();
    writer.process_data(results);
    writer.write_data(&job.output)?;
    info!(stations = writer.len(), output = %job.output.display(), "results written");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let job = Job::try_from(args)?;

    let started = Instant::now();
    run_standalone_job(job).await?;
    info!(elapsed = ?started.elapsed(), "total execution time");
    Ok(())
}
