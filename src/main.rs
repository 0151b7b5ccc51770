use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nyc_taxi_fact::config::{DEFAULT_INPUT, DEFAULT_OUTPUT};
use nyc_taxi_fact::{logging, InputFormat, JobConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "nyc_taxi_fact",
    about = "Weekly NYC taxi fact table (tips, fares, distances) using DataFusion"
)]
struct Args {
    /// Raw trip records: a file, a directory or a glob, local or s3://
    #[arg(long, env = "TAXI_FACT_INPUT", default_value = DEFAULT_INPUT)]
    input: String,

    /// Destination of the fact table; its current contents are replaced
    #[arg(long, env = "TAXI_FACT_OUTPUT", default_value = DEFAULT_OUTPUT)]
    output: String,

    #[arg(long, env = "TAXI_FACT_INPUT_FORMAT", value_enum, default_value_t = InputFormat::Auto)]
    input_format: InputFormat,

    /// Average tip fraction above which a group is flagged Lucky (e.g. 0.25)
    #[arg(long, env = "TAXI_FACT_GENEROSITY_THRESHOLD")]
    generosity_threshold: f64,

    /// Do not print the pivot summary and fact table preview
    #[arg(long, env = "TAXI_FACT_SKIP_REPORT")]
    skip_report: bool,

    /// DataFusion target partitions (defaults to the number of CPUs)
    #[arg(long, env = "TAXI_FACT_TARGET_PARTITIONS")]
    target_partitions: Option<usize>,

    /// Also write JSON logs to this file (rotated daily)
    #[arg(long, env = "TAXI_FACT_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> JobConfig {
        JobConfig {
            input: self.input,
            output: self.output,
            input_format: self.input_format,
            generosity_threshold: self.generosity_threshold,
            report: !self.skip_report,
            target_partitions: self.target_partitions,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let _log_guard = logging::init(args.log_file.as_deref());

    let config = args.into_config();
    info!(input = %config.input, output = %config.output, "starting fact table job");

    match nyc_taxi_fact::run(&config).await {
        Ok(summary) => {
            info!(fact_rows = summary.fact_rows, output = %summary.output, "job completed");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "job failed");
            Err(e).context("fact table job failed")
        }
    }
}
