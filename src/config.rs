//! Job configuration.

use crate::error::{JobError, Result};

/// Default input: the public 2015 green taxi CSVs.
pub const DEFAULT_INPUT: &str =
    "s3://weclouddata/datasets/transformation/nyc_taxi_data/data/green_tripdata_2015-*.csv";

/// Default destination of the weekly fact table.
pub const DEFAULT_OUTPUT: &str = "s3a://emr-transformations/fact_table/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputFormat {
    /// Picked from the location's extension, CSV when there is none.
    #[default]
    Auto,
    Csv,
    Parquet,
}

impl InputFormat {
    /// Resolves `Auto` against a location.
    pub fn resolve(self, location: &str) -> InputFormat {
        match self {
            InputFormat::Auto => {
                let lower = location.trim_end_matches('/').to_ascii_lowercase();
                if lower.ends_with(".parquet") || lower.ends_with(".parq") {
                    InputFormat::Parquet
                } else {
                    InputFormat::Csv
                }
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    /// File, directory or glob holding raw trip records.
    pub input: String,
    /// Destination prefix; existing contents are replaced.
    pub output: String,
    pub input_format: InputFormat,
    /// A group is Lucky when its average tip fraction exceeds this.
    pub generosity_threshold: f64,
    /// Print the pivot summary and a fact table preview to stdout.
    pub report: bool,
    /// DataFusion `target_partitions`; `None` keeps the engine default.
    pub target_partitions: Option<usize>,
}

impl JobConfig {
    pub fn new(
        input: impl Into<String>,
        output: impl Into<String>,
        generosity_threshold: f64,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_format: InputFormat::Auto,
            generosity_threshold,
            report: false,
            target_partitions: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            return Err(JobError::Config("input location is empty".to_string()));
        }
        if self.output.trim().is_empty() {
            return Err(JobError::Config("output location is empty".to_string()));
        }
        if self.input.trim_end_matches('/') == self.output.trim_end_matches('/') {
            return Err(JobError::Config(format!(
                "input and output point at the same location: {}",
                self.output
            )));
        }
        if !self.generosity_threshold.is_finite() || self.generosity_threshold < 0.0 {
            return Err(JobError::Config(format!(
                "generosity threshold must be a finite, non-negative fraction, got {}",
                self.generosity_threshold
            )));
        }
        if self.target_partitions == Some(0) {
            return Err(JobError::Config("target partitions must be at least 1".to_string()));
        }
        Ok(())
    }
}
