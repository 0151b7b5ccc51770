//! Pretty-printed DataFrames on stdout.

use datafusion::arrow::util::pretty::pretty_format_batches;
use datafusion::error::DataFusionError;
use datafusion::prelude::*;

use crate::error::{JobError, Result};

/// Rows of the fact table shown in the stdout preview.
pub const PREVIEW_ROWS: usize = 20;

pub async fn print_df(title: &str, df: DataFrame) -> Result<()> {
    let batches = df.collect().await.map_err(JobError::transform("report"))?;
    let formatted = pretty_format_batches(&batches)
        .map_err(DataFusionError::from)
        .map_err(JobError::transform("report"))?;
    println!("\n--- {} ---", title);
    println!("{}", formatted);
    Ok(())
}
