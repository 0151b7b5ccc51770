//! Ingest of raw trip records.

use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::error::DataFusionError;
use datafusion::prelude::*;
use tracing::{debug, info};

use crate::config::InputFormat;
use crate::error::{JobError, Result};

/// Reads every trip record under `location` into a single DataFrame.
///
/// The location may be a file, a directory or a glob such as
/// `green_tripdata_2015-*.csv`. CSV input must have a header row. Every CSV
/// column is read as text and typed later by [`crate::clean::prune`], so a
/// column whose leading rows all look like integers still accepts decimals
/// further down.
pub async fn read_trips(
    ctx: &SessionContext,
    location: &str,
    format: InputFormat,
) -> Result<DataFrame> {
    let format = format.resolve(location);
    info!(location, ?format, "reading trip records");

    let ingest_err = |source: DataFusionError| JobError::Ingest {
        location: location.to_string(),
        source,
    };

    match format {
        InputFormat::Parquet => ctx
            .read_parquet(location, ParquetReadOptions::default())
            .await
            .map_err(ingest_err),
        InputFormat::Csv | InputFormat::Auto => {
            let schema = csv_text_schema(ctx, location).await.map_err(ingest_err)?;
            ctx.read_csv(location, CsvReadOptions::new().has_header(true).schema(&schema))
                .await
                .map_err(ingest_err)
        }
    }
}

/// The CSV header with every column typed as nullable `Utf8`.
async fn csv_text_schema(
    ctx: &SessionContext,
    location: &str,
) -> datafusion::error::Result<Schema> {
    let sampled = ctx
        .read_csv(
            location,
            CsvReadOptions::new().has_header(true).schema_infer_max_records(1),
        )
        .await?;

    let fields: Vec<Field> = sampled
        .schema()
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    debug!(columns = fields.len(), "reading CSV columns as text");
    Ok(Schema::new(fields))
}
