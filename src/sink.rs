//! Parquet output with overwrite semantics.

use std::sync::Arc;

use datafusion::arrow::array::AsArray;
use datafusion::arrow::datatypes::{SchemaRef, UInt64Type};
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::error::DataFusionError;
use datafusion::parquet::arrow::ArrowWriter;
use datafusion::prelude::*;
use tracing::{info, instrument};

use crate::error::{JobError, Result};
use crate::storage::{clear_prefix, put_object};

/// Object written when the fact table has no rows.
const EMPTY_PART: &str = "part-0.parquet";

/// Replaces whatever is stored under `location` with `facts` as Parquet.
///
/// `DataFrame::write_parquet` only appends, so previous objects under the
/// prefix are deleted first. An empty fact table still leaves one Parquet
/// file carrying its schema. Returns the number of rows written.
#[instrument(skip(ctx, facts))]
pub async fn write_fact_table(
    ctx: &SessionContext,
    facts: DataFrame,
    location: &str,
) -> Result<u64> {
    let removed = clear_prefix(ctx, location).await?;
    if removed > 0 {
        info!(removed, "cleared previous fact table");
    }

    let schema: SchemaRef = Arc::clone(facts.schema().inner());
    let write_err = |source: DataFusionError| JobError::Write {
        location: location.to_string(),
        source,
    };

    let results = facts
        .write_parquet(location, DataFrameWriteOptions::new(), None)
        .await
        .map_err(write_err)?;

    let written: u64 = results
        .iter()
        .filter_map(|batch| batch.column_by_name("count"))
        .filter_map(|column| column.as_primitive_opt::<UInt64Type>())
        .flat_map(|counts| counts.iter().flatten())
        .sum();

    if written == 0 {
        let bytes = schema_only_parquet(schema).map_err(write_err)?;
        let path = put_object(ctx, location, EMPTY_PART, bytes).await?;
        info!(object = %path, "fact table is empty, wrote schema only");
    }
    Ok(written)
}

/// A Parquet file with `schema` and no row groups.
fn schema_only_parquet(schema: SchemaRef) -> datafusion::error::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let writer = ArrowWriter::try_new(&mut buffer, schema, None)?;
    writer.close()?;
    Ok(buffer)
}
