//! Cleaning: column pruning, deduplication and calendar columns.

use datafusion::arrow::datatypes::DataType;
use datafusion::functions::datetime::expr_fn::{date_part, to_char};
use datafusion::logical_expr::{cast, ident};
use datafusion::prelude::*;
use tracing::debug;

use crate::error::{JobError, Result};
use crate::schema::*;

/// Prune, deduplicate, derive.
pub fn clean(raw: DataFrame) -> Result<DataFrame> {
    let pruned = prune(raw)?;
    let unique = deduplicate(pruned)?;
    derive_calendar_columns(unique)
}

/// Keeps only the trip columns the fact table needs, renamed to their
/// canonical names and coerced to their canonical types.
///
/// Values that cannot be coerced fail the job once the plan executes.
pub fn prune(raw: DataFrame) -> Result<DataFrame> {
    let resolved =
        resolve_source_columns(raw.schema().fields().iter().map(|f| f.name().as_str()))?;

    let projection: Vec<Expr> = resolved
        .into_iter()
        .map(|(column, header)| {
            debug!(column = column.name, header = %header, "resolved source column");
            cast(ident(header), column.kind.data_type()).alias(column.name)
        })
        .collect();

    raw.select(projection).map_err(JobError::transform("prune"))
}

/// Collapses records that are identical across every retained column.
pub fn deduplicate(df: DataFrame) -> Result<DataFrame> {
    df.distinct().map_err(JobError::transform("deduplicate"))
}

/// Adds date, `HH:MM:SS` time, ISO week and day of week (1 = Sunday) for both
/// pickup and dropoff.
pub fn derive_calendar_columns(df: DataFrame) -> Result<DataFrame> {
    let derived = [
        (PICKUP_DATETIME, PICKUP_DATE, PICKUP_TIME, PICKUP_WEEK, PICKUP_DAY_OF_WEEK),
        (DROPOFF_DATETIME, DROPOFF_DATE, DROPOFF_TIME, DROPOFF_WEEK, DROPOFF_DAY_OF_WEEK),
    ];

    let mut df = df;
    for (source, date, time, week, day_of_week) in derived {
        df = df
            .with_column(date, cast(col(source), DataType::Date32))
            .and_then(|df| df.with_column(time, to_char(col(source), lit("%H:%M:%S"))))
            .and_then(|df| df.with_column(week, iso_week(col(source))))
            .and_then(|df| df.with_column(day_of_week, day_of_week_sunday_first(col(source))))
            .map_err(JobError::transform("derive calendar columns"))?;
    }
    Ok(df)
}

fn iso_week(ts: Expr) -> Expr {
    cast(date_part(lit("week"), ts), DataType::Int32)
}

fn day_of_week_sunday_first(ts: Expr) -> Expr {
    // `dow` counts from Sunday = 0
    cast(date_part(lit("dow"), ts), DataType::Int32) + lit(1_i32)
}
