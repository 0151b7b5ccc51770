//! Average tip fraction by pickup day of week and payment type.
//!
//! A reporting cross-tab: it is printed, never written with the fact table.

use datafusion::arrow::datatypes::Int64Type;
use datafusion::functions_aggregate::expr_fn::avg;
use datafusion::logical_expr::when;
use datafusion::prelude::*;
use tracing::instrument;

use crate::error::{JobError, Result};
use crate::fact::{primitive, value_at};
use crate::schema::{payment_type_label, PAYMENT_TYPE, PICKUP_DAY_OF_WEEK, TIP_FRACTION};

/// Payment type codes present in `tipped`, ascending, nulls first.
pub async fn payment_types(tipped: &DataFrame) -> Result<Vec<Option<i64>>> {
    let batches = tipped
        .clone()
        .select(vec![col(PAYMENT_TYPE)])
        .and_then(|df| df.distinct())
        .and_then(|df| df.sort(vec![col(PAYMENT_TYPE).sort(true, true)]))
        .map_err(JobError::transform("pivot"))?
        .collect()
        .await
        .map_err(JobError::transform("pivot"))?;

    let mut codes = Vec::new();
    for batch in &batches {
        let column = primitive::<Int64Type>(batch, PAYMENT_TYPE)?;
        codes.extend((0..batch.num_rows()).map(|row| value_at(column, row)));
    }
    Ok(codes)
}

/// One row per pickup day of week (1 = Sunday), one column per payment type,
/// each cell the mean tip fraction of the matching rides.
#[instrument(skip(tipped))]
pub async fn tip_fraction_by_weekday(tipped: &DataFrame) -> Result<DataFrame> {
    let codes = payment_types(tipped).await?;

    let mut cells = Vec::with_capacity(codes.len());
    for code in codes {
        let matches = match code {
            Some(code) => col(PAYMENT_TYPE).eq(lit(code)),
            None => col(PAYMENT_TYPE).is_null(),
        };
        let tip_fraction = when(matches, col(TIP_FRACTION))
            .end()
            .map_err(JobError::transform("pivot"))?;
        cells.push(avg(tip_fraction).alias(payment_type_label(code)));
    }

    tipped
        .clone()
        .aggregate(vec![col(PICKUP_DAY_OF_WEEK)], cells)
        .and_then(|df| df.sort(vec![col(PICKUP_DAY_OF_WEEK).sort(true, true)]))
        .map_err(JobError::transform("pivot"))
}
