//! Weekly fact table.
//!
//! Rides with a positive fare get a tip fraction and a generous-customer
//! flag, then collapse to one row per `{pickup_week, vendor_id, trip_type,
//! payment_type}`. Every aggregate is a sum, count or mean, so the result does
//! not depend on how the input is partitioned.

use datafusion::arrow::array::{Array, AsArray, PrimitiveArray};
use datafusion::arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float64Type, Int32Type, Int64Type,
};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::functions_aggregate::expr_fn::{avg, count, sum};
use datafusion::logical_expr::{cast, SortExpr};
use datafusion::prelude::*;
use tracing::{info, instrument};

use crate::error::{JobError, Result};
use crate::schema::*;

/// Drops rides with a zero, negative or missing fare and adds
/// `tip_fraction = tip_amount / fare_amount`.
pub fn with_tip_fraction(cleaned: DataFrame) -> Result<DataFrame> {
    cleaned
        .filter(col(FARE_AMOUNT).gt(lit(0.0)))
        .and_then(|df| df.with_column(TIP_FRACTION, col(TIP_AMOUNT) / col(FARE_AMOUNT)))
        .map_err(JobError::transform("tip fraction"))
}

/// Mean tip amount over every tip-bearing ride, `None` when there are none.
pub async fn average_tip_amount(tipped: &DataFrame) -> Result<Option<f64>> {
    let batches = tipped
        .clone()
        .aggregate(vec![], vec![avg(col(TIP_AMOUNT)).alias(AVG_TIP_AMOUNT)])
        .map_err(JobError::transform("average tip"))?
        .collect()
        .await
        .map_err(JobError::transform("average tip"))?;

    let mut average = None;
    for batch in &batches {
        let values = primitive::<Float64Type>(batch, AVG_TIP_AMOUNT)?;
        if let Some(value) = (0..values.len()).find_map(|row| value_at(values, row)) {
            average = Some(value);
        }
    }
    Ok(average)
}

/// Flags rides whose tip is strictly above `average_tip`.
pub fn flag_generous_customers(tipped: DataFrame, average_tip: Option<f64>) -> Result<DataFrame> {
    let flag = match average_tip {
        Some(average) => col(TIP_AMOUNT).gt(lit(average)),
        None => lit(false),
    };
    tipped
        .with_column(GENEROUS_CUSTOMER, flag)
        .map_err(JobError::transform("generous customers"))
}

/// Groups flagged rides into fact rows and sets `lucky` when the group's
/// average tip fraction exceeds `generosity_threshold`. Sorted by key.
pub fn aggregate_fact_rows(flagged: DataFrame, generosity_threshold: f64) -> Result<DataFrame> {
    let group_by: Vec<Expr> = FACT_KEY.iter().map(|name| col(*name)).collect();
    let order_by: Vec<SortExpr> = FACT_KEY.iter().map(|name| col(*name).sort(true, true)).collect();

    flagged
        .aggregate(
            group_by,
            vec![
                count(lit(1)).alias(TRIP_COUNT),
                sum(col(PASSENGER_COUNT)).alias(TOTAL_PASSENGER_COUNT),
                avg(col(PASSENGER_COUNT)).alias(AVG_PASSENGER_COUNT),
                sum(col(TRIP_DISTANCE)).alias(TOTAL_TRIP_DISTANCE),
                avg(col(TRIP_DISTANCE)).alias(AVG_TRIP_DISTANCE),
                sum(col(FARE_AMOUNT)).alias(TOTAL_FARE_AMOUNT),
                avg(col(FARE_AMOUNT)).alias(AVG_FARE_AMOUNT),
                avg(col(TIP_AMOUNT)).alias(AVG_TIP_AMOUNT),
                avg(col(TIP_FRACTION)).alias(AVG_TIP_FRACTION),
                sum(cast(col(GENEROUS_CUSTOMER), DataType::Int64)).alias(GENEROUS_CUSTOMER_COUNT),
            ],
        )
        .and_then(|df| {
            df.with_column(
                LUCKY,
                col(AVG_TIP_FRACTION).gt(lit(generosity_threshold)).is_true(),
            )
        })
        .and_then(|df| df.sort(order_by))
        .map_err(JobError::transform("fact aggregation"))
}

/// Full fact stage on cleaned records: tip fraction, generous flag, grouping.
#[instrument(skip(cleaned))]
pub async fn build_fact_table(cleaned: DataFrame, generosity_threshold: f64) -> Result<DataFrame> {
    let tipped = with_tip_fraction(cleaned)?;
    let average_tip = average_tip_amount(&tipped).await?;
    info!(?average_tip, "average tip amount over tip-bearing rides");

    let flagged = flag_generous_customers(tipped, average_tip)?;
    aggregate_fact_rows(flagged, generosity_threshold)
}

/// One row of the weekly fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub pickup_week: Option<i32>,
    pub vendor_id: Option<i64>,
    pub trip_type: Option<i64>,
    pub payment_type: Option<i64>,
    pub trip_count: i64,
    pub total_passenger_count: Option<i64>,
    pub avg_passenger_count: Option<f64>,
    pub total_trip_distance: Option<f64>,
    pub avg_trip_distance: Option<f64>,
    pub total_fare_amount: Option<f64>,
    pub avg_fare_amount: Option<f64>,
    pub avg_tip_amount: Option<f64>,
    pub avg_tip_fraction: Option<f64>,
    pub generous_customer_count: Option<i64>,
    pub lucky: bool,
}

impl FactRow {
    pub fn key(&self) -> (Option<i32>, Option<i64>, Option<i64>, Option<i64>) {
        (self.pickup_week, self.vendor_id, self.trip_type, self.payment_type)
    }

    /// Reads fact rows back out of collected batches.
    pub fn from_batches(batches: &[RecordBatch]) -> Result<Vec<FactRow>> {
        let mut rows = Vec::new();
        for batch in batches {
            let week = primitive::<Int32Type>(batch, PICKUP_WEEK)?;
            let vendor = primitive::<Int64Type>(batch, VENDOR_ID)?;
            let trip_type = primitive::<Int64Type>(batch, TRIP_TYPE)?;
            let payment = primitive::<Int64Type>(batch, PAYMENT_TYPE)?;
            let trip_count = primitive::<Int64Type>(batch, TRIP_COUNT)?;
            let total_passengers = primitive::<Int64Type>(batch, TOTAL_PASSENGER_COUNT)?;
            let avg_passengers = primitive::<Float64Type>(batch, AVG_PASSENGER_COUNT)?;
            let total_distance = primitive::<Float64Type>(batch, TOTAL_TRIP_DISTANCE)?;
            let avg_distance = primitive::<Float64Type>(batch, AVG_TRIP_DISTANCE)?;
            let total_fare = primitive::<Float64Type>(batch, TOTAL_FARE_AMOUNT)?;
            let avg_fare = primitive::<Float64Type>(batch, AVG_FARE_AMOUNT)?;
            let avg_tip = primitive::<Float64Type>(batch, AVG_TIP_AMOUNT)?;
            let avg_fraction = primitive::<Float64Type>(batch, AVG_TIP_FRACTION)?;
            let generous = primitive::<Int64Type>(batch, GENEROUS_CUSTOMER_COUNT)?;
            let lucky = batch
                .column_by_name(LUCKY)
                .and_then(|c| c.as_boolean_opt())
                .ok_or_else(|| {
                    JobError::Schema(format!("fact column {LUCKY} is missing or not Boolean"))
                })?;

            for row in 0..batch.num_rows() {
                rows.push(FactRow {
                    pickup_week: value_at(week, row),
                    vendor_id: value_at(vendor, row),
                    trip_type: value_at(trip_type, row),
                    payment_type: value_at(payment, row),
                    trip_count: value_at(trip_count, row).unwrap_or_default(),
                    total_passenger_count: value_at(total_passengers, row),
                    avg_passenger_count: value_at(avg_passengers, row),
                    total_trip_distance: value_at(total_distance, row),
                    avg_trip_distance: value_at(avg_distance, row),
                    total_fare_amount: value_at(total_fare, row),
                    avg_fare_amount: value_at(avg_fare, row),
                    avg_tip_amount: value_at(avg_tip, row),
                    avg_tip_fraction: value_at(avg_fraction, row),
                    generous_customer_count: value_at(generous, row),
                    lucky: lucky.is_valid(row) && lucky.value(row),
                });
            }
        }
        Ok(rows)
    }
}

pub(crate) fn primitive<'a, T: ArrowPrimitiveType>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a PrimitiveArray<T>> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_primitive_opt::<T>())
        .ok_or_else(|| {
            JobError::Schema(format!("column {name} is missing or not {}", T::DATA_TYPE))
        })
}

pub(crate) fn value_at<T: ArrowPrimitiveType>(
    array: &PrimitiveArray<T>,
    row: usize,
) -> Option<T::Native> {
    array.is_valid(row).then(|| array.value(row))
}
