#![allow(dead_code)]

use std::sync::Arc;

use datafusion::arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use nyc_taxi_fact::schema::FACT_KEY;
use nyc_taxi_fact::FactRow;

pub const SAMPLE_CSV: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/green_tripdata_2015_sample.csv"
);

/// One raw ride, shaped like a 2015 green taxi record.
#[derive(Debug, Clone)]
pub struct Trip {
    pub vendor: i64,
    pub pickup: &'static str,
    pub dropoff: &'static str,
    pub passengers: i64,
    pub distance: f64,
    pub fare: f64,
    pub tip: Option<f64>,
    pub payment: i64,
    pub trip_type: i64,
}

pub fn trip(vendor: i64, pickup: &'static str, payment: i64, fare: f64, tip: f64) -> Trip {
    Trip {
        vendor,
        pickup,
        dropoff: pickup,
        passengers: 1,
        distance: 1.0,
        fare,
        tip: Some(tip),
        payment,
        trip_type: 1,
    }
}

pub fn raw_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("VendorID", DataType::Int64, true),
        Field::new("lpep_pickup_datetime", DataType::Utf8, true),
        Field::new("Lpep_dropoff_datetime", DataType::Utf8, true),
        Field::new("Store_and_fwd_flag", DataType::Utf8, true),
        Field::new("Passenger_count", DataType::Int64, true),
        Field::new("Trip_distance", DataType::Float64, true),
        Field::new("Fare_amount", DataType::Float64, true),
        Field::new("Tip_amount", DataType::Float64, true),
        Field::new("Ehail_fee", DataType::Float64, true),
        Field::new("Payment_type", DataType::Int64, true),
        Field::new("Trip_type ", DataType::Int64, true),
    ]))
}

pub fn raw_batch(trips: &[Trip]) -> RecordBatch {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(trips.iter().map(|t| t.vendor))),
        Arc::new(StringArray::from_iter_values(trips.iter().map(|t| t.pickup))),
        Arc::new(StringArray::from_iter_values(trips.iter().map(|t| t.dropoff))),
        Arc::new(StringArray::from_iter_values(trips.iter().map(|_| "N"))),
        Arc::new(Int64Array::from_iter_values(trips.iter().map(|t| t.passengers))),
        Arc::new(Float64Array::from_iter_values(trips.iter().map(|t| t.distance))),
        Arc::new(Float64Array::from_iter_values(trips.iter().map(|t| t.fare))),
        Arc::new(Float64Array::from_iter(trips.iter().map(|t| t.tip))),
        Arc::new(Float64Array::from(vec![None::<f64>; trips.len()])),
        Arc::new(Int64Array::from_iter_values(trips.iter().map(|t| t.payment))),
        Arc::new(Int64Array::from_iter_values(trips.iter().map(|t| t.trip_type))),
    ];
    RecordBatch::try_new(raw_schema(), columns).unwrap()
}

/// Raw trips as a table with one partition per inner vector.
pub fn raw_trips(ctx: &SessionContext, partitions: Vec<Vec<Trip>>) -> DataFrame {
    let batches = partitions.iter().map(|p| vec![raw_batch(p)]).collect();
    let table = MemTable::try_new(raw_schema(), batches).unwrap();
    ctx.read_table(Arc::new(table)).unwrap()
}

pub fn sorted_by_key(df: DataFrame) -> DataFrame {
    df.sort(FACT_KEY.iter().map(|name| col(*name).sort(true, true)).collect())
        .unwrap()
}

pub async fn fact_rows(df: DataFrame) -> Vec<FactRow> {
    let batches = sorted_by_key(df).collect().await.unwrap();
    FactRow::from_batches(&batches).unwrap()
}

pub fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("value should not be null");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
