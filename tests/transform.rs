mod common;

use std::collections::HashSet;

use common::*;
use datafusion::arrow::array::{Array, AsArray};
use datafusion::arrow::datatypes::Float64Type;
use datafusion::arrow::util::display::array_value_to_string;
use datafusion::arrow::util::pretty::pretty_format_batches;
use datafusion::prelude::*;
use nyc_taxi_fact::schema::*;
use nyc_taxi_fact::{clean, fact, pivot, FactRow, JobError};

const MONDAY_WEEK_2: &str = "2015-01-05 08:30:00";
const TUESDAY_WEEK_2: &str = "2015-01-06 09:00:00";
const WEDNESDAY_WEEK_2: &str = "2015-01-07 18:00:00";
const TUESDAY_WEEK_3: &str = "2015-01-13 07:00:00";

async fn facts_for(
    ctx: &SessionContext,
    partitions: Vec<Vec<Trip>>,
    threshold: f64,
) -> Vec<FactRow> {
    let raw = raw_trips(ctx, partitions);
    let cleaned = clean::clean(raw).unwrap();
    let facts = fact::build_fact_table(cleaned, threshold).await.unwrap();
    fact_rows(facts).await
}

#[tokio::test]
async fn prune_keeps_only_canonical_columns() {
    let ctx = SessionContext::new();
    let raw = raw_trips(&ctx, vec![vec![trip(2, MONDAY_WEEK_2, 1, 10.0, 1.0)]]);

    let pruned = clean::prune(raw).unwrap();
    let names: Vec<&str> = pruned
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();

    let expected: Vec<&str> = SOURCE_COLUMNS.iter().map(|c| c.name).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn prune_fails_when_a_required_column_is_missing() {
    let ctx = SessionContext::new();
    let raw = raw_trips(&ctx, vec![vec![trip(2, MONDAY_WEEK_2, 1, 10.0, 1.0)]])
        .drop_columns(&["Tip_amount"])
        .unwrap();

    let err = clean::prune(raw).unwrap_err();
    assert!(matches!(err, JobError::Schema(ref msg) if msg.contains(TIP_AMOUNT)));
}

#[tokio::test]
async fn malformed_timestamp_fails_when_executed() {
    let ctx = SessionContext::new();
    let raw = raw_trips(&ctx, vec![vec![trip(2, "not a timestamp", 1, 10.0, 1.0)]]);

    let cleaned = clean::clean(raw).unwrap();
    assert!(cleaned.collect().await.is_err());
}

#[tokio::test]
async fn identical_raw_records_collapse_to_one() {
    let ctx = SessionContext::new();
    let ride = trip(2, MONDAY_WEEK_2, 1, 10.0, 1.0);
    let raw = raw_trips(&ctx, vec![vec![ride.clone(), ride, trip(2, MONDAY_WEEK_2, 1, 10.0, 2.0)]]);

    let cleaned = clean::clean(raw).unwrap();
    assert_eq!(cleaned.count().await.unwrap(), 2);
}

#[tokio::test]
async fn deduplication_is_idempotent() {
    let ctx = SessionContext::new();
    let ride = trip(1, TUESDAY_WEEK_2, 2, 12.0, 0.0);
    let raw = raw_trips(
        &ctx,
        vec![
            vec![ride.clone(), ride.clone(), trip(2, MONDAY_WEEK_2, 1, 10.0, 1.0)],
            vec![ride, trip(2, MONDAY_WEEK_2, 1, 10.0, 1.0)],
        ],
    );
    let pruned = clean::prune(raw).unwrap();
    let order = || vec![col(VENDOR_ID).sort(true, true), col(FARE_AMOUNT).sort(true, true)];

    let once = clean::deduplicate(pruned).unwrap();
    let twice = clean::deduplicate(once.clone()).unwrap();

    let once = once.sort(order()).unwrap().collect().await.unwrap();
    let twice = twice.sort(order()).unwrap().collect().await.unwrap();
    assert_eq!(
        pretty_format_batches(&once).unwrap().to_string(),
        pretty_format_batches(&twice).unwrap().to_string()
    );
    assert_eq!(once.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
}

#[tokio::test]
async fn calendar_columns_use_iso_weeks_and_sunday_first_days() {
    let ctx = SessionContext::new();
    let mut new_year = trip(1, "2016-01-01 23:15:07", 1, 10.0, 1.0);
    new_year.dropoff = "2016-01-02 00:05:00";
    let raw = raw_trips(&ctx, vec![vec![new_year, trip(2, MONDAY_WEEK_2, 1, 10.0, 1.0)]]);

    let cleaned = clean::clean(raw)
        .unwrap()
        .sort(vec![col(VENDOR_ID).sort(true, true)])
        .unwrap();
    let batches = cleaned.collect().await.unwrap();
    let batch = &batches[0];
    let value = |name: &str, row: usize| {
        array_value_to_string(batch.column_by_name(name).unwrap(), row).unwrap()
    };

    // 2016-01-01 is a Friday in ISO week 53 of 2015
    assert_eq!(value(PICKUP_DATE, 0), "2016-01-01");
    assert_eq!(value(PICKUP_TIME, 0), "23:15:07");
    assert_eq!(value(PICKUP_WEEK, 0), "53");
    assert_eq!(value(PICKUP_DAY_OF_WEEK, 0), "6");
    assert_eq!(value(DROPOFF_DATE, 0), "2016-01-02");
    assert_eq!(value(DROPOFF_DAY_OF_WEEK, 0), "7");
    assert_eq!(value(DROPOFF_WEEK, 0), "53");

    assert_eq!(value(PICKUP_WEEK, 1), "2");
    assert_eq!(value(PICKUP_DAY_OF_WEEK, 1), "2");
    assert_eq!(value(PICKUP_TIME, 1), "08:30:00");
}

#[tokio::test]
async fn zero_fare_rides_never_get_a_tip_fraction() {
    let ctx = SessionContext::new();
    let rides = vec![
        trip(2, MONDAY_WEEK_2, 1, 0.0, 5.0),
        trip(2, TUESDAY_WEEK_2, 1, 10.0, 1.0),
    ];

    let raw = raw_trips(&ctx, vec![rides.clone()]);
    let tipped = fact::with_tip_fraction(clean::clean(raw).unwrap()).unwrap();
    let batches = tipped.collect().await.unwrap();
    let fractions: Vec<f64> = batches
        .iter()
        .flat_map(|b| {
            b.column_by_name(TIP_FRACTION)
                .unwrap()
                .as_primitive::<Float64Type>()
                .iter()
                .flatten()
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(fractions, vec![0.1]);

    let rows = facts_for(&ctx, vec![rides], 0.25).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].trip_count, 1);
    assert_close(rows[0].avg_tip_fraction, 0.1);
    assert_close(rows[0].avg_tip_amount, 1.0);
}

#[tokio::test]
async fn three_rides_average_their_tip_fractions() {
    let ctx = SessionContext::new();
    let rides = vec![
        trip(2, MONDAY_WEEK_2, 1, 10.0, 1.0),
        trip(2, TUESDAY_WEEK_2, 1, 10.0, 3.0),
        trip(2, WEDNESDAY_WEEK_2, 1, 10.0, 5.0),
    ];

    let rows = facts_for(&ctx, vec![rides.clone()], 0.25).await;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.key(), (Some(2), Some(2), Some(1), Some(1)));
    assert_eq!(row.trip_count, 3);
    assert_close(row.avg_tip_fraction, 0.3);
    assert_eq!(row.total_passenger_count, Some(3));
    assert_close(row.total_fare_amount, 30.0);
    assert!(row.lucky);

    let strict = facts_for(&ctx, vec![rides], 0.5).await;
    assert!(!strict[0].lucky);
}

#[tokio::test]
async fn group_without_any_tip_is_never_lucky() {
    let ctx = SessionContext::new();
    let untipped = |pickup| Trip {
        tip: None,
        ..trip(1, pickup, 1, 10.0, 0.0)
    };
    let rides = vec![
        untipped(MONDAY_WEEK_2),
        untipped(TUESDAY_WEEK_2),
        trip(2, MONDAY_WEEK_2, 1, 10.0, 2.0),
    ];

    let rows = facts_for(&ctx, vec![rides], 0.0).await;
    assert_eq!(rows.len(), 2);

    let silent = &rows[0];
    assert_eq!(silent.key(), (Some(2), Some(1), Some(1), Some(1)));
    assert_eq!(silent.trip_count, 2);
    assert_eq!(silent.avg_tip_fraction, None);
    assert_eq!(silent.avg_tip_amount, None);
    assert!(!silent.lucky);

    assert_close(rows[1].avg_tip_fraction, 0.2);
    assert!(rows[1].lucky);
}

#[tokio::test]
async fn generous_customers_tip_above_the_overall_average() {
    let ctx = SessionContext::new();
    // Average tip over all fare-paying rides is 2.0
    let rows = facts_for(
        &ctx,
        vec![vec![
            trip(2, MONDAY_WEEK_2, 1, 8.0, 1.0),
            trip(2, TUESDAY_WEEK_2, 1, 8.0, 4.0),
            trip(1, TUESDAY_WEEK_2, 2, 8.0, 0.0),
            trip(1, TUESDAY_WEEK_3, 1, 8.0, 3.0),
            trip(1, TUESDAY_WEEK_3, 1, 0.0, 9.0),
        ]],
        0.25,
    )
    .await;

    let generous: Vec<_> = rows
        .iter()
        .map(|r| (r.key(), r.generous_customer_count))
        .collect();
    assert_eq!(
        generous,
        vec![
            ((Some(2), Some(1), Some(1), Some(2)), Some(0)),
            ((Some(2), Some(2), Some(1), Some(1)), Some(1)),
            ((Some(3), Some(1), Some(1), Some(1)), Some(1)),
        ]
    );
}

#[tokio::test]
async fn one_fact_row_per_grouping_key() {
    let ctx = SessionContext::new();
    let mut rides = Vec::new();
    for pickup in [MONDAY_WEEK_2, TUESDAY_WEEK_2, TUESDAY_WEEK_3] {
        for vendor in [1, 2] {
            for payment in [1, 2] {
                rides.push(trip(vendor, pickup, payment, 10.0, 1.0));
                rides.push(trip(vendor, pickup, payment, 12.0, 2.0));
            }
        }
    }

    let rows = facts_for(&ctx, vec![rides.clone()], 0.25).await;
    let keys: HashSet<_> = rows.iter().map(|r| r.key()).collect();
    assert_eq!(keys.len(), rows.len());
    // weeks 2 and 3, two vendors, one trip type, two payment types
    assert_eq!(rows.len(), 2 * 2 * 2);
    assert_eq!(
        rows.iter().map(|r| r.trip_count).sum::<i64>(),
        rides.len() as i64
    );
}

#[tokio::test]
async fn aggregation_does_not_depend_on_partitioning() {
    let mut rides = vec![
        trip(2, MONDAY_WEEK_2, 1, 8.0, 2.0),
        trip(2, TUESDAY_WEEK_2, 1, 16.0, 8.0),
        trip(2, WEDNESDAY_WEEK_2, 1, 8.0, 6.0),
        trip(1, TUESDAY_WEEK_2, 2, 4.0, 0.0),
        trip(1, TUESDAY_WEEK_3, 1, 32.0, 8.0),
        trip(1, TUESDAY_WEEK_3, 1, 8.0, 2.0),
    ];
    rides[1].distance = 2.25;
    rides[4].passengers = 3;

    let single = SessionContext::new_with_config(SessionConfig::new().with_target_partitions(1));
    let expected = facts_for(&single, vec![rides.clone()], 0.3).await;

    let mut reversed = rides.clone();
    reversed.reverse();
    let parallel = SessionContext::new_with_config(SessionConfig::new().with_target_partitions(4));
    let actual = facts_for(
        &parallel,
        vec![reversed[..2].to_vec(), reversed[2..3].to_vec(), vec![], reversed[3..].to_vec()],
        0.3,
    )
    .await;

    assert_eq!(actual, expected);
    assert_eq!(expected.len(), 3);
}

#[tokio::test]
async fn pivot_averages_tip_fraction_by_day_and_payment_type() {
    let ctx = SessionContext::new();
    let raw = raw_trips(
        &ctx,
        vec![vec![
            trip(2, MONDAY_WEEK_2, 1, 8.0, 2.0),
            trip(1, "2015-01-05 17:00:00", 1, 8.0, 6.0),
            trip(2, "2015-01-05 18:00:00", 2, 10.0, 0.0),
            trip(2, TUESDAY_WEEK_2, 1, 10.0, 5.0),
        ]],
    );
    let tipped = fact::with_tip_fraction(clean::clean(raw).unwrap()).unwrap();

    let summary = pivot::tip_fraction_by_weekday(&tipped).await.unwrap();
    let names: Vec<String> = summary
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(names, vec![PICKUP_DAY_OF_WEEK, "credit_card", "cash"]);

    let batches = summary.collect().await.unwrap();
    let batch = &batches[0];
    let cell = |name: &str, row: usize| {
        let values = batch.column_by_name(name).unwrap().as_primitive::<Float64Type>();
        values.is_valid(row).then(|| values.value(row))
    };

    // Monday (2) then Tuesday (3)
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(cell("credit_card", 0), Some(0.5));
    assert_eq!(cell("cash", 0), Some(0.0));
    assert_eq!(cell("credit_card", 1), Some(0.5));
    assert_eq!(cell("cash", 1), None);
}
