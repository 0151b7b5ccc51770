//! Column names used across the pipeline and resolution of raw trip headers.
//!
//! Raw TLC files are not consistent about header case or whitespace: the 2015
//! green taxi files ship `lpep_pickup_datetime` next to `Lpep_dropoff_datetime`
//! and a `Trip_type ` header with a trailing space. Headers are matched on
//! their trimmed, lowercased form.

use datafusion::arrow::datatypes::{DataType, TimeUnit};

use crate::error::{JobError, Result};

pub const VENDOR_ID: &str = "vendor_id";
pub const PICKUP_DATETIME: &str = "pickup_datetime";
pub const DROPOFF_DATETIME: &str = "dropoff_datetime";
pub const PASSENGER_COUNT: &str = "passenger_count";
pub const TRIP_DISTANCE: &str = "trip_distance";
pub const FARE_AMOUNT: &str = "fare_amount";
pub const TIP_AMOUNT: &str = "tip_amount";
pub const PAYMENT_TYPE: &str = "payment_type";
pub const TRIP_TYPE: &str = "trip_type";

pub const PICKUP_DATE: &str = "pickup_date";
pub const DROPOFF_DATE: &str = "dropoff_date";
pub const PICKUP_TIME: &str = "pickup_time";
pub const DROPOFF_TIME: &str = "dropoff_time";
pub const PICKUP_WEEK: &str = "pickup_week";
pub const DROPOFF_WEEK: &str = "dropoff_week";
pub const PICKUP_DAY_OF_WEEK: &str = "pickup_day_of_week";
pub const DROPOFF_DAY_OF_WEEK: &str = "dropoff_day_of_week";

pub const TIP_FRACTION: &str = "tip_fraction";
pub const GENEROUS_CUSTOMER: &str = "generous_customer";

pub const TRIP_COUNT: &str = "trip_count";
pub const TOTAL_PASSENGER_COUNT: &str = "total_passenger_count";
pub const AVG_PASSENGER_COUNT: &str = "avg_passenger_count";
pub const TOTAL_TRIP_DISTANCE: &str = "total_trip_distance";
pub const AVG_TRIP_DISTANCE: &str = "avg_trip_distance";
pub const TOTAL_FARE_AMOUNT: &str = "total_fare_amount";
pub const AVG_FARE_AMOUNT: &str = "avg_fare_amount";
pub const AVG_TIP_AMOUNT: &str = "avg_tip_amount";
pub const AVG_TIP_FRACTION: &str = "avg_tip_fraction";
pub const GENEROUS_CUSTOMER_COUNT: &str = "generous_customer_count";
pub const LUCKY: &str = "lucky";

/// Grouping key of a fact row, in output sort order.
pub const FACT_KEY: [&str; 4] = [PICKUP_WEEK, VENDOR_ID, TRIP_TYPE, PAYMENT_TYPE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Decimal,
    Timestamp,
}

impl ColumnKind {
    pub fn data_type(self) -> DataType {
        match self {
            ColumnKind::Integer => DataType::Int64,
            ColumnKind::Decimal => DataType::Float64,
            ColumnKind::Timestamp => DataType::Timestamp(TimeUnit::Nanosecond, None),
        }
    }
}

/// A column kept from the raw records.
#[derive(Debug)]
pub struct SourceColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Lowercase header spellings accepted for this column.
    pub aliases: &'static [&'static str],
}

pub static SOURCE_COLUMNS: [SourceColumn; 9] = [
    SourceColumn {
        name: VENDOR_ID,
        kind: ColumnKind::Integer,
        aliases: &["vendorid", "vendor_id"],
    },
    SourceColumn {
        name: PICKUP_DATETIME,
        kind: ColumnKind::Timestamp,
        aliases: &["lpep_pickup_datetime", "tpep_pickup_datetime", "pickup_datetime"],
    },
    SourceColumn {
        name: DROPOFF_DATETIME,
        kind: ColumnKind::Timestamp,
        aliases: &["lpep_dropoff_datetime", "tpep_dropoff_datetime", "dropoff_datetime"],
    },
    SourceColumn {
        name: PASSENGER_COUNT,
        kind: ColumnKind::Integer,
        aliases: &["passenger_count"],
    },
    SourceColumn {
        name: TRIP_DISTANCE,
        kind: ColumnKind::Decimal,
        aliases: &["trip_distance"],
    },
    SourceColumn {
        name: FARE_AMOUNT,
        kind: ColumnKind::Decimal,
        aliases: &["fare_amount"],
    },
    SourceColumn {
        name: TIP_AMOUNT,
        kind: ColumnKind::Decimal,
        aliases: &["tip_amount"],
    },
    SourceColumn {
        name: PAYMENT_TYPE,
        kind: ColumnKind::Integer,
        aliases: &["payment_type"],
    },
    SourceColumn {
        name: TRIP_TYPE,
        kind: ColumnKind::Integer,
        aliases: &["trip_type"],
    },
];

fn normalize(header: &str) -> String {
    header.trim().to_ascii_lowercase()
}

/// Maps every [`SOURCE_COLUMNS`] entry to the raw header that carries it.
///
/// Fails with [`JobError::Schema`] listing every column that has no match.
pub fn resolve_source_columns<'a>(
    headers: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<(&'static SourceColumn, String)>> {
    let headers: Vec<&str> = headers.into_iter().collect();

    let mut resolved = Vec::with_capacity(SOURCE_COLUMNS.len());
    let mut missing = Vec::new();
    for column in SOURCE_COLUMNS.iter() {
        let found = column.aliases.iter().find_map(|alias| {
            headers
                .iter()
                .find(|header| normalize(header) == *alias)
                .map(|header| header.to_string())
        });
        match found {
            Some(header) => resolved.push((column, header)),
            None => missing.push(column.name),
        }
    }

    if !missing.is_empty() {
        return Err(JobError::Schema(format!(
            "missing required column(s) {} in input with columns [{}]",
            missing.join(", "),
            headers.join(", ")
        )));
    }
    Ok(resolved)
}

/// TLC payment type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentType {
    CreditCard,
    Cash,
    NoCharge,
    Dispute,
    Unknown,
    VoidedTrip,
}

impl PaymentType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::CreditCard),
            2 => Some(Self::Cash),
            3 => Some(Self::NoCharge),
            4 => Some(Self::Dispute),
            5 => Some(Self::Unknown),
            6 => Some(Self::VoidedTrip),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Cash => "cash",
            Self::NoCharge => "no_charge",
            Self::Dispute => "dispute",
            Self::Unknown => "unknown",
            Self::VoidedTrip => "voided_trip",
        }
    }
}

/// Column label for a payment type in the pivot summary.
pub fn payment_type_label(code: Option<i64>) -> String {
    match code {
        Some(code) => match PaymentType::from_code(code) {
            Some(payment) => payment.label().to_string(),
            None => format!("payment_type_{code}"),
        },
        None => "missing".to_string(),
    }
}
