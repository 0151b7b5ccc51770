//! Weekly fact table over NYC taxi trip records, built with DataFusion.
//!
//! The job reads raw trips (CSV or Parquet, local or S3), drops the columns it
//! does not need, removes duplicate records, derives calendar columns and tip
//! fractions, and writes one row per `{pickup_week, vendor_id, trip_type,
//! payment_type}` back out as Parquet, replacing the previous output.

pub mod clean;
pub mod config;
pub mod error;
pub mod fact;
pub mod job;
pub mod logging;
pub mod pivot;
pub mod report;
pub mod schema;
pub mod sink;
pub mod source;
pub mod storage;

pub use config::{InputFormat, JobConfig};
pub use error::{JobError, Result};
pub use fact::FactRow;
pub use job::{run, run_with_context, JobSummary};
