//! Error types for the fact table job.
//!
//! Every variant names the pipeline stage that failed. Nothing is retried:
//! the first error aborts the run.
//!
//! Plans execute lazily, so a record that cannot be parsed or coerced fails
//! whichever later stage first runs the plan. [`JobError::attribute_to_input`]
//! turns those failures back into [`JobError::Ingest`].

use std::error::Error;

use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Schema mismatch: {0}")]
    Schema(String),

    #[error("Failed to read trips from {location}: {source}")]
    Ingest {
        location: String,
        #[source]
        source: DataFusionError,
    },

    #[error("Transformation failed during {stage}: {source}")]
    Transform {
        stage: &'static str,
        #[source]
        source: DataFusionError,
    },

    #[error("Failed to write fact table to {location}: {source}")]
    Write {
        location: String,
        #[source]
        source: DataFusionError,
    },

    #[error("Object storage error at {location}: {source}")]
    Storage {
        location: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Invalid location '{location}': {message}")]
    Location { location: String, message: String },
}

impl JobError {
    pub(crate) fn transform(stage: &'static str) -> impl FnOnce(DataFusionError) -> Self {
        move |source| Self::Transform { stage, source }
    }

    /// Reports a transform or write failure caused by a malformed input
    /// record as an ingest failure of `location`.
    pub fn attribute_to_input(self, location: &str) -> Self {
        match self {
            Self::Transform { source, .. } | Self::Write { source, .. }
                if is_malformed_record(&source) =>
            {
                Self::Ingest {
                    location: location.to_string(),
                    source,
                }
            }
            other => other,
        }
    }
}

fn is_malformed_record(error: &DataFusionError) -> bool {
    std::iter::successors(Some(error as &dyn Error), |&e| e.source()).any(|e| {
        matches!(
            e.downcast_ref::<ArrowError>(),
            Some(ArrowError::ParseError(_) | ArrowError::CsvError(_) | ArrowError::CastError(_))
        )
    })
}

pub type Result<T> = std::result::Result<T, JobError>;
