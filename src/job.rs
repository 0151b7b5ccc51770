//! The transform job: ingest, clean, report, aggregate, persist.
//!
//! A single linear run. Any failure aborts it; nothing is retried and no
//! intermediate state is kept.

use datafusion::prelude::*;
use tracing::{info, info_span, Instrument};

use crate::config::JobConfig;
use crate::error::{JobError, Result};
use crate::{clean, fact, pivot, report, sink, source, storage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub output: String,
    /// Fact rows written to `output`.
    pub fact_rows: u64,
}

pub fn session_context(config: &JobConfig) -> SessionContext {
    let mut session_config = SessionConfig::new();
    if let Some(partitions) = config.target_partitions {
        session_config = session_config.with_target_partitions(partitions);
    }
    SessionContext::new_with_config(session_config)
}

/// Validates `config` and runs the job on a fresh session.
pub async fn run(config: &JobConfig) -> Result<JobSummary> {
    config.validate()?;
    let ctx = session_context(config);
    run_with_context(&ctx, config).await
}

/// Runs the job on an existing session, for callers that register their own
/// object stores or tables.
pub async fn run_with_context(ctx: &SessionContext, config: &JobConfig) -> Result<JobSummary> {
    storage::register_object_stores(ctx, &[config.input.as_str(), config.output.as_str()])?;

    let format = config.input_format.resolve(&config.input);
    storage::validate_local_input(&config.input, format)?;

    let raw = source::read_trips(ctx, &config.input, format)
        .instrument(info_span!("ingest"))
        .await?;

    let fact_rows = transform_and_write(ctx, raw, config)
        .await
        .map_err(|e| e.attribute_to_input(&config.input))?;
    info!(fact_rows, output = %config.output, "fact table written");

    Ok(JobSummary {
        output: config.output.clone(),
        fact_rows,
    })
}

async fn transform_and_write(
    ctx: &SessionContext,
    raw: DataFrame,
    config: &JobConfig,
) -> Result<u64> {
    let mut cleaned = info_span!("clean").in_scope(|| clean::clean(raw))?;

    if config.report {
        // Held in memory: the report scans the cleaned trips three more times
        cleaned = cleaned
            .cache()
            .instrument(info_span!("cache"))
            .await
            .map_err(JobError::transform("cache"))?;

        let tipped = fact::with_tip_fraction(cleaned.clone())?;
        let summary = pivot::tip_fraction_by_weekday(&tipped).await?;
        report::print_df(
            "Average tip fraction by pickup day of week (1 = Sunday) and payment type",
            summary,
        )
        .await?;
    }

    let facts = fact::build_fact_table(cleaned, config.generosity_threshold).await?;

    if config.report {
        let preview = facts
            .clone()
            .limit(0, Some(report::PREVIEW_ROWS))
            .map_err(JobError::transform("report"))?;
        report::print_df("Weekly fact table (preview)", preview).await?;
    }

    sink::write_fact_table(ctx, facts, &config.output).await
}
