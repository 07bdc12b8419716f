use crate::config::BATCH_SIZE;
use crate::error::MatchError;
use crate::matcher::{MatchOutcome, Matcher};
use crate::models::{MatchResult, SourceRecord};
use crate::stats::MatchStats;
use crate::store::SqliteStore;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

/// Destination for match results. Writing the same id twice must replace the earlier
/// result.
pub trait ResultSink {
    fn write_batch(&mut self, results: &[MatchResult]) -> Result<usize>;
}

impl ResultSink for SqliteStore {
    fn write_batch(&mut self, results: &[MatchResult]) -> Result<usize> {
        self.upsert_matches(results)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub batch_size: usize,
    /// Stop after this many source records
    pub limit: Option<usize>,
    /// Match but do not write results
    pub dry_run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            limit: None,
            dry_run: false,
        }
    }
}

/// Matches every record and writes the results batch by batch.
///
/// Records are pulled in batches of `batch_size`; each batch is matched in parallel
/// and written before the next one is read. Malformed records are logged and skipped;
/// any other source error ends the run.
pub fn run_pipeline<I, S>(
    records: I,
    matcher: &Matcher,
    sink: &mut S,
    options: &PipelineOptions,
) -> Result<MatchStats>
where
    I: IntoIterator<Item = Result<SourceRecord, MatchError>>,
    S: ResultSink + ?Sized,
{
    let stats = MatchStats::new();
    let batch_size = options.batch_size.max(1);
    let limit = options.limit.unwrap_or(usize::MAX);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {pos} records {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let mut records = records.into_iter().take(limit).peekable();
    let mut batch = Vec::with_capacity(batch_size);

    while records.peek().is_some() {
        batch.clear();
        for item in records.by_ref().take(batch_size) {
            match item {
                Ok(record) => batch.push(record),
                Err(e @ MatchError::MalformedRecord { .. }) => skip_record(&stats, &e),
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(e.into());
                }
            }
        }

        let outcomes: Vec<Result<MatchOutcome, MatchError>> =
            batch.par_iter().map(|r| matcher.match_record(r)).collect();

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(outcome) => {
                    record_outcome(&stats, &outcome);
                    results.push(outcome.result);
                }
                Err(e) => skip_record(&stats, &e),
            }
        }

        if !options.dry_run && !results.is_empty() {
            let written = sink.write_batch(&results)?;
            stats.add_written(written as u64);
        }

        pb.set_position(stats.processed() + stats.skipped());
        pb.set_message(format!("({} matched)", stats.matched()));
    }

    pb.finish_and_clear();

    info!(
        processed = stats.processed(),
        matched = stats.matched(),
        skipped = stats.skipped(),
        written = stats.written(),
        "Matching complete"
    );

    Ok(stats)
}

fn record_outcome(stats: &MatchStats, outcome: &MatchOutcome) {
    stats.inc_processed();
    if outcome.truncated {
        stats.inc_truncated();
    }
    if outcome.result.is_match() {
        stats.inc_matched();
        stats.add_pairs(outcome.pairs as u64);
    }
}

fn skip_record(stats: &MatchStats, error: &MatchError) {
    stats.inc_skipped();
    match error {
        MatchError::MalformedRecord { record, reason } => {
            warn!(record_id = %record, reason = %reason, "Skipping malformed record");
        }
        other => warn!(error = %other, "Skipping record"),
    }
}
