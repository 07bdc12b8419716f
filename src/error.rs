use thiserror::Error;

/// Failures the matching engine distinguishes. Configuration, index and source read
/// errors abort a run; malformed records are skipped.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid configuration for {field}: {reason}")]
    Configuration { field: &'static str, reason: String },

    #[error("malformed record {record}: {reason}")]
    MalformedRecord { record: String, reason: String },

    #[error("cannot build reference index: {0}")]
    IndexBuild(String),

    #[error("cannot read source records: {0}")]
    SourceRead(String),
}

impl MatchError {
    pub fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            reason: reason.into(),
        }
    }

    pub fn malformed(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            record: record.into(),
            reason: reason.into(),
        }
    }
}
