/// Failures that escape the text-to-record pipeline.
///
/// Both variants carry the raw input that triggered them so a caller can log or report the
/// offending patient without re-deriving it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid date {token:?}: {reason}")]
    InvalidDate { token: String, reason: String },
    #[error("validation failed for {input:?}: {reason}")]
    Validation { input: String, reason: String },
}

impl PipelineError {
    pub(crate) fn invalid_date(token: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDate {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(input: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Failures of the migration around the pipeline: configuration, source, sink and detail lookups.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to read export file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write patient file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to create output directory: {0}")]
    OutputDirCreation(std::io::Error),
    #[error("export schema mismatch: {0}")]
    ExportSchema(String),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("visit detail lookup failed: {0}")]
    DetailLookup(String),
    #[error("visit detail lookup timed out")]
    DetailTimeout,
}

pub type MigrationResult<T> = std::result::Result<T, MigrationError>;
