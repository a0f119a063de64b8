use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    #[error("Record transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Pipeline is already in terminal state {state}")]
    Terminated { state: String },

    #[error("Ingestion run was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Malformed record at line {line}: expected {expected} fields, found {found}")]
    MalformedRecord {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Header mismatch: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Quoted field opened at line {line} is never closed")]
    UnterminatedQuote { line: u64 },

    #[error("Source has no header line")]
    MissingHeader,

    #[error("Failed to read {path}: {error}")]
    Io {
        path: String,
        #[source]
        error: std::io::Error,
    },

    #[error("CSV decoding failed: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Cannot parse field {field} at line {line} from {value:?}: {reason}")]
    FieldParse {
        line: u64,
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing field {field} at line {line}")]
    MissingField { line: u64, field: String },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Batch write failed at position {position}: {reason}")]
    BatchWrite { position: usize, reason: String },

    #[error("Transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Database connection failed: {reason}")]
    Connection { reason: String },

    #[error("Schema setup failed: {reason}")]
    Schema { reason: String },

    #[error("Query failed: {reason}")]
    Query { reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Failed to load configuration from {origin}: {error}")]
    LoadFailed {
        origin: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Coarse classification of why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedRecord,
    FieldParse,
    BatchWrite,
    Storage,
    Config,
    Cancelled,
    Other,
}

pub type Result<T> = std::result::Result<T, IngestionError>;

impl IngestionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestionError::Source(SourceError::MalformedRecord { .. })
            | IngestionError::Source(SourceError::UnterminatedQuote { .. })
            | IngestionError::Source(SourceError::HeaderMismatch { .. })
            | IngestionError::Source(SourceError::MissingHeader)
            | IngestionError::Source(SourceError::Csv(_)) => FailureKind::MalformedRecord,
            IngestionError::Transform(_) => FailureKind::FieldParse,
            IngestionError::Sink(SinkError::BatchWrite { .. }) => FailureKind::BatchWrite,
            IngestionError::Sink(_) => FailureKind::Storage,
            IngestionError::Config(_) => FailureKind::Config,
            IngestionError::Cancelled => FailureKind::Cancelled,
            IngestionError::Source(SourceError::Io { .. }) | IngestionError::Terminated { .. } => {
                FailureKind::Other
            }
        }
    }

    /// Only a restart of the whole run is ever attempted, and only by whoever
    /// launched it. Shape errors and parse errors will fail again on the same input.
    pub fn is_rerunnable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::BatchWrite | FailureKind::Storage | FailureKind::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds_are_distinguishable() {
        let malformed: IngestionError = SourceError::MalformedRecord {
            line: 3,
            expected: 3,
            found: 2,
        }
        .into();
        assert_eq!(malformed.kind(), FailureKind::MalformedRecord);
        assert!(!malformed.is_rerunnable());

        let parse: IngestionError = TransformError::FieldParse {
            line: 2,
            field: "movieId".to_string(),
            value: "abc".to_string(),
            reason: "invalid digit found in string".to_string(),
        }
        .into();
        assert_eq!(parse.kind(), FailureKind::FieldParse);

        let write: IngestionError = SinkError::BatchWrite {
            position: 7,
            reason: "UNIQUE constraint failed".to_string(),
        }
        .into();
        assert_eq!(write.kind(), FailureKind::BatchWrite);
        assert!(write.is_rerunnable());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = SinkError::BatchWrite {
            position: 42,
            reason: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Batch write failed at position 42: disk full"
        );

        let err = SourceError::MalformedRecord {
            line: 5,
            expected: 4,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "Malformed record at line 5: expected 4 fields, found 3"
        );
    }
}
