use std::path::PathBuf;
use thiserror::Error;

/// Low-level reason a dataset file could not be turned into a `Dataset`.
#[derive(Error, Debug)]
pub enum ReadFailure {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("workbook contains no sheets")]
    NoSheets,

    #[error("row {row} has {found} fields but the header has {expected}")]
    RowTooLong {
        row: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("dataset file not found: {}", path.display())]
    DatasetNotFound { path: PathBuf },

    #[error("failed to read dataset {}: {source}", path.display())]
    DatasetRead {
        path: PathBuf,
        #[source]
        source: ReadFailure,
    },

    #[error("missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("{endpoint} unreachable after {attempts} attempt(s)")]
    TransientNetwork { endpoint: String, attempts: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Stable classification of a `ReportError`, independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DatasetNotFound,
    DatasetRead,
    Schema,
    TransientNetwork,
    Config,
}

impl ReportError {
    pub fn read(path: impl Into<PathBuf>, source: impl Into<ReadFailure>) -> Self {
        ReportError::DatasetRead {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn missing_columns<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReportError::Schema {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::DatasetNotFound { .. } => ErrorKind::DatasetNotFound,
            ReportError::DatasetRead { .. } => ErrorKind::DatasetRead,
            ReportError::Schema { .. } => ErrorKind::Schema,
            ReportError::TransientNetwork { .. } => ErrorKind::TransientNetwork,
            ReportError::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP-equivalent status for callers that surface errors over a transport.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::DatasetNotFound => 404,
            ErrorKind::Schema => 422,
            ErrorKind::TransientNetwork => 503,
            ErrorKind::DatasetRead | ErrorKind::Config => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
