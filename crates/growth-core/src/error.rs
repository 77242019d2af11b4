use thiserror::Error;

/// Hard failures raised by the loader: the upload produced no usable data.
///
/// Everything below row granularity (a bad date, a missing optional field)
/// is recovered by skip-and-count inside the loader and never becomes an
/// error.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// The uploaded byte stream was empty.
    #[error("Empty upload: no bytes to parse")]
    EmptyFile,

    /// The declared or sniffed format is not one we can read.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// No header matched any alias for the required user-id column.
    #[error("No user-id column found in header: {header}")]
    MissingUserColumn {
        /// The raw header row, joined for diagnostics.
        header: String,
    },

    /// Every row was dropped during normalization.
    #[error("No usable rows after parsing ({skipped} rows skipped)")]
    NoUsableRows {
        /// Count of rows that failed normalization.
        skipped: usize,
    },

    /// The delimited-text reader failed at the file level.
    #[error("Failed to parse delimited data: {0}")]
    Delimited(String),

    /// The spreadsheet reader failed at the file level.
    #[error("Failed to parse spreadsheet data: {0}")]
    Spreadsheet(String),
}

/// The metric engine could not form a single period from the dataset.
///
/// Anything short of this degrades gracefully: partial metrics are returned
/// with `trend = None` rather than failing.
#[derive(Error, Debug)]
#[error("Insufficient data: {reason}")]
pub struct InsufficientDataError {
    /// Why no periods could be formed.
    pub reason: String,
}

/// All hard failures that can cross the pipeline boundary.
#[derive(Error, Debug)]
pub enum GrowthError {
    /// The upload produced no usable data (4xx-equivalent for callers).
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// The dataset could not form any periods.
    #[error(transparent)]
    InsufficientData(#[from] InsufficientDataError),

    /// Pass-through for raw I/O errors (reading the input file).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the GrowthLens crates.
pub type Result<T> = std::result::Result<T, GrowthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_error_display() {
        let err = IngestionError::NoUsableRows { skipped: 12 };
        assert_eq!(
            err.to_string(),
            "No usable rows after parsing (12 rows skipped)"
        );
    }

    #[test]
    fn test_missing_user_column_display() {
        let err = IngestionError::MissingUserColumn {
            header: "a,b,c".to_string(),
        };
        assert!(err.to_string().contains("a,b,c"));
    }

    #[test]
    fn test_growth_error_from_ingestion() {
        let err: GrowthError = IngestionError::EmptyFile.into();
        assert!(matches!(err, GrowthError::Ingestion(_)));
    }

    #[test]
    fn test_growth_error_from_insufficient_data() {
        let err: GrowthError = InsufficientDataError {
            reason: "all dates invalid".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Insufficient data: all dates invalid"
        );
    }
}
