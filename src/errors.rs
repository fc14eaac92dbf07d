use thiserror;

use std::time::Duration;

use crate::fastq::{Format, Origin};

pub type Result<T> = std::result::Result<T, Error>;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error reading or writing \"{file}\": {source}")]
    FileIo { file: String, source: BoxError },

    #[error("Error reading or writing bytes: {0}")]
    BytesIo(BoxError),

    #[error("Error parsing record {idx} in {origin}: {source}")]
    ParseRecord {
        origin: Origin,
        idx: usize,
        source: BoxError,
    },

    #[error("Unsupported file extension for {format} input: \"{file}\"")]
    UnsupportedFormat { file: String, format: Format },

    #[error("Error compiling pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Read \"{0}\" has no quality scores")]
    MissingQualityScores(String),

    #[error("Error in manifest \"{file}\": {reason}")]
    ManifestParse { file: String, reason: String },

    #[error("Alignment tool failed: {0}")]
    AlignmentToolFailure(String),

    #[error("Alignment tool did not finish within {0:?}")]
    AlignmentTimeout(Duration),

    #[error("Error writing CSV to \"{file}\": {source}")]
    Csv { file: String, source: csv::Error },
}

impl Error {
    pub(crate) fn file_io(file: impl AsRef<std::path::Path>, source: impl Into<BoxError>) -> Self {
        Error::FileIo {
            file: file.as_ref().display().to_string(),
            source: source.into(),
        }
    }
}

pub fn utf8(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}
