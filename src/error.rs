use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed quote record at row {row}: {source}")]
    Csv {
        row: u64,
        #[source]
        source: csv::Error,
    },

    #[error("unparseable creation date {value:?} at row {row}")]
    InvalidDate { row: u64, value: String },

    #[error("dataset contains no quote records")]
    EmptyDataset,

    #[error("unknown {field} {value:?}: not present in the dataset")]
    UnknownSelection { field: &'static str, value: String },

    #[error("date {date} is outside the dataset period {min} to {max}")]
    DateOutOfBounds {
        date: chrono::NaiveDate,
        min: chrono::NaiveDate,
        max: chrono::NaiveDate,
    },

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

pub type Result<T> = std::result::Result<T, DashboardError>;
