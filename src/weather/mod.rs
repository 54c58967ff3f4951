//! Weather-file discovery: header summarizers, nearest-station lookup and
//! the per-dataset catalog the services draw from.

pub mod catalog;
pub mod haversine;
pub mod resolver;
pub mod summarizer;

use std::io;
use std::path::PathBuf;

use serde::Deserialize;

pub use catalog::WeatherCatalog;
pub use haversine::haversine;
pub use resolver::{ResolvedStation, WeatherResolver};
pub use summarizer::{Tm2Summarizer, Tmy3CsvSummarizer, WeatherRecord, WeatherSummarizer};

/// On-disk layout of a weather dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherFormat {
    /// Fixed-width TMY2 files.
    Tm2,
    /// TMY3 CSV files.
    Tmy3,
}

impl WeatherFormat {
    pub fn summarizer(self) -> Box<dyn WeatherSummarizer> {
        match self {
            Self::Tm2 => Box::new(Tm2Summarizer),
            Self::Tmy3 => Box::new(Tmy3CsvSummarizer),
        }
    }
}

/// Errors raised while reading weather files.
#[derive(thiserror::Error, Debug)]
pub enum WeatherError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot read weather directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("header too short: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("malformed header: {0}")]
    Malformed(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid number in header: {0:?}")]
    InvalidNumber(String),
    /// The engine cannot open paths containing spaces.
    #[error("weather path contains a space: {}", .0.display())]
    PathContainsSpace(PathBuf),
    #[error("unknown weather dataset \"{0}\"")]
    UnknownDataset(String),
}
