//! Header readers that reduce a weather file to its station location.

use std::io::Read;

use serde::Serialize;

use super::WeatherError;

/// Station location read from one weather file's header.
///
/// `filename` is derived from the header contents, not taken from the
/// file system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub filename: String,
    pub lat: f32,
    pub lon: f32,
}

/// Reads just enough of a weather file to locate its station.
pub trait WeatherSummarizer: Send + Sync {
    fn summarize(&self, reader: &mut dyn Read) -> Result<WeatherRecord, WeatherError>;
}

/// Number of header bytes a TMY2 file must carry.
pub const TM2_HEADER_LEN: usize = 59;

/// Fixed-width TMY2 (`.tm2`) header reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tm2Summarizer;

impl WeatherSummarizer for Tm2Summarizer {
    fn summarize(&self, reader: &mut dyn Read) -> Result<WeatherRecord, WeatherError> {
        let mut header = Vec::with_capacity(TM2_HEADER_LEN);
        reader
            .take(TM2_HEADER_LEN as u64)
            .read_to_end(&mut header)?;
        if header.len() < TM2_HEADER_LEN {
            return Err(WeatherError::Truncated {
                expected: TM2_HEADER_LEN,
                found: header.len(),
            });
        }

        let field = |start: usize, end: usize| -> Result<&str, WeatherError> {
            std::str::from_utf8(&header[start..end])
                .map(str::trim)
                .map_err(|_| WeatherError::Malformed(format!("non-text header bytes at {start}..{end}")))
        };
        let int = |start: usize, end: usize| -> Result<u32, WeatherError> {
            let text = field(start, end)?;
            text.parse().map_err(|_| WeatherError::InvalidNumber(text.to_string()))
        };

        let id = field(1, 6)?;
        if id.is_empty() {
            return Err(WeatherError::Malformed("empty station id".into()));
        }

        Ok(WeatherRecord {
            filename: format!("{id}.tm2"),
            lat: coordinate(field(37, 38)?, int(39, 41)?, int(42, 44)?),
            lon: coordinate(field(45, 46)?, int(47, 50)?, int(51, 53)?),
        })
    }
}

fn coordinate(direction: &str, degrees: u32, minutes: u32) -> f32 {
    let value = degrees as f32 + minutes as f32 / 60.0;
    match direction {
        "W" | "S" => -value,
        _ => value,
    }
}

/// TMY3 CSV reader; only the first record is consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tmy3CsvSummarizer;

impl WeatherSummarizer for Tmy3CsvSummarizer {
    fn summarize(&self, reader: &mut dyn Read) -> Result<WeatherRecord, WeatherError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let header = csv
            .records()
            .next()
            .ok_or_else(|| WeatherError::Malformed("empty file".into()))??;

        let column = |index: usize| -> Result<&str, WeatherError> {
            header
                .get(index)
                .map(str::trim)
                .ok_or_else(|| WeatherError::Malformed(format!("header has no column {index}")))
        };
        let decimal = |index: usize| -> Result<f32, WeatherError> {
            let text = column(index)?;
            text.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| WeatherError::InvalidNumber(text.to_string()))
        };

        Ok(WeatherRecord {
            filename: format!("{}TYA.csv", column(0)?),
            lat: decimal(4)?,
            lon: decimal(5)?,
        })
    }
}
