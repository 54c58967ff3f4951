//! Nearest-station lookup over a directory of weather files.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use super::haversine::haversine;
use super::summarizer::{WeatherRecord, WeatherSummarizer};
use super::WeatherError;

/// Statute miles to kilometres.
pub const MILES_TO_KM: f64 = 5280.0 * 12.0 * 2.54 / 100.0 / 1000.0;

/// The station picked for a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStation {
    /// Absolute path of the weather file.
    pub path: PathBuf,
    pub record: WeatherRecord,
    /// Great-circle distance from the query point (km).
    pub distance_km: f64,
}

/// Index of every station in one weather directory.
///
/// Built once by summarizing each file's header; lookups afterwards are
/// read-only, so a resolver can be shared freely between threads.
#[derive(Debug, Clone)]
pub struct WeatherResolver {
    directory: PathBuf,
    records: Vec<WeatherRecord>,
}

impl WeatherResolver {
    /// Summarizes every regular file in `directory`.
    ///
    /// Files are read in parallel. A file that cannot be read or parsed is
    /// logged and left out, as is any record whose filename contains a
    /// space. Records keep the sorted order of the file names.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError::Directory`] if the directory cannot be
    /// listed and [`WeatherError::PathContainsSpace`] if its absolute path
    /// contains a space.
    pub fn new(
        directory: impl AsRef<Path>,
        summarizer: &dyn WeatherSummarizer,
    ) -> Result<Self, WeatherError> {
        let directory = directory.as_ref();
        let directory = directory
            .canonicalize()
            .map_err(|source| WeatherError::Directory {
                path: directory.to_path_buf(),
                source,
            })?;
        if directory.to_string_lossy().contains(' ') {
            return Err(WeatherError::PathContainsSpace(directory));
        }

        let mut files = fs::read_dir(&directory)
            .map_err(|source| WeatherError::Directory {
                path: directory.clone(),
                source,
            })?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        files.sort();

        let records: Vec<WeatherRecord> = files
            .par_iter()
            .filter_map(|path| match summarize_file(path, summarizer) {
                Ok(record) if record.filename.contains(' ') => {
                    warn!(file = %path.display(), filename = %record.filename, "discarding weather record with a space in its filename");
                    None
                }
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "discarding unreadable weather file");
                    None
                }
            })
            .collect();

        info!(
            directory = %directory.display(),
            stations = records.len(),
            discarded = files.len() - records.len(),
            "weather directory indexed"
        );
        Ok(Self { directory, records })
    }

    /// Canonical directory the records were read from.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    /// Finds the station closest to `(lat, lon)`.
    ///
    /// Equidistant stations resolve to the one first in file order, and a
    /// station whose distance is NaN is never chosen. A
    /// `radius_miles` of 0 means unlimited; otherwise `None` is returned when
    /// the closest station lies farther away than the radius.
    pub fn nearest(&self, lat: f32, lon: f32, radius_miles: u32) -> Option<ResolvedStation> {
        let (lat, lon) = (f64::from(lat), f64::from(lon));
        let mut best: Option<(&WeatherRecord, f64)> = None;
        for record in &self.records {
            let distance = haversine(f64::from(record.lat), f64::from(record.lon), lat, lon);
            if distance.is_nan() {
                continue;
            }
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((record, distance));
            }
        }
        let (record, distance_km) = best?;

        if radius_miles != 0 && distance_km > f64::from(radius_miles) * MILES_TO_KM {
            return None;
        }
        Some(ResolvedStation {
            path: self.directory.join(&record.filename),
            record: record.clone(),
            distance_km,
        })
    }

    /// Path of the closest weather file, or `None` if any argument is
    /// missing or nothing lies within the radius.
    pub fn resolve(
        &self,
        lat: Option<f32>,
        lon: Option<f32>,
        radius_miles: Option<u32>,
    ) -> Option<PathBuf> {
        self.nearest(lat?, lon?, radius_miles?)
            .map(|station| station.path)
    }
}

fn summarize_file(
    path: &Path,
    summarizer: &dyn WeatherSummarizer,
) -> Result<WeatherRecord, WeatherError> {
    let mut reader = BufReader::new(File::open(path)?);
    summarizer.summarize(&mut reader)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::weather::summarizer::{Tm2Summarizer, Tmy3CsvSummarizer};

    fn tm2_header(
        id: &str,
        city: &str,
        ns: char,
        lat: (u32, u32),
        ew: char,
        lon: (u32, u32),
    ) -> String {
        format!(
            " {id:<5} {city:<22} {:<2} {:>3} {ns} {:>2} {:>2} {ew} {:>3} {:>2} {:>5}",
            "XX", -8, lat.0, lat.1, lon.0, lon.1, 10
        )
    }

    fn tmy2_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let stations = [
            ("23129", "LONG_BEACH", 'N', (33, 49), 'W', (118, 9)),
            ("11641", "SAN_JUAN", 'N', (18, 26), 'W', (66, 0)),
            ("26451", "ANCHORAGE", 'N', (61, 10), 'W', (150, 1)),
        ];
        for (id, city, ns, lat, ew, lon) in stations {
            let header = tm2_header(id, city, ns, lat, ew, lon);
            fs::write(dir.path().join(format!("{id}.tm2")), header).unwrap();
        }
        fs::write(dir.path().join("README"), "not a weather file").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        dir
    }

    #[test]
    fn indexes_parseable_files_only() {
        let dir = tmy2_dir();
        let resolver = WeatherResolver::new(dir.path(), &Tm2Summarizer).unwrap();

        let names: Vec<_> = resolver.records().iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["11641.tm2", "23129.tm2", "26451.tm2"]);
        assert!(resolver.directory().is_absolute());
    }

    #[test]
    fn returns_closest_within_radius() {
        let dir = tmy2_dir();
        let resolver = WeatherResolver::new(dir.path(), &Tm2Summarizer).unwrap();

        let path = resolver.resolve(Some(33.816), Some(-118.15), Some(25));
        assert_eq!(path, Some(resolver.directory().join("23129.tm2")));
    }

    #[test]
    fn respects_radius() {
        let dir = tmy2_dir();
        let resolver = WeatherResolver::new(dir.path(), &Tm2Summarizer).unwrap();
        assert_eq!(resolver.resolve(Some(0.0), Some(0.0), Some(100)), None);
    }

    #[test]
    fn zero_radius_is_unlimited() {
        let dir = tmy2_dir();
        let resolver = WeatherResolver::new(dir.path(), &Tm2Summarizer).unwrap();

        let path = resolver.resolve(Some(0.0), Some(0.0), Some(0));
        assert_eq!(path, Some(resolver.directory().join("11641.tm2")));
    }

    #[test]
    fn missing_argument_resolves_nothing() {
        let dir = tmy2_dir();
        let resolver = WeatherResolver::new(dir.path(), &Tm2Summarizer).unwrap();

        assert_eq!(resolver.resolve(None, Some(0.0), Some(0)), None);
        assert_eq!(resolver.resolve(Some(0.0), None, Some(0)), None);
        assert_eq!(resolver.resolve(Some(0.0), Some(0.0), None), None);
    }

    #[test]
    fn reports_distance() {
        let dir = tmy2_dir();
        let resolver = WeatherResolver::new(dir.path(), &Tm2Summarizer).unwrap();

        let station = resolver.nearest(18.0 + 26.0 / 60.0, -66.0, 0).unwrap();
        assert_eq!(station.record.filename, "11641.tm2");
        assert_relative_eq!(station.distance_km, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn equidistant_stations_pick_first_in_file_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("b.tm2"),
            tm2_header("00002", "EAST", 'N', (0, 0), 'E', (1, 0)),
        )
        .unwrap();
        fs::write(
            dir.path().join("a.tm2"),
            tm2_header("00001", "WEST", 'N', (0, 0), 'W', (1, 0)),
        )
        .unwrap();
        let resolver = WeatherResolver::new(dir.path(), &Tm2Summarizer).unwrap();

        let station = resolver.nearest(0.0, 0.0, 0).unwrap();
        assert_eq!(station.record.filename, "00001.tm2");
    }

    #[test]
    fn empty_directory_resolves_nothing() {
        let dir = TempDir::new().unwrap();
        let resolver = WeatherResolver::new(dir.path(), &Tm2Summarizer).unwrap();
        assert!(resolver.nearest(0.0, 0.0, 0).is_none());
    }

    #[test]
    fn directory_with_space_is_rejected() {
        let dir = TempDir::new().unwrap();
        let spaced = dir.path().join("weather data");
        fs::create_dir(&spaced).unwrap();

        let result = WeatherResolver::new(&spaced, &Tm2Summarizer);
        assert!(matches!(result, Err(WeatherError::PathContainsSpace(_))));
    }

    #[test]
    fn record_with_space_in_filename_is_dropped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("1.csv"),
            "\"69 015\",NAME,CA,-8.0,34.3,-116.1,626",
        )
        .unwrap();
        fs::write(dir.path().join("2.csv"), "690150,NAME,CA,-8.0,34.3,-116.1,626").unwrap();

        let resolver = WeatherResolver::new(dir.path(), &Tmy3CsvSummarizer).unwrap();
        assert_eq!(resolver.records().len(), 1);
        assert_eq!(resolver.records()[0].filename, "690150TYA.csv");
    }

    #[test]
    fn nan_station_never_wins() {
        let dir = tmy2_dir();
        let mut resolver = WeatherResolver::new(dir.path(), &Tm2Summarizer).unwrap();
        resolver.records.insert(
            0,
            WeatherRecord {
                filename: "00000.tm2".into(),
                lat: f32::NAN,
                lon: f32::NAN,
            },
        );

        let station = resolver.nearest(33.8, -118.2, 25).unwrap();
        assert_eq!(station.record.filename, "23129.tm2");
        assert!(station.distance_km.is_finite());
        assert!(resolver.nearest(0.0, 0.0, 25).is_none());
    }

    #[test]
    fn tmy3_file_with_nan_coordinates_is_dropped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.csv"), "000001,\"BROKEN\",XX,-8.0,NaN,NaN,0").unwrap();
        fs::write(
            dir.path().join("b.csv"),
            "690150,\"TWENTYNINE PALMS\",CA,-8.0,34.300,-116.167,626",
        )
        .unwrap();

        let resolver = WeatherResolver::new(dir.path(), &Tmy3CsvSummarizer).unwrap();
        assert_eq!(resolver.records().len(), 1);
        let station = resolver.nearest(34.3, -116.167, 25).unwrap();
        assert_eq!(station.record.filename, "690150TYA.csv");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = WeatherResolver::new(dir.path().join("nope"), &Tm2Summarizer);
        assert!(matches!(result, Err(WeatherError::Directory { .. })));
    }
}
