//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use pvwatts_sim::config::PvWattsConfig;
use pvwatts_sim::pvwatts::PvWattsService;
use pvwatts_sim::ssc::memory::{MemoryModule, MemorySession, MemorySsc, MemoryTable, MemoryValue};
use pvwatts_sim::weather::{WeatherCatalog, WeatherFormat};

/// TMY2 header for Long Beach, CA (33°49'N 118°9'W).
pub const LONG_BEACH_TM2: &str = " 23129 LONG_BEACH             CA  -8 N 33 49 W 118  9    10";
/// TMY2 header for Denver, CO (39°45'N 104°52'W).
pub const DENVER_TM2: &str = " 23062 DENVER                 CO  -7 N 39 45 W 104 52  1610";
/// TMY3 header for Twentynine Palms, CA.
pub const TWENTYNINE_PALMS_TMY3: &str =
    "690150,\"TWENTYNINE PALMS\",CA,-8.0,34.300,-116.167,626\nDate,Time,GHI\n01/01/1988,01:00,0\n";

/// Writes a weather root with `tmy2/` and `tmy3/` datasets.
pub fn weather_root() -> TempDir {
    let root = TempDir::new().unwrap();
    let tmy2 = root.path().join("tmy2");
    let tmy3 = root.path().join("tmy3");
    fs::create_dir(&tmy2).unwrap();
    fs::create_dir(&tmy3).unwrap();
    fs::write(tmy2.join("23129.tm2"), LONG_BEACH_TM2).unwrap();
    fs::write(tmy2.join("23062.tm2"), DENVER_TM2).unwrap();
    fs::write(tmy3.join("690150TYA.csv"), TWENTYNINE_PALMS_TMY3).unwrap();
    root
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Fake `pvwattsv5`: needs a weather file and `system_capacity`, fails on
/// tilts above 90 degrees.
fn pvwatts(table: &mut MemoryTable, session: &mut MemorySession<'_>) -> bool {
    let Some(file) = table.string("solar_resource_file").map(str::to_string) else {
        return session.log(0, 0.0, "solar_resource_file: variable required");
    };
    let Some(size) = table.number("system_capacity") else {
        session.log(0, 0.0, "system_capacity: variable required");
        return false;
    };
    if table.number("tilt").is_some_and(|t| t > 90.0) {
        session.log(3, 0.0, "tilt out of range");
        return false;
    }
    if table.number("gcr").is_some_and(|g| g > 0.9) {
        session.log(2, 0.0, "gcr is very high");
    }

    table.set_string("location", &file_stem(&file));
    table.set_string("city", "FIXTURE");
    table.set_string("state", "CA");
    for (name, value) in [("lat", 33.8), ("lon", -118.2), ("tz", -8.0), ("elev", 10.0)] {
        table.set_number(name, value);
    }

    let monthly: Vec<f32> = (0..12).map(|m| size * (100.0 + m as f32)).collect();
    for name in ["poa_monthly", "solrad_monthly", "dc_monthly", "ac_monthly"] {
        table.set_array(name, monthly.clone());
    }
    table.set_number("ac_annual", monthly.iter().sum());
    table.set_number("solrad_annual", 5.0);
    table.set_number("capacity_factor", 16.0);
    for name in ["ac", "poa", "dn", "dc", "df", "tamb", "tcell", "wspd"] {
        table.set_array(name, vec![0.5 * size; 8760]);
    }
    true
}

/// Fake generic module: transposes `grid` into `transposed`, sums `series`
/// into `total` and counts executions into `runs`.
fn transpose(table: &mut MemoryTable, session: &mut MemorySession<'_>) -> bool {
    if let Some(MemoryValue::Matrix { values, rows, cols }) = table.get("grid").cloned() {
        let mut out = vec![0.0; values.len()];
        for i in 0..rows {
            for j in 0..cols {
                out[j * rows + i] = values[i * cols + j];
            }
        }
        table.set(
            "transposed",
            MemoryValue::Matrix {
                values: out,
                rows: cols,
                cols: rows,
            },
        );
    } else {
        session.log(1, 0.0, "no grid supplied");
    }
    if let Some(MemoryValue::Array(series)) = table.get("series").cloned() {
        table.set_number("total", series.iter().sum());
    }
    true
}

/// In-memory engine with `pvwattsv5` and `transpose` registered.
pub fn engine() -> Arc<MemorySsc> {
    Arc::new(
        MemorySsc::new()
            .with_version(211, "fixture engine")
            .with_module(
                MemoryModule::new("pvwattsv5", "PVWatts V5 fixture", 3)
                    .input(1, "solar_resource_file")
                    .input(2, "system_capacity")
                    .input(2, "tilt")
                    .output(3, "ac_monthly")
                    .output(2, "ac_annual")
                    .on_exec(pvwatts),
            )
            .with_module(
                MemoryModule::new("transpose", "Matrix transpose", 1)
                    .input(4, "grid")
                    .input(3, "series")
                    .output(4, "transposed")
                    .output(2, "total")
                    .on_exec(transpose),
            ),
    )
}

/// Service over every dataset under `root`, default `tmy2`.
pub fn service(api: Arc<MemorySsc>, root: &TempDir) -> PvWattsService {
    let mut catalog = WeatherCatalog::new("tmy2");
    catalog
        .load("tmy2", root.path().join("tmy2"), WeatherFormat::Tm2)
        .unwrap();
    catalog
        .load("tmy3", root.path().join("tmy3"), WeatherFormat::Tmy3)
        .unwrap();
    PvWattsService::new(api, Arc::new(catalog), PvWattsConfig::default())
}
