//! PVWatts simulations: request defaults, weather resolution, input
//! marshalling and output extraction around the `pvwattsv1` (v4) and
//! `pvwattsv5` (v5) engine modules.

pub mod response;
pub mod v4;
pub mod v5;
mod variables;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PvWattsConfig;
use crate::ssc::{DataContainer, MessageCollector, SimulationRunner, SscApi, SscError, SscInfo};
use crate::weather::{ResolvedStation, WeatherCatalog, WeatherError};

pub use response::{HourlyOutputs, Outputs, PvWattsResponse, StationInfo};
pub use v4::PvWatts4Request;
pub use v5::PvWatts5Request;

/// Version string reported in successful responses.
pub const SERVICE_VERSION: &str = "0.0.1";

/// Granularity of the returned outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// Monthly and annual totals only.
    #[default]
    Monthly,
    /// Monthly totals plus the 8760-hour series.
    Hourly,
}

/// Errors that stop a simulation before it produces a response.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    /// The request is unusable as given; nothing native was allocated.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Ssc(#[from] SscError),
}

/// Where to look for weather data.
#[derive(Debug, Clone)]
struct Site<'a> {
    lat: Option<f32>,
    lon: Option<f32>,
    radius: u32,
    dataset: Option<&'a str>,
}

/// Runs PVWatts requests against the engine.
///
/// Cheap to clone; every clone shares the engine and weather catalog.
#[derive(Clone)]
pub struct PvWattsService {
    runner: SimulationRunner,
    catalog: Arc<WeatherCatalog>,
    defaults: PvWattsConfig,
}

impl PvWattsService {
    pub fn new(api: Arc<dyn SscApi>, catalog: Arc<WeatherCatalog>, defaults: PvWattsConfig) -> Self {
        Self {
            runner: SimulationRunner::new(api),
            catalog,
            defaults,
        }
    }

    pub fn defaults(&self) -> &PvWattsConfig {
        &self.defaults
    }

    pub fn catalog(&self) -> &WeatherCatalog {
        &self.catalog
    }

    fn locate(&self, site: &Site<'_>) -> Result<ResolvedStation, ServiceError> {
        let lat = site
            .lat
            .ok_or_else(|| ServiceError::Validation("lat is required".into()))?;
        let lon = site
            .lon
            .ok_or_else(|| ServiceError::Validation("lon is required".into()))?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ServiceError::Validation(format!(
                "lat must be between -90 and 90, got {lat}"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ServiceError::Validation(format!(
                "lon must be between -180 and 180, got {lon}"
            )));
        }

        let resolver = self.catalog.get(site.dataset).map_err(|e| match e {
            WeatherError::UnknownDataset(id) => {
                ServiceError::Validation(format!("dataset \"{id}\" is not available"))
            }
            other => ServiceError::Validation(other.to_string()),
        })?;

        resolver.nearest(lat, lon, site.radius).ok_or_else(|| {
            ServiceError::Validation(format!(
                "no weather data found within {} miles of ({lat}, {lon})",
                site.radius
            ))
        })
    }

    /// Resolves weather, writes every input, executes once and, if the
    /// engine reported no errors, reads the outputs back.
    fn simulate<I, W>(
        &self,
        module: &str,
        inputs: I,
        site: Site<'_>,
        timeframe: Timeframe,
        capacity_factor: bool,
        write_inputs: W,
    ) -> Result<PvWattsResponse<I>, ServiceError>
    where
        W: FnOnce(&mut DataContainer) -> Result<(), SscError>,
    {
        let station = self.locate(&site)?;
        let weather_file = station.path.to_str().ok_or_else(|| {
            SscError::invalid(variables::SOLAR_RESOURCE_FILE.name(), "path is not valid UTF-8")
        })?;
        debug!(module, file = weather_file, distance_km = station.distance_km, "weather resolved");

        self.runner.run(module, |ssc_module, data| {
            variables::ADJUST_CONSTANT.set(Some(1.0), data)?;
            variables::SOLAR_RESOURCE_FILE.set(Some(weather_file.to_string()), data)?;
            write_inputs(data)?;

            let mut collector = MessageCollector::new();
            let ok = ssc_module.execute_with_handler(data, &mut collector)?;
            if !ok && !collector.has_errors() {
                collector
                    .errors
                    .push(format!("{module} failed without reporting a reason"));
            }

            let MessageCollector { errors, warnings } = collector;
            if !errors.is_empty() {
                debug!(module, errors = errors.len(), "simulation reported errors");
                return Ok(PvWattsResponse {
                    inputs,
                    errors,
                    warnings,
                    version: None,
                    ssc_info: None,
                    station_info: None,
                    outputs: None,
                });
            }

            Ok(PvWattsResponse {
                inputs,
                errors,
                warnings,
                version: Some(SERVICE_VERSION.to_string()),
                ssc_info: Some(SscInfo::query(self.runner.api().as_ref())),
                station_info: Some(read_station(data, &station)?),
                outputs: Some(read_outputs(data, timeframe, capacity_factor)?),
            })
        })
    }
}

fn read_station(data: &DataContainer, station: &ResolvedStation) -> Result<StationInfo, SscError> {
    use variables::*;

    let file = SOLAR_RESOURCE_FILE.get(data)?;
    let solar_resource_file = match Path::new(&file).file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => file.clone(),
    };

    Ok(StationInfo {
        lat: LAT.get(data)?,
        lon: LON.get(data)?,
        elev: ELEV.get(data)?,
        tz: TZ.get(data)?,
        location: LOCATION.get(data)?,
        city: CITY.get(data)?,
        state: STATE.get(data)?,
        distance: station.distance_km,
        solar_resource_file,
    })
}

fn read_outputs(
    data: &DataContainer,
    timeframe: Timeframe,
    capacity_factor: bool,
) -> Result<Outputs, SscError> {
    use variables::*;

    let hourly = match timeframe {
        Timeframe::Monthly => None,
        Timeframe::Hourly => Some(HourlyOutputs {
            ac: AC.get(data)?,
            poa: POA.get(data)?,
            dn: DN.get(data)?,
            dc: DC.get(data)?,
            df: DF.get(data)?,
            tamb: TAMB.get(data)?,
            tcell: TCELL.get(data)?,
            wspd: WSPD.get(data)?,
        }),
    };

    Ok(Outputs {
        poa_monthly: POA_MONTHLY.get(data)?,
        dc_monthly: DC_MONTHLY.get(data)?,
        ac_monthly: AC_MONTHLY.get(data)?,
        ac_annual: AC_ANNUAL.get(data)?,
        solrad_monthly: SOLRAD_MONTHLY.get(data)?,
        solrad_annual: SOLRAD_ANNUAL.get(data)?,
        capacity_factor: if capacity_factor {
            Some(CAPACITY_FACTOR.get(data)?)
        } else {
            None
        },
        hourly,
    })
}
