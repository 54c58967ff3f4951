//! Response bodies for the PVWatts endpoints.

use serde::Serialize;

use crate::ssc::SscInfo;

/// Result of one PVWatts run.
///
/// When the engine logged any error-class message, only `inputs`, `errors`
/// and `warnings` are filled in.
#[derive(Debug, Clone, Serialize)]
pub struct PvWattsResponse<I> {
    /// The request as received.
    pub inputs: I,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssc_info: Option<SscInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_info: Option<StationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Outputs>,
}

impl<I> PvWattsResponse<I> {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The weather station the run used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationInfo {
    pub lat: f32,
    pub lon: f32,
    /// Elevation (m).
    pub elev: f32,
    /// UTC offset (hours).
    pub tz: f32,
    pub location: String,
    pub city: String,
    pub state: String,
    /// Distance from the requested point to the station (km).
    pub distance: f64,
    /// File name of the weather file, without its directory.
    pub solar_resource_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outputs {
    pub poa_monthly: Vec<f32>,
    pub dc_monthly: Vec<f32>,
    pub ac_monthly: Vec<f32>,
    pub ac_annual: f32,
    pub solrad_monthly: Vec<f32>,
    pub solrad_annual: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_factor: Option<f32>,
    /// Present only for hourly requests.
    #[serde(flatten)]
    pub hourly: Option<HourlyOutputs>,
}

/// 8760-entry hourly series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyOutputs {
    pub ac: Vec<f32>,
    pub poa: Vec<f32>,
    pub dn: Vec<f32>,
    pub dc: Vec<f32>,
    pub df: Vec<f32>,
    pub tamb: Vec<f32>,
    pub tcell: Vec<f32>,
    pub wspd: Vec<f32>,
}
