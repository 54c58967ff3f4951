//! PVWatts version 5 (`pvwattsv5`).

use serde::{Deserialize, Serialize};

use super::{PvWattsResponse, PvWattsService, ServiceError, Site, Timeframe};
use crate::ssc::Var;

const MODULE: &str = "pvwattsv5";

const SYSTEM_CAPACITY: Var<f32> = Var::new("system_capacity");
const MODULE_TYPE: Var<i32> = Var::new("module_type");
const LOSSES: Var<f32> = Var::new("losses");
const ARRAY_TYPE: Var<i32> = Var::new("array_type");
const TILT: Var<f32> = Var::new("tilt");
const AZIMUTH: Var<f32> = Var::new("azimuth");
const DC_AC_RATIO: Var<f32> = Var::new("dc_ac_ratio");
const GCR: Var<f32> = Var::new("gcr");
const INV_EFF: Var<f32> = Var::new("inv_eff");

/// Query parameters of a v5 request. Every field is optional; absent
/// system parameters are left to the engine's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PvWatts5Request {
    pub lat: Option<f32>,
    pub lon: Option<f32>,
    /// Station search radius (miles); 0 is unlimited.
    pub radius: Option<u32>,
    pub dataset: Option<String>,
    pub timeframe: Option<Timeframe>,
    /// Nameplate DC capacity (kW).
    pub system_capacity: Option<f32>,
    /// 0 standard, 1 premium, 2 thin film.
    pub module_type: Option<i32>,
    /// System losses (%).
    pub losses: Option<f32>,
    /// 0 fixed open rack, 1 fixed roof mount, 2 one-axis, 3 one-axis
    /// backtracking, 4 two-axis.
    pub array_type: Option<i32>,
    pub tilt: Option<f32>,
    pub azimuth: Option<f32>,
    pub dc_ac_ratio: Option<f32>,
    pub gcr: Option<f32>,
    pub inv_eff: Option<f32>,
}

impl PvWattsService {
    /// Runs a v5 simulation.
    ///
    /// `radius`, `timeframe`, `dc_ac_ratio`, `gcr` and `inv_eff` fall back
    /// to the configured defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] when the location is missing or
    /// no weather station is close enough, before anything native is
    /// allocated.
    pub fn v5(&self, request: PvWatts5Request) -> Result<PvWattsResponse<PvWatts5Request>, ServiceError> {
        let defaults = self.defaults();
        let site = Site {
            lat: request.lat,
            lon: request.lon,
            radius: request.radius.unwrap_or(defaults.default_radius),
            dataset: request.dataset.as_deref(),
        };
        let timeframe = request.timeframe.unwrap_or(defaults.default_timeframe);
        let dc_ac_ratio = request.dc_ac_ratio.unwrap_or(defaults.dc_ac_ratio);
        let gcr = request.gcr.unwrap_or(defaults.gcr);
        let inv_eff = request.inv_eff.unwrap_or(defaults.inv_eff);

        self.simulate(MODULE, request.clone(), site, timeframe, true, |data| {
            SYSTEM_CAPACITY.set(request.system_capacity, data)?;
            MODULE_TYPE.set(request.module_type, data)?;
            LOSSES.set(request.losses, data)?;
            ARRAY_TYPE.set(request.array_type, data)?;
            TILT.set(request.tilt, data)?;
            AZIMUTH.set(request.azimuth, data)?;
            DC_AC_RATIO.set(Some(dc_ac_ratio), data)?;
            GCR.set(Some(gcr), data)?;
            INV_EFF.set(Some(inv_eff), data)
        })
    }
}
