//! PVWatts version 4, backed by the engine's `pvwattsv1` module.

use serde::{Deserialize, Serialize};

use super::{PvWattsResponse, PvWattsService, ServiceError, Site, Timeframe};
use crate::ssc::Var;

const MODULE: &str = "pvwattsv1";

const SYSTEM_SIZE: Var<f32> = Var::new("system_size");
const DERATE: Var<f32> = Var::new("derate");
const TRACK_MODE: Var<i32> = Var::new("track_mode");
const AZIMUTH: Var<f32> = Var::new("azimuth");
const TILT: Var<f32> = Var::new("tilt");
const TILT_EQ_LAT: Var<i32> = Var::new("tilt_eq_lat");
const INOCT: Var<f32> = Var::new("inoct");
const GAMMA: Var<f32> = Var::new("gamma");

const DEFAULT_TRACK_MODE: i32 = 1;
const DEFAULT_TILT_EQ_LAT: i32 = 0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PvWatts4Request {
    pub lat: Option<f32>,
    pub lon: Option<f32>,
    pub radius: Option<u32>,
    pub dataset: Option<String>,
    pub timeframe: Option<Timeframe>,
    /// Nameplate DC rating (kW).
    pub system_size: Option<f32>,
    /// Overall DC to AC derate factor.
    pub derate: Option<f32>,
    pub tilt: Option<f32>,
    pub azimuth: Option<f32>,
    /// 0 fixed, 1 one-axis, 2 two-axis.
    pub track_mode: Option<i32>,
    /// 1 to set the tilt equal to the station latitude.
    pub tilt_eq_lat: Option<i32>,
    /// Nominal operating cell temperature (C).
    pub inoct: Option<f32>,
    /// Power temperature coefficient (%/C).
    pub gamma: Option<f32>,
}

impl PvWattsService {
    /// Runs a v4 simulation. Monthly outputs carry no capacity factor.
    ///
    /// # Errors
    ///
    /// Same as [`PvWattsService::v5`].
    pub fn v4(&self, request: PvWatts4Request) -> Result<PvWattsResponse<PvWatts4Request>, ServiceError> {
        let defaults = self.defaults();
        let site = Site {
            lat: request.lat,
            lon: request.lon,
            radius: request.radius.unwrap_or(defaults.default_radius),
            dataset: request.dataset.as_deref(),
        };
        let timeframe = request.timeframe.unwrap_or(defaults.default_timeframe);
        let track_mode = request.track_mode.unwrap_or(DEFAULT_TRACK_MODE);
        let tilt_eq_lat = request.tilt_eq_lat.unwrap_or(DEFAULT_TILT_EQ_LAT);

        self.simulate(MODULE, request.clone(), site, timeframe, false, |data| {
            SYSTEM_SIZE.set(request.system_size, data)?;
            AZIMUTH.set(request.azimuth, data)?;
            TILT.set(request.tilt, data)?;
            DERATE.set(request.derate, data)?;
            TRACK_MODE.set(Some(track_mode), data)?;
            TILT_EQ_LAT.set(Some(tilt_eq_lat), data)?;
            INOCT.set(request.inoct, data)?;
            GAMMA.set(request.gamma, data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pvwatts::testing;

    fn request() -> PvWatts4Request {
        PvWatts4Request {
            lat: Some(33.816),
            lon: Some(-118.15),
            system_size: Some(4.0),
            derate: Some(0.77),
            tilt: Some(20.0),
            azimuth: Some(180.0),
            ..PvWatts4Request::default()
        }
    }

    #[test]
    fn monthly_run_has_no_capacity_factor() {
        let weather = testing::weather();
        let api = testing::engine();
        let service = testing::service(api.clone(), &weather);

        let response = service.v4(request()).unwrap();

        assert!(response.is_success(), "{:?}", response.errors);
        let outputs = response.outputs.unwrap();
        assert_eq!(outputs.capacity_factor, None);
        assert_eq!(outputs.dc_monthly.len(), 12);
        assert_eq!(response.station_info.unwrap().solar_resource_file, "23129.tm2");
        assert_eq!(api.live_modules(), 0);
    }

    #[test]
    fn hourly_run() {
        let weather = testing::weather();
        let service = testing::service(testing::engine(), &weather);

        let response = service
            .v4(PvWatts4Request {
                timeframe: Some(Timeframe::Hourly),
                ..request()
            })
            .unwrap();
        assert_eq!(response.outputs.unwrap().hourly.unwrap().tcell.len(), 8760);
    }

    #[test]
    fn missing_system_size() {
        let weather = testing::weather();
        let service = testing::service(testing::engine(), &weather);

        let response = service
            .v4(PvWatts4Request {
                system_size: None,
                ..request()
            })
            .unwrap();
        assert_eq!(response.errors, vec!["system_size: variable required"]);
        assert!(response.outputs.is_none());
    }

    #[test]
    fn missing_lon_is_rejected() {
        let weather = testing::weather();
        let service = testing::service(testing::engine(), &weather);

        let result = service.v4(PvWatts4Request {
            lon: None,
            ..request()
        });
        assert!(matches!(result, Err(ServiceError::Validation(msg)) if msg.contains("lon")));
    }
}
