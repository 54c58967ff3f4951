//! Variables shared by every PVWatts module version.

use crate::ssc::Var;

pub const SOLAR_RESOURCE_FILE: Var<String> = Var::new("solar_resource_file");
pub const ADJUST_CONSTANT: Var<f32> = Var::new("adjust:constant");

// station
pub const LOCATION: Var<String> = Var::new("location");
pub const CITY: Var<String> = Var::new("city");
pub const STATE: Var<String> = Var::new("state");
pub const LAT: Var<f32> = Var::new("lat");
pub const LON: Var<f32> = Var::new("lon");
pub const TZ: Var<f32> = Var::new("tz");
pub const ELEV: Var<f32> = Var::new("elev");

// monthly
pub const POA_MONTHLY: Var<Vec<f32>> = Var::new("poa_monthly");
pub const SOLRAD_MONTHLY: Var<Vec<f32>> = Var::new("solrad_monthly");
pub const DC_MONTHLY: Var<Vec<f32>> = Var::new("dc_monthly");
pub const AC_MONTHLY: Var<Vec<f32>> = Var::new("ac_monthly");
pub const SOLRAD_ANNUAL: Var<f32> = Var::new("solrad_annual");
pub const AC_ANNUAL: Var<f32> = Var::new("ac_annual");
pub const CAPACITY_FACTOR: Var<f32> = Var::new("capacity_factor");

// hourly
pub const AC: Var<Vec<f32>> = Var::new("ac");
pub const POA: Var<Vec<f32>> = Var::new("poa");
pub const DN: Var<Vec<f32>> = Var::new("dn");
pub const DC: Var<Vec<f32>> = Var::new("dc");
pub const DF: Var<Vec<f32>> = Var::new("df");
pub const TAMB: Var<Vec<f32>> = Var::new("tamb");
pub const TCELL: Var<Vec<f32>> = Var::new("tcell");
pub const WSPD: Var<Vec<f32>> = Var::new("wspd");
