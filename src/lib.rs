//! PVWatts photovoltaic simulations over the SSC engine.
//!
//! [`ssc`] binds the engine's procedural interface, [`weather`] finds the
//! weather file nearest a site, [`pvwatts`] turns requests into engine runs
//! and [`api`] serves all of it over HTTP.

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod pvwatts;
pub mod ssc;
pub mod weather;
