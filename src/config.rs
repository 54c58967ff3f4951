//! TOML-based server configuration.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::pvwatts::Timeframe;
use crate::weather::WeatherFormat;

/// Top-level server configuration parsed from TOML.
///
/// Every section has defaults, so an empty file (or no file at all) yields
/// a server on port 3000 reading weather from `./weather`. Load from TOML
/// with [`AppConfig::from_toml_file`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Location of the native engine.
    #[serde(default)]
    pub ssc: SscConfig,
    /// Weather datasets.
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Defaults applied to PVWatts requests.
    #[serde(default)]
    pub pvwatts: PvWattsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SscConfig {
    /// Path or bare name of the SSC shared library.
    pub library: PathBuf,
}

impl Default for SscConfig {
    fn default() -> Self {
        Self {
            library: PathBuf::from(libloading::library_filename("ssc")),
        }
    }
}

/// Weather datasets live at `<directory>/<id>/`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    /// Root holding one subdirectory per dataset.
    pub directory: PathBuf,
    /// Dataset used when a request does not name one.
    pub default_dataset: String,
    pub datasets: Vec<DatasetConfig>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("weather"),
            default_dataset: "tmy2".to_string(),
            datasets: vec![
                DatasetConfig {
                    id: "tmy2".to_string(),
                    format: WeatherFormat::Tm2,
                },
                DatasetConfig {
                    id: "tmy3".to_string(),
                    format: WeatherFormat::Tmy3,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Dataset id, also the subdirectory name.
    pub id: String,
    /// File format of every file in the dataset.
    pub format: WeatherFormat,
}

/// Values filled into PVWatts requests that leave them out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvWattsConfig {
    /// Station search radius (miles); 0 is unlimited.
    pub default_radius: u32,
    /// Output granularity when a request does not ask for one.
    pub default_timeframe: Timeframe,
    pub dc_ac_ratio: f32,
    /// Ground coverage ratio.
    pub gcr: f32,
    /// Inverter efficiency (%).
    pub inv_eff: f32,
}

impl Default for PvWattsConfig {
    fn default() -> Self {
        Self {
            default_radius: 100,
            default_timeframe: Timeframe::Monthly,
            dc_ac_ratio: 1.1,
            gcr: 0.4,
            inv_eff: 96.0,
        }
    }
}

#[derive(Debug)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Parsed listener address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind.parse().map_err(|e| ConfigError {
            field: "server.bind".into(),
            message: format!("\"{}\" is not a socket address: {e}", self.server.bind),
        })
    }

    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Err(e) = self.bind_addr() {
            errors.push(e);
        }

        if self.ssc.library.as_os_str().is_empty() {
            errors.push(ConfigError {
                field: "ssc.library".into(),
                message: "must not be empty".into(),
            });
        }

        let w = &self.weather;
        if w.datasets.is_empty() {
            errors.push(ConfigError {
                field: "weather.datasets".into(),
                message: "at least one dataset is required".into(),
            });
        }
        let mut seen = HashSet::new();
        for (i, dataset) in w.datasets.iter().enumerate() {
            if dataset.id.is_empty() || dataset.id.contains(['/', '\\', ' ']) {
                errors.push(ConfigError {
                    field: format!("weather.datasets[{i}].id"),
                    message: format!(
                        "must be a plain directory name without spaces, got \"{}\"",
                        dataset.id
                    ),
                });
            }
            if !seen.insert(dataset.id.as_str()) {
                errors.push(ConfigError {
                    field: format!("weather.datasets[{i}].id"),
                    message: format!("duplicate dataset \"{}\"", dataset.id),
                });
            }
        }
        if !w.datasets.is_empty() && !seen.contains(w.default_dataset.as_str()) {
            errors.push(ConfigError {
                field: "weather.default_dataset".into(),
                message: format!("\"{}\" is not a configured dataset", w.default_dataset),
            });
        }

        let p = &self.pvwatts;
        if p.dc_ac_ratio <= 0.0 {
            errors.push(ConfigError {
                field: "pvwatts.dc_ac_ratio".into(),
                message: "must be > 0".into(),
            });
        }
        if p.gcr <= 0.0 {
            errors.push(ConfigError {
                field: "pvwatts.gcr".into(),
                message: "must be > 0".into(),
            });
        }
        if !(p.inv_eff > 0.0 && p.inv_eff <= 100.0) {
            errors.push(ConfigError {
                field: "pvwatts.inv_eff".into(),
                message: "must be in (0, 100]".into(),
            });
        }

        errors
    }
}
