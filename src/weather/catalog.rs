//! Named weather datasets, each backed by its own resolver.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use super::{WeatherError, WeatherFormat, WeatherResolver};
use crate::config::WeatherConfig;

/// Every weather dataset the server knows, keyed by dataset id.
#[derive(Debug, Clone)]
pub struct WeatherCatalog {
    datasets: BTreeMap<String, WeatherResolver>,
    default_dataset: String,
}

impl WeatherCatalog {
    /// An empty catalog whose default dataset is `default_dataset`.
    pub fn new(default_dataset: impl Into<String>) -> Self {
        Self {
            datasets: BTreeMap::new(),
            default_dataset: default_dataset.into(),
        }
    }

    /// Indexes `<directory>/<id>/` for every configured dataset.
    ///
    /// # Errors
    ///
    /// Fails if any dataset directory cannot be indexed.
    pub fn from_config(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let mut catalog = Self::new(config.default_dataset.clone());
        for dataset in &config.datasets {
            catalog.load(&dataset.id, config.directory.join(&dataset.id), dataset.format)?;
        }
        Ok(catalog)
    }

    /// Indexes one dataset directory and registers it under `id`.
    pub fn load(
        &mut self,
        id: &str,
        directory: impl AsRef<Path>,
        format: WeatherFormat,
    ) -> Result<&WeatherResolver, WeatherError> {
        let summarizer = format.summarizer();
        let resolver = WeatherResolver::new(directory, summarizer.as_ref())?;
        info!(dataset = id, stations = resolver.records().len(), "weather dataset loaded");
        Ok(self.insert(id, resolver))
    }

    pub fn insert(&mut self, id: &str, resolver: WeatherResolver) -> &WeatherResolver {
        self.datasets.insert(id.to_string(), resolver);
        &self.datasets[id]
    }

    pub fn default_dataset(&self) -> &str {
        &self.default_dataset
    }

    pub fn dataset_ids(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Resolver for `dataset`, or for the default dataset when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError::UnknownDataset`] if no such dataset is loaded.
    pub fn get(&self, dataset: Option<&str>) -> Result<&WeatherResolver, WeatherError> {
        let id = dataset.unwrap_or(&self.default_dataset);
        self.datasets
            .get(id)
            .ok_or_else(|| WeatherError::UnknownDataset(id.to_string()))
    }
}
