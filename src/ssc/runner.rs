//! Scoped module + data lifecycle for a single simulation.

use std::sync::Arc;

use tracing::debug;

use super::{DataContainer, SscApi, SscError, SscModule};

/// Creates a module and a data container, hands both to a closure and
/// releases them on every exit path, including early returns and panics.
#[derive(Clone)]
pub struct SimulationRunner {
    api: Arc<dyn SscApi>,
}

impl SimulationRunner {
    pub fn new(api: Arc<dyn SscApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<dyn SscApi> {
        &self.api
    }

    /// Runs `body` with a fresh instance of module `name` and an empty
    /// data container.
    ///
    /// # Arguments
    ///
    /// * `name` - registry name of the module to create
    /// * `body` - writes inputs, executes and reads outputs
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or an [`SscError`] (converted into `E`)
    /// if the module is unknown or the container cannot be allocated.
    pub fn run<T, E, F>(&self, name: &str, body: F) -> Result<T, E>
    where
        E: From<SscError>,
        F: FnOnce(&mut SscModule, &mut DataContainer) -> Result<T, E>,
    {
        let mut module = SscModule::new(Arc::clone(&self.api), name)?;
        let mut data = DataContainer::new(Arc::clone(&self.api))?;
        debug!(module = name, "simulation started");

        let result = body(&mut module, &mut data);

        data.release();
        module.release();
        debug!(module = name, ok = result.is_ok(), "simulation finished");
        result
    }
}
