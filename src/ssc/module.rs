//! Owning wrapper around an engine compute module.

use std::cell::OnceCell;
use std::ffi::CString;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::{
    ACTION_LOG, ACTION_UPDATE, DataContainer, ExecutionHandler, Handle, MessageType, ModuleInfo,
    NativeUpdate, RawVarInfo, SscApi, SscError, find_module,
};

/// Direction of a module variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    Input,
    Output,
    InOut,
}

impl VarType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Input),
            2 => Some(Self::Output),
            3 => Some(Self::InOut),
            _ => None,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, Self::Input | Self::InOut)
    }

    pub fn is_output(self) -> bool {
        matches!(self, Self::Output | Self::InOut)
    }
}

/// Value kind of a module variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Invalid,
    String,
    Number,
    Array,
    Matrix,
    Table,
}

impl DataType {
    /// Decodes the engine's data type code; anything unrecognized is `Invalid`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::String,
            2 => Self::Number,
            3 => Self::Array,
            4 => Self::Matrix,
            5 => Self::Table,
            _ => Self::Invalid,
        }
    }
}

/// Metadata for one variable a module reads or writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub var_type: VarType,
    pub data_type: DataType,
    pub name: String,
    pub label: String,
    pub units: String,
    pub group: String,
    pub required: String,
    pub meta: String,
}

impl Variable {
    fn decode(raw: RawVarInfo) -> Option<Self> {
        let var_type = VarType::from_code(raw.var_type)?;
        Some(Self {
            var_type,
            data_type: DataType::from_code(raw.data_type),
            name: raw.name,
            label: raw.label,
            units: raw.units,
            group: raw.group,
            required: raw.required,
            meta: raw.meta,
        })
    }
}

/// Registry entry plus the full variable list of a module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub description: String,
    pub version: i32,
    pub variables: Vec<Variable>,
}

/// A live instance of a named compute module.
///
/// Owns one engine module handle, freed by [`release`](Self::release) or on
/// drop. Its lifetime is independent of any [`DataContainer`] it executes
/// against.
pub struct SscModule {
    api: Arc<dyn SscApi>,
    info: ModuleInfo,
    handle: Handle,
    released: bool,
    variables: OnceCell<Vec<Variable>>,
}

impl SscModule {
    /// Creates the module registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SscError::UnknownModule`] if no registry entry has this name
    /// or the engine refuses to instantiate it.
    pub fn new(api: Arc<dyn SscApi>, name: &str) -> Result<Self, SscError> {
        let info = find_module(api.as_ref(), name)
            .ok_or_else(|| SscError::UnknownModule(name.to_string()))?;
        let c_name = CString::new(name).map_err(|_| SscError::UnknownModule(name.to_string()))?;
        let handle = api
            .module_create(&c_name)
            .ok_or_else(|| SscError::UnknownModule(name.to_string()))?;

        Ok(Self {
            api,
            info,
            handle,
            released: false,
            variables: OnceCell::new(),
        })
    }

    fn handle(&self) -> Result<Handle, SscError> {
        if self.released {
            return Err(SscError::Released("module"));
        }
        Ok(self.handle)
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Every variable the module declares, in engine order.
    ///
    /// Enumerated once and cached. Entries with an unrecognized direction
    /// code are skipped.
    pub fn variables(&self) -> Result<&[Variable], SscError> {
        let handle = self.handle()?;
        let variables = self.variables.get_or_init(|| {
            (0..)
                .map_while(|index| self.api.module_var_info(handle, index))
                .filter_map(|raw| {
                    let code = raw.var_type;
                    let name = raw.name.clone();
                    let decoded = Variable::decode(raw);
                    if decoded.is_none() {
                        warn!(module = %self.info.name, variable = %name, code, "skipping variable with unknown direction");
                    }
                    decoded
                })
                .collect()
        });
        Ok(variables)
    }

    /// Registry entry plus variables, for display.
    pub fn summary(&self) -> Result<ModuleSummary, SscError> {
        Ok(ModuleSummary {
            name: self.info.name.clone(),
            description: self.info.description.clone(),
            version: self.info.version,
            variables: self.variables()?.to_vec(),
        })
    }

    /// Runs the module against `data` with no message stream.
    ///
    /// Returns whether the engine reported success.
    pub fn execute(&self, data: &mut DataContainer) -> Result<bool, SscError> {
        let module = self.handle()?;
        let data = data.handle()?;
        Ok(self.api.module_exec(module, data))
    }

    /// Runs the module against `data`, forwarding every callback to
    /// `handler`.
    ///
    /// # Panics
    ///
    /// Panics if the engine reports a callback action other than log or
    /// progress update, or a log severity outside the known set.
    pub fn execute_with_handler(
        &self,
        data: &mut DataContainer,
        handler: &mut dyn ExecutionHandler,
    ) -> Result<bool, SscError> {
        let module = self.handle()?;
        let data = data.handle()?;
        let mut dispatch = |update: NativeUpdate<'_>| match update.action {
            ACTION_LOG => handler.handle_log_message(
                MessageType::from_code(update.f0 as i32),
                update.f1,
                update.s0,
            ),
            ACTION_UPDATE => handler.handle_progress_update(update.f0, update.f1, update.s0),
            other => unreachable!("unknown SSC callback action {other}"),
        };
        Ok(self.api.module_exec_with_handler(module, data, &mut dispatch))
    }

    /// Frees the engine handle. Calling this more than once is a no-op.
    pub fn release(&mut self) {
        if !self.released {
            self.api.module_free(self.handle);
            self.released = true;
        }
    }
}

impl Drop for SscModule {
    fn drop(&mut self) {
        self.release();
    }
}

/// Creates `name` just long enough to describe it.
pub fn module_summary(api: Arc<dyn SscApi>, name: &str) -> Result<ModuleSummary, SscError> {
    SscModule::new(api, name)?.summary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssc::MessageCollector;
    use crate::ssc::memory::{MemoryModule, MemorySsc};

    fn engine() -> Arc<MemorySsc> {
        Arc::new(
            MemorySsc::new()
                .with_module(
                    MemoryModule::new("pvwattsv5", "PVWatts V5", 3)
                        .input(1, "solar_resource_file")
                        .input(2, "system_capacity")
                        .output(3, "ac_monthly")
                        .variable(3, 2, "adjust:constant", "")
                        .variable(9, 2, "bogus", ""),
                )
                .with_module(MemoryModule::new("chatty", "", 1).on_exec(|_, session| {
                    session.log(2, 1.0, "low irradiance");
                    session.progress(50.0, 1.0, "halfway");
                    session.log(3, 2.0, "bad tilt");
                    session.log(1, 3.0, "notice");
                    session.log(0, 4.0, "missing input")
                }))
                .with_module(MemoryModule::new("stoppable", "", 1).on_exec(|_, session| {
                    for (severity, text) in [(2, "first"), (2, "second"), (3, "third")] {
                        if !session.log(severity, 0.0, text) {
                            return false;
                        }
                    }
                    true
                }))
                .with_module(
                    MemoryModule::new("rogue", "", 1).on_exec(|_, session| session.raw(5, 0.0, 0.0, "")),
                ),
        )
    }

    #[test]
    fn unknown_module_name() {
        let result = SscModule::new(engine(), "asdf");
        assert!(matches!(result, Err(SscError::UnknownModule(name)) if name == "asdf"));
    }

    #[test]
    fn variables_are_decoded_and_cached() {
        let module = SscModule::new(engine(), "pvwattsv5").unwrap();
        let vars = module.variables().unwrap();

        assert_eq!(vars.len(), 4);
        assert_eq!(vars[0].name, "solar_resource_file");
        assert_eq!(vars[0].data_type, DataType::String);
        assert_eq!(vars[2].var_type, VarType::Output);
        assert_eq!(vars[3].var_type, VarType::InOut);

        let again = module.variables().unwrap();
        assert!(std::ptr::eq(vars, again));
    }

    #[test]
    fn summary_carries_registry_entry() {
        let summary = module_summary(engine(), "pvwattsv5").unwrap();
        assert_eq!(summary.description, "PVWatts V5");
        assert_eq!(summary.version, 3);
        assert_eq!(summary.variables.len(), 4);
    }

    #[test]
    fn handler_sees_every_message() {
        let api = engine();
        let module = SscModule::new(api.clone(), "chatty").unwrap();
        let mut data = DataContainer::new(api).unwrap();
        let mut collector = MessageCollector::new();

        let ok = module.execute_with_handler(&mut data, &mut collector).unwrap();

        assert!(ok);
        assert_eq!(collector.errors, vec!["bad tilt", "notice", "missing input"]);
        assert_eq!(collector.warnings, vec!["low irradiance"]);
    }

    /// Records log lines and asks the engine to stop after `limit` of them.
    struct StopAfter {
        limit: usize,
        seen: Vec<String>,
    }

    impl ExecutionHandler for StopAfter {
        fn handle_log_message(&mut self, _kind: MessageType, _time: f32, text: &str) -> bool {
            self.seen.push(text.to_string());
            self.seen.len() < self.limit
        }

        fn handle_progress_update(&mut self, _percent: f32, _time: f32, _text: &str) -> bool {
            true
        }
    }

    #[test]
    fn handler_returning_false_stops_execution() {
        let api = engine();
        let module = SscModule::new(api.clone(), "stoppable").unwrap();
        let mut data = DataContainer::new(api).unwrap();
        let mut handler = StopAfter {
            limit: 1,
            seen: Vec::new(),
        };

        let ok = module.execute_with_handler(&mut data, &mut handler).unwrap();

        assert!(!ok);
        assert_eq!(handler.seen, vec!["first"]);
    }

    #[test]
    fn handler_returning_true_runs_to_completion() {
        let api = engine();
        let module = SscModule::new(api.clone(), "stoppable").unwrap();
        let mut data = DataContainer::new(api).unwrap();
        let mut handler = StopAfter {
            limit: usize::MAX,
            seen: Vec::new(),
        };

        assert!(module.execute_with_handler(&mut data, &mut handler).unwrap());
        assert_eq!(handler.seen, vec!["first", "second", "third"]);
    }

    #[test]
    #[should_panic(expected = "unknown SSC callback action")]
    fn unknown_callback_action_is_not_swallowed() {
        let api = engine();
        let module = SscModule::new(api.clone(), "rogue").unwrap();
        let mut data = DataContainer::new(api).unwrap();
        let _ = module.execute_with_handler(&mut data, &mut MessageCollector::new());
    }

    #[test]
    fn execute_after_release_fails() {
        let api = engine();
        let mut module = SscModule::new(api.clone(), "chatty").unwrap();
        let mut data = DataContainer::new(api).unwrap();
        module.release();

        assert!(matches!(module.execute(&mut data), Err(SscError::Released(_))));
        assert!(matches!(module.variables(), Err(SscError::Released(_))));
    }

    #[test]
    fn executing_against_released_data_fails() {
        let api = engine();
        let module = SscModule::new(api.clone(), "chatty").unwrap();
        let mut data = DataContainer::new(api).unwrap();
        data.release();

        assert!(matches!(module.execute(&mut data), Err(SscError::Released(_))));
    }

    #[test]
    fn module_and_data_release_independently() {
        let api = engine();
        let mut module = SscModule::new(api.clone(), "pvwattsv5").unwrap();
        let data = DataContainer::new(api.clone()).unwrap();

        module.release();
        module.release();
        assert_eq!(api.module_free_calls(), 1);
        assert_eq!(api.live_data(), 1);

        drop(data);
        drop(module);
        assert_eq!(api.module_free_calls(), 1);
        assert_eq!(api.data_free_calls(), 1);
    }
}
