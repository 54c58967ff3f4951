//! Runs any registered module from a loosely typed JSON input map.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::{
    DataContainer, DataType, LogMessage, MessageRecorder, ModuleInfo, SimulationRunner, SscError,
    Variable,
};

/// Result of a generic module run.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSimulation {
    pub module: ModuleInfo,
    pub messages: Vec<LogMessage>,
    pub inputs: Map<String, Value>,
    pub outputs: BTreeMap<String, Value>,
}

/// Executes module `name` with whatever inputs it declares out of `inputs`.
///
/// Keys that do not name an input variable are ignored, as are table
/// variables. Every declared output present after execution is returned,
/// regardless of the messages the engine logged.
///
/// # Errors
///
/// Returns [`SscError::UnknownModule`] for an unregistered name and
/// [`SscError::InvalidArgument`] when a supplied value does not fit the
/// variable's declared data type.
pub fn simulate_json(
    runner: &SimulationRunner,
    name: &str,
    inputs: &Map<String, Value>,
) -> Result<ModuleSimulation, SscError> {
    runner.run(name, |module, data| {
        let variables = module.variables()?;
        for var in variables.iter().filter(|v| v.var_type.is_input()) {
            if let Some(value) = inputs.get(&var.name).filter(|v| !v.is_null()) {
                write_value(data, var, value)?;
            }
        }

        let mut recorder = MessageRecorder::default();
        module.execute_with_handler(data, &mut recorder)?;

        let mut outputs = BTreeMap::new();
        for var in variables.iter().filter(|v| v.var_type.is_output()) {
            if let Some(value) = read_value(data, var)? {
                outputs.insert(var.name.clone(), value);
            }
        }

        Ok(ModuleSimulation {
            module: module.info().clone(),
            messages: recorder.messages,
            inputs: inputs.clone(),
            outputs,
        })
    })
}

fn write_value(data: &mut DataContainer, var: &Variable, value: &Value) -> Result<(), SscError> {
    let name = var.name.as_str();
    match var.data_type {
        DataType::Number => {
            data.set_number(name, number(name, value)?)?;
        }
        DataType::String => {
            let text = value
                .as_str()
                .ok_or_else(|| SscError::invalid(name, "expected a string"))?;
            data.set_string(name, text)?;
        }
        DataType::Array => {
            data.set_array(name, &numbers(name, value)?)?;
        }
        DataType::Matrix => {
            let rows = value
                .as_array()
                .ok_or_else(|| SscError::invalid(name, "expected an array of rows"))?
                .iter()
                .map(|row| numbers(name, row))
                .collect::<Result<Vec<_>, _>>()?;
            data.set_matrix(name, &rows)?;
        }
        DataType::Table | DataType::Invalid => {}
    }
    Ok(())
}

fn read_value(data: &DataContainer, var: &Variable) -> Result<Option<Value>, SscError> {
    let name = var.name.as_str();
    let value = match var.data_type {
        DataType::Number => data.get_number(name)?.map(|v| json!(v)),
        DataType::String => data.get_string(name)?.map(Value::String),
        DataType::Array => data.get_array(name)?.map(|v| json!(v)),
        DataType::Matrix => data.get_matrix(name)?.map(|v| json!(v)),
        DataType::Table | DataType::Invalid => None,
    };
    Ok(value)
}

fn number(name: &str, value: &Value) -> Result<f32, SscError> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| SscError::invalid(name, "expected a number"))
}

fn numbers(name: &str, value: &Value) -> Result<Vec<f32>, SscError> {
    value
        .as_array()
        .ok_or_else(|| SscError::invalid(name, "expected an array of numbers"))?
        .iter()
        .map(|v| number(name, v))
        .collect()
}
