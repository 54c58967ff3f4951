//! Variable names bound to a Rust value type.

use std::marker::PhantomData;

use super::{DataContainer, SscError};

/// A Rust type that can be stored in a [`DataContainer`].
pub trait VarKind: Sized {
    fn write(data: &mut DataContainer, name: &str, value: Self) -> Result<(), SscError>;
    fn read(data: &DataContainer, name: &str) -> Result<Option<Self>, SscError>;
}

impl VarKind for f32 {
    fn write(data: &mut DataContainer, name: &str, value: Self) -> Result<(), SscError> {
        data.set_number(name, value).map(drop)
    }

    fn read(data: &DataContainer, name: &str) -> Result<Option<Self>, SscError> {
        data.get_number(name)
    }
}

/// Integers travel as engine numbers and are floored on the way back.
impl VarKind for i32 {
    fn write(data: &mut DataContainer, name: &str, value: Self) -> Result<(), SscError> {
        data.set_number(name, value).map(drop)
    }

    fn read(data: &DataContainer, name: &str) -> Result<Option<Self>, SscError> {
        Ok(data.get_number(name)?.map(|v| v.floor() as i32))
    }
}

impl VarKind for String {
    fn write(data: &mut DataContainer, name: &str, value: Self) -> Result<(), SscError> {
        data.set_string(name, &value).map(drop)
    }

    fn read(data: &DataContainer, name: &str) -> Result<Option<Self>, SscError> {
        data.get_string(name)
    }
}

impl VarKind for Vec<f32> {
    fn write(data: &mut DataContainer, name: &str, value: Self) -> Result<(), SscError> {
        data.set_array(name, &value).map(drop)
    }

    fn read(data: &DataContainer, name: &str) -> Result<Option<Self>, SscError> {
        data.get_array(name)
    }
}

/// A named module variable holding values of type `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Var<T> {
    name: &'static str,
    kind: PhantomData<fn() -> T>,
}

impl<T: VarKind> Var<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            kind: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Writes `value`; `None` leaves the variable unset so the module
    /// falls back to its own default or reports it missing.
    pub fn set(&self, value: Option<T>, data: &mut DataContainer) -> Result<(), SscError> {
        match value {
            Some(value) => T::write(data, self.name, value),
            None => Ok(()),
        }
    }

    /// Reads a value the caller expects to be present.
    ///
    /// # Errors
    ///
    /// Returns [`SscError::MissingOutput`] if the engine holds no value.
    pub fn get(&self, data: &DataContainer) -> Result<T, SscError> {
        self.try_get(data)?
            .ok_or_else(|| SscError::MissingOutput(self.name.to_string()))
    }

    pub fn try_get(&self, data: &DataContainer) -> Result<Option<T>, SscError> {
        T::read(data, self.name)
    }
}
