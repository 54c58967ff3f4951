//! Owning wrapper around an engine data object.

use std::ffi::CString;
use std::sync::Arc;

use super::{Handle, SscApi, SscError};

/// A value accepted by [`DataContainer::set_number`].
///
/// The engine stores single-precision numbers. Wider types are converted
/// with an explicit `as f32`, so precision loss only happens where a caller
/// chose to pass a wider type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SscNumber(pub f32);

impl From<f32> for SscNumber {
    fn from(value: f32) -> Self {
        Self(value)
    }
}

impl From<f64> for SscNumber {
    fn from(value: f64) -> Self {
        Self(value as f32)
    }
}

impl From<i32> for SscNumber {
    fn from(value: i32) -> Self {
        Self(value as f32)
    }
}

impl From<i64> for SscNumber {
    fn from(value: i64) -> Self {
        Self(value as f32)
    }
}

impl From<u32> for SscNumber {
    fn from(value: u32) -> Self {
        Self(value as f32)
    }
}

/// Position of element `(i, j)` in a row-major buffer with `cols` columns.
pub fn flat_index(i: usize, j: usize, cols: usize) -> usize {
    i * cols + j
}

/// Typed key/value store passed to a module for execution.
///
/// Owns exactly one engine data handle. The handle is freed by
/// [`release`](Self::release) or on drop, whichever comes first; every other
/// operation after that fails with [`SscError::Released`].
pub struct DataContainer {
    api: Arc<dyn SscApi>,
    handle: Handle,
    released: bool,
}

impl DataContainer {
    /// Allocates a fresh engine data object.
    ///
    /// # Errors
    ///
    /// Returns [`SscError::AllocationFailed`] if the engine returns null.
    pub fn new(api: Arc<dyn SscApi>) -> Result<Self, SscError> {
        let handle = api.data_create().ok_or(SscError::AllocationFailed)?;
        Ok(Self {
            api,
            handle,
            released: false,
        })
    }

    /// The live engine handle, for passing to a module.
    pub(crate) fn handle(&self) -> Result<Handle, SscError> {
        if self.released {
            return Err(SscError::Released("data container"));
        }
        Ok(self.handle)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Sets a numeric value.
    pub fn set_number(
        &mut self,
        name: &str,
        value: impl Into<SscNumber>,
    ) -> Result<&mut Self, SscError> {
        let handle = self.handle()?;
        let key = c_name(name)?;
        self.api.data_set_number(handle, &key, value.into().0);
        Ok(self)
    }

    /// Sets a string value.
    ///
    /// # Errors
    ///
    /// Returns [`SscError::InvalidArgument`] if `value` contains a NUL byte.
    pub fn set_string(&mut self, name: &str, value: &str) -> Result<&mut Self, SscError> {
        let handle = self.handle()?;
        let key = c_name(name)?;
        let value = CString::new(value).map_err(|_| SscError::invalid(name, "contains a NUL byte"))?;
        self.api.data_set_string(handle, &key, &value);
        Ok(self)
    }

    /// Sets a one-dimensional array.
    ///
    /// # Errors
    ///
    /// Returns [`SscError::InvalidArgument`] if `values` is empty.
    pub fn set_array(&mut self, name: &str, values: &[f32]) -> Result<&mut Self, SscError> {
        let handle = self.handle()?;
        if values.is_empty() {
            return Err(SscError::invalid(name, "the length of the array must be >= 1"));
        }
        let key = c_name(name)?;
        self.api.data_set_array(handle, &key, values);
        Ok(self)
    }

    /// Sets a matrix given as rows, flattening it row-major.
    ///
    /// # Errors
    ///
    /// Returns [`SscError::InvalidArgument`] if there are zero rows, zero
    /// columns, or rows of differing length.
    pub fn set_matrix<R: AsRef<[f32]>>(
        &mut self,
        name: &str,
        rows: &[R],
    ) -> Result<&mut Self, SscError> {
        let handle = self.handle()?;
        let (flat, n_rows, n_cols) = flatten(name, rows)?;
        let key = c_name(name)?;
        self.api.data_set_matrix(handle, &key, &flat, n_rows, n_cols);
        Ok(self)
    }

    /// Reads a numeric value; `None` if the engine has no such number.
    pub fn get_number(&self, name: &str) -> Result<Option<f32>, SscError> {
        let handle = self.handle()?;
        Ok(self.api.data_get_number(handle, &c_name(name)?))
    }

    pub fn get_string(&self, name: &str) -> Result<Option<String>, SscError> {
        let handle = self.handle()?;
        Ok(self.api.data_get_string(handle, &c_name(name)?))
    }

    pub fn get_array(&self, name: &str) -> Result<Option<Vec<f32>>, SscError> {
        let handle = self.handle()?;
        Ok(self.api.data_get_array(handle, &c_name(name)?))
    }

    /// Reads a matrix, re-expanding the engine's flat buffer into rows.
    pub fn get_matrix(&self, name: &str) -> Result<Option<Vec<Vec<f32>>>, SscError> {
        let handle = self.handle()?;
        let Some(raw) = self.api.data_get_matrix(handle, &c_name(name)?) else {
            return Ok(None);
        };
        if raw.values.len() < raw.rows * raw.cols {
            return Err(SscError::invalid(
                name,
                format!(
                    "engine reported {}x{} but returned {} values",
                    raw.rows,
                    raw.cols,
                    raw.values.len()
                ),
            ));
        }
        let matrix = (0..raw.rows)
            .map(|i| {
                (0..raw.cols)
                    .map(|j| raw.values[flat_index(i, j, raw.cols)])
                    .collect()
            })
            .collect();
        Ok(Some(matrix))
    }

    /// Frees the engine handle. Calling this more than once is a no-op.
    pub fn release(&mut self) {
        if !self.released {
            self.api.data_free(self.handle);
            self.released = true;
        }
    }
}

impl Drop for DataContainer {
    fn drop(&mut self) {
        self.release();
    }
}

fn c_name(name: &str) -> Result<CString, SscError> {
    CString::new(name).map_err(|_| SscError::invalid(name, "variable name contains a NUL byte"))
}

fn flatten<R: AsRef<[f32]>>(name: &str, rows: &[R]) -> Result<(Vec<f32>, usize, usize), SscError> {
    let n_rows = rows.len();
    if n_rows == 0 {
        return Err(SscError::invalid(name, "the number of rows must be >= 1"));
    }
    let n_cols = rows[0].as_ref().len();
    if n_cols == 0 {
        return Err(SscError::invalid(name, "the number of columns must be >= 1"));
    }

    let mut flat = vec![0.0; n_rows * n_cols];
    for (i, row) in rows.iter().enumerate() {
        let row = row.as_ref();
        if row.len() != n_cols {
            return Err(SscError::invalid(
                name,
                format!("row {i} has {} columns, expected {n_cols}", row.len()),
            ));
        }
        for (j, value) in row.iter().enumerate() {
            flat[flat_index(i, j, n_cols)] = *value;
        }
    }
    Ok((flat, n_rows, n_cols))
}
