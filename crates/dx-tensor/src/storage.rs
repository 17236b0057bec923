use std::borrow::Cow;

use half::f16;

use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// Host-side tensor storage.
///
/// One variant per element type a session can consume or produce. Cloning a
/// storage copies its buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    /// 32-bit floating point storage.
    F32(Vec<f32>),
    /// 16-bit floating point storage.
    F16(Vec<f16>),
    /// 64-bit integer storage.
    I64(Vec<i64>),
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F16(v) => v.len(),
            CpuStorage::I64(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create an empty storage of the given dtype.
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::F32 => CpuStorage::F32(Vec::new()),
            DType::F16 => CpuStorage::F16(Vec::new()),
            DType::I64 => CpuStorage::I64(Vec::new()),
        }
    }

    /// Returns the data as an f32 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F32.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match self {
            CpuStorage::F32(v) => Ok(v.as_slice()),
            other => Err(mismatch(DType::F32, other.dtype())),
        }
    }

    /// Returns the data as an i64 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not I64.
    pub fn as_i64_slice(&self) -> Result<&[i64]> {
        match self {
            CpuStorage::I64(v) => Ok(v.as_slice()),
            other => Err(mismatch(DType::I64, other.dtype())),
        }
    }

    /// Returns floating point data widened to f32.
    ///
    /// F32 storage is borrowed; F16 storage is converted into a new buffer.
    ///
    /// # Errors
    /// Returns an error for integer storage.
    pub fn to_f32(&self) -> Result<Cow<'_, [f32]>> {
        match self {
            CpuStorage::F32(v) => Ok(Cow::Borrowed(v.as_slice())),
            CpuStorage::F16(v) => Ok(Cow::Owned(v.iter().map(|x| x.to_f32()).collect())),
            CpuStorage::I64(_) => Err(TensorError::UnsupportedDType(
                "i64 storage cannot be read as f32".to_string(),
            )),
        }
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F16(_) => DType::F16,
            CpuStorage::I64(_) => DType::I64,
        }
    }
}

fn mismatch(expected: DType, got: DType) -> TensorError {
    TensorError::DTypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}
