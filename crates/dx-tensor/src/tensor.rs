use std::borrow::Cow;

use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// Where a session placed (or should place) a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Location {
    /// Ordinary host memory.
    #[default]
    Cpu,
    /// A buffer resident on the GPU device; must be released when replaced.
    GpuBuffer,
}

/// A named-slot tensor value passed to or returned from an inference session.
///
/// The tensor exclusively owns its storage. `Clone` copies the buffer, so two
/// clones never share device memory and may be disposed independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
    location: Location,
}

impl Tensor {
    /// Create a tensor from storage and a shape.
    ///
    /// # Errors
    /// Returns an error if the storage length does not match `shape.numel()`.
    pub fn new(storage: CpuStorage, shape: Shape) -> Result<Self> {
        if storage.len() != shape.numel() {
            return Err(TensorError::LengthMismatch {
                len: storage.len(),
                dims: shape.dims().to_vec(),
                numel: shape.numel(),
            });
        }
        Ok(Tensor {
            storage,
            shape,
            location: Location::Cpu,
        })
    }

    /// Create an f32 tensor.
    pub fn from_f32(data: Vec<f32>, shape: Shape) -> Result<Self> {
        Self::new(CpuStorage::F32(data), shape)
    }

    /// Create a zero-element tensor, e.g. an empty key/value cache of shape
    /// `[1, heads, 0, head_dim]`.
    ///
    /// # Errors
    /// Returns an error if the shape has elements.
    pub fn empty(dtype: DType, shape: Shape) -> Result<Self> {
        Self::new(CpuStorage::empty(dtype), shape)
    }

    /// Token ids as an `int64 [1, len]` row.
    pub fn token_row(tokens: &[u32]) -> Self {
        let data: Vec<i64> = tokens.iter().map(|&t| i64::from(t)).collect();
        let len = data.len();
        Tensor {
            storage: CpuStorage::I64(data),
            shape: Shape::new(vec![1, len]),
            location: Location::Cpu,
        }
    }

    /// An all-ones `int64 [1, len]` attention mask.
    pub fn ones_row(len: usize) -> Self {
        Tensor {
            storage: CpuStorage::I64(vec![1; len]),
            shape: Shape::new(vec![1, len]),
            location: Location::Cpu,
        }
    }

    /// Positions `0..len` as an `int64 [1, len]` row.
    pub fn arange_row(len: usize) -> Self {
        Tensor {
            storage: CpuStorage::I64((0..len as i64).collect()),
            shape: Shape::new(vec![1, len]),
            location: Location::Cpu,
        }
    }

    /// Returns the same tensor tagged with a placement.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the dimension sizes.
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Returns where the tensor lives.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }

    /// Returns the data as an f32 slice.
    pub fn data_f32(&self) -> Result<&[f32]> {
        self.storage.as_f32_slice()
    }

    /// Returns the data as an i64 slice.
    pub fn data_i64(&self) -> Result<&[i64]> {
        self.storage.as_i64_slice()
    }

    /// Returns floating point data as f32, converting from f16 if needed.
    pub fn to_f32(&self) -> Result<Cow<'_, [f32]>> {
        self.storage.to_f32()
    }

    /// Release the tensor.
    ///
    /// Consumes the tensor so no handle to it can remain. Device-resident
    /// buffers are freed here; host tensors are simply dropped.
    pub fn dispose(self) {
        if self.location == Location::GpuBuffer {
            tracing::trace!(dims = %self.shape, dtype = %self.dtype(), "releasing gpu buffer");
        }
        drop(self);
    }
}
