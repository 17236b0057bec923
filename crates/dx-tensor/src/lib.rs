//! `dx-tensor` - Host-side tensor values for duplex-lm.
//!
//! This crate provides:
//! - A `Tensor` type with owned storage, a shape and a placement
//! - Data type definitions (F32, F16, I64) matching the session wire types
//! - Shape utilities
//!
//! No tensor math lives here; tensors are created by the caller as session
//! inputs or handed back by an inference session as outputs.

pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use storage::CpuStorage;
pub use tensor::{Location, Tensor};
