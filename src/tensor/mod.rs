//! Tensor byte-size bookkeeping
//!
//! The planner only deals in byte counts. This module is the small piece of
//! caller-side plumbing that turns a shape and element type into the size
//! passed to `alloc`/`free`.

use std::fmt;

use crate::error::{PlanError, PlanResult};

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Float32,
    Float16,
    BFloat16,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    Bool,
}

impl DataType {
    /// Width of one element in bytes
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Float64 | DataType::Int64 => 8,
            DataType::Float32 | DataType::Int32 => 4,
            DataType::Float16 | DataType::BFloat16 | DataType::Int16 => 2,
            DataType::Int8 | DataType::UInt8 | DataType::Bool => 1,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Float32 => "f32",
            DataType::Float16 => "f16",
            DataType::BFloat16 => "bf16",
            DataType::Float64 => "f64",
            DataType::Int8 => "i8",
            DataType::Int16 => "i16",
            DataType::Int32 => "i32",
            DataType::Int64 => "i64",
            DataType::UInt8 => "u8",
            DataType::Bool => "bool",
        };
        write!(f, "{}", name)
    }
}

/// Shape and element type of a tensor buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDesc {
    dims: Vec<usize>,
    dtype: DataType,
}

impl TensorDesc {
    pub fn new(dims: &[usize], dtype: DataType) -> Self {
        Self {
            dims: dims.to_vec(),
            dtype,
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Number of elements; a scalar (no dims) has one
    pub fn element_count(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Buffer size in bytes
    ///
    /// # Errors
    /// - `InvalidSize` if the element count times the element width overflows
    pub fn bytes(&self) -> PlanResult<usize> {
        self.element_count()
            .and_then(|count| count.checked_mul(self.dtype.size_in_bytes()))
            .ok_or(PlanError::InvalidSize(usize::MAX))
    }
}

impl fmt::Display for TensorDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.dims, self.dtype)
    }
}
