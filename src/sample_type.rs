//! Sample type enumeration and the readable-type registry.
//!
//! [`SampleType`] is closed: it lists every representation a channel may declare,
//! including those that exist in the acquisition model but cannot be materialized
//! into a numeric output buffer (complex, binary, string, range). The
//! [`SampleTypeRegistry`] is the single place that decides which ones are readable.

use crate::error::{ReaderError, ReaderResult, StreamKind, UnsupportedTypeError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Wire representation of a channel's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleType {
    /// Unset sentinel. Valid only as a configuration default.
    #[default]
    Invalid,
    /// Declared but unknown.
    Undefined,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// `u8`
    UInt8,
    /// `i8`
    Int8,
    /// `u16`
    UInt16,
    /// `i16`
    Int16,
    /// `u32`
    UInt32,
    /// `i32`
    Int32,
    /// `u64`
    UInt64,
    /// `i64`
    Int64,
    /// Pair of `i64` (start, end).
    RangeInt64,
    /// Pair of `f32` (re, im).
    ComplexFloat32,
    /// Pair of `f64` (re, im).
    ComplexFloat64,
    /// Opaque bytes.
    Binary,
    /// UTF-8 text.
    String,
}

impl SampleType {
    /// Every variant, in declaration order.
    pub const ALL: [SampleType; 17] = [
        SampleType::Invalid,
        SampleType::Undefined,
        SampleType::Float32,
        SampleType::Float64,
        SampleType::UInt8,
        SampleType::Int8,
        SampleType::UInt16,
        SampleType::Int16,
        SampleType::UInt32,
        SampleType::Int32,
        SampleType::UInt64,
        SampleType::Int64,
        SampleType::RangeInt64,
        SampleType::ComplexFloat32,
        SampleType::ComplexFloat64,
        SampleType::Binary,
        SampleType::String,
    ];

    /// The ten numeric types a reader can materialize.
    pub const READABLE: [SampleType; 10] = [
        SampleType::Float32,
        SampleType::Float64,
        SampleType::UInt32,
        SampleType::Int32,
        SampleType::UInt64,
        SampleType::Int64,
        SampleType::UInt8,
        SampleType::Int8,
        SampleType::UInt16,
        SampleType::Int16,
    ];

    /// Canonical name, as used in error messages and settings files.
    pub fn name(self) -> &'static str {
        match self {
            SampleType::Invalid => "Invalid",
            SampleType::Undefined => "Undefined",
            SampleType::Float32 => "Float32",
            SampleType::Float64 => "Float64",
            SampleType::UInt8 => "UInt8",
            SampleType::Int8 => "Int8",
            SampleType::UInt16 => "UInt16",
            SampleType::Int16 => "Int16",
            SampleType::UInt32 => "UInt32",
            SampleType::Int32 => "Int32",
            SampleType::UInt64 => "UInt64",
            SampleType::Int64 => "Int64",
            SampleType::RangeInt64 => "RangeInt64",
            SampleType::ComplexFloat32 => "ComplexFloat32",
            SampleType::ComplexFloat64 => "ComplexFloat64",
            SampleType::Binary => "Binary",
            SampleType::String => "String",
        }
    }

    /// Size of one element in bytes, or `None` for variable-size / unset types.
    pub fn element_size(self) -> Option<usize> {
        match self {
            SampleType::UInt8 | SampleType::Int8 => Some(1),
            SampleType::UInt16 | SampleType::Int16 => Some(2),
            SampleType::Float32 | SampleType::UInt32 | SampleType::Int32 => Some(4),
            SampleType::Float64 | SampleType::UInt64 | SampleType::Int64 => Some(8),
            SampleType::ComplexFloat32 => Some(8),
            SampleType::RangeInt64 | SampleType::ComplexFloat64 => Some(16),
            SampleType::Invalid
            | SampleType::Undefined
            | SampleType::Binary
            | SampleType::String => None,
        }
    }

    /// `true` for the unset sentinel.
    pub fn is_unset(self) -> bool {
        self == SampleType::Invalid
    }
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleType {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SampleType::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ReaderError::InvalidParameter(format!("Unknown sample type '{}'", s)))
    }
}

/// Lookup table over [`SampleType`] deciding readability.
///
/// All checks are pure matches over the closed enumeration; nothing allocates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleTypeRegistry;

impl SampleTypeRegistry {
    /// `true` when a reader can materialize `sample_type` into a buffer.
    pub fn is_readable(sample_type: SampleType) -> bool {
        matches!(
            sample_type,
            SampleType::Float32
                | SampleType::Float64
                | SampleType::UInt32
                | SampleType::Int32
                | SampleType::UInt64
                | SampleType::Int64
                | SampleType::UInt8
                | SampleType::Int8
                | SampleType::UInt16
                | SampleType::Int16
        )
    }

    /// Read-time validation. The unset sentinel is rejected here.
    pub fn validate(
        sample_type: SampleType,
        stream: StreamKind,
    ) -> Result<(), UnsupportedTypeError> {
        if Self::is_readable(sample_type) {
            Ok(())
        } else {
            Err(UnsupportedTypeError::new(sample_type, stream))
        }
    }

    /// Setup-time validation of a configured value/domain type pair.
    ///
    /// `Invalid` is accepted for either slot as "no type configured yet".
    pub fn check_types(value_type: SampleType, domain_type: SampleType) -> ReaderResult<()> {
        Self::check_configured(value_type)?;
        Self::check_configured(domain_type)
    }

    fn check_configured(sample_type: SampleType) -> ReaderResult<()> {
        if sample_type.is_unset() || Self::is_readable(sample_type) {
            Ok(())
        } else {
            Err(ReaderError::Configuration(format!(
                "Unsupported sample type: {}",
                sample_type
            )))
        }
    }
}
