//! Numeric sample primitives and packet payload storage.
//!
//! [`Sample`] is implemented for exactly the ten primitives that map onto a
//! readable [`SampleType`]. [`SampleBuffer`] is the payload a producer attaches to
//! a data packet; like `PixelBuffer` in daq-core it keeps the native width instead
//! of widening everything to `f64`.

use crate::sample_type::SampleType;
use bytes::Bytes;
use num_traits::{NumCast, ToPrimitive};

/// A primitive that can be stored in, and read out of, a typed buffer.
pub trait Sample:
    Copy + Default + PartialEq + NumCast + ToPrimitive + Send + Sync + std::fmt::Debug + 'static
{
    /// Matching sample type tag.
    const SAMPLE_TYPE: SampleType;

    /// Wrap a vector in the matching [`SampleBuffer`] variant.
    fn into_buffer(values: Vec<Self>) -> SampleBuffer;

    /// Borrow the samples if `buffer` holds this primitive.
    fn slice(buffer: &SampleBuffer) -> Option<&[Self]>;

    /// Mutably borrow the samples if `buffer` holds this primitive.
    fn slice_mut(buffer: &mut SampleBuffer) -> Option<&mut [Self]>;

    /// Numeric conversion from any other primitive.
    ///
    /// Values the target cannot represent (overflow, NaN into an integer) become zero.
    #[inline]
    fn cast_from<S: ToPrimitive>(source: S) -> Self {
        <Self as NumCast>::from(source).unwrap_or_default()
    }
}

macro_rules! impl_sample {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Sample for $ty {
                const SAMPLE_TYPE: SampleType = SampleType::$variant;

                fn into_buffer(values: Vec<Self>) -> SampleBuffer {
                    SampleBuffer::$variant(values)
                }

                fn slice(buffer: &SampleBuffer) -> Option<&[Self]> {
                    match buffer {
                        SampleBuffer::$variant(v) => Some(v.as_slice()),
                        _ => None,
                    }
                }

                fn slice_mut(buffer: &mut SampleBuffer) -> Option<&mut [Self]> {
                    match buffer {
                        SampleBuffer::$variant(v) => Some(v.as_mut_slice()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_sample!(
    f32 => Float32,
    f64 => Float64,
    u8 => UInt8,
    i8 => Int8,
    u16 => UInt16,
    i16 => Int16,
    u32 => UInt32,
    i32 => Int32,
    u64 => UInt64,
    i64 => Int64,
);

/// Owned sample storage, one variant per representation.
///
/// Non-numeric payloads (complex, binary, string, range) travel as `Raw` bytes;
/// they can be queued and counted but never converted.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    /// `f32` samples
    Float32(Vec<f32>),
    /// `f64` samples
    Float64(Vec<f64>),
    /// `u8` samples
    UInt8(Vec<u8>),
    /// `i8` samples
    Int8(Vec<i8>),
    /// `u16` samples
    UInt16(Vec<u16>),
    /// `i16` samples
    Int16(Vec<i16>),
    /// `u32` samples
    UInt32(Vec<u32>),
    /// `i32` samples
    Int32(Vec<i32>),
    /// `u64` samples
    UInt64(Vec<u64>),
    /// `i64` samples
    Int64(Vec<i64>),
    /// Opaque payload of a non-numeric type.
    Raw {
        /// Declared representation.
        sample_type: SampleType,
        /// Number of logical samples in `bytes`.
        sample_count: usize,
        /// Packed sample bytes.
        bytes: Bytes,
    },
}

/// Expand `$body` once per numeric variant with `$v` bound to the inner `Vec`.
macro_rules! for_each_numeric {
    ($buffer:expr, $v:ident => $body:expr, raw => $raw:expr) => {
        match $buffer {
            SampleBuffer::Float32($v) => $body,
            SampleBuffer::Float64($v) => $body,
            SampleBuffer::UInt8($v) => $body,
            SampleBuffer::Int8($v) => $body,
            SampleBuffer::UInt16($v) => $body,
            SampleBuffer::Int16($v) => $body,
            SampleBuffer::UInt32($v) => $body,
            SampleBuffer::Int32($v) => $body,
            SampleBuffer::UInt64($v) => $body,
            SampleBuffer::Int64($v) => $body,
            SampleBuffer::Raw { .. } => $raw,
        }
    };
}

impl SampleBuffer {
    /// Build from a typed vector.
    pub fn from_vec<T: Sample>(values: Vec<T>) -> Self {
        T::into_buffer(values)
    }

    /// Representation of the stored samples.
    pub fn sample_type(&self) -> SampleType {
        match self {
            SampleBuffer::Float32(_) => SampleType::Float32,
            SampleBuffer::Float64(_) => SampleType::Float64,
            SampleBuffer::UInt8(_) => SampleType::UInt8,
            SampleBuffer::Int8(_) => SampleType::Int8,
            SampleBuffer::UInt16(_) => SampleType::UInt16,
            SampleBuffer::Int16(_) => SampleType::Int16,
            SampleBuffer::UInt32(_) => SampleType::UInt32,
            SampleBuffer::Int32(_) => SampleType::Int32,
            SampleBuffer::UInt64(_) => SampleType::UInt64,
            SampleBuffer::Int64(_) => SampleType::Int64,
            SampleBuffer::Raw { sample_type, .. } => *sample_type,
        }
    }

    /// Number of logical samples.
    pub fn len(&self) -> usize {
        for_each_numeric!(self, v => v.len(), raw => match self {
            SampleBuffer::Raw { sample_count, .. } => *sample_count,
            _ => 0,
        })
    }

    /// `true` when no samples are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` unless the payload is raw bytes.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, SampleBuffer::Raw { .. })
    }

    /// Convert `src[start..start + dest.len()]` into `dest`.
    ///
    /// Returns `false` (leaving `dest` untouched) when the payload is not numeric
    /// or the range exceeds the stored samples.
    pub(crate) fn convert_into<T: Sample>(&self, start: usize, dest: &mut [T]) -> bool {
        if let Some(native) = T::slice(self) {
            return match native.get(start..start + dest.len()) {
                Some(src) => {
                    dest.copy_from_slice(src);
                    true
                }
                None => false,
            };
        }
        for_each_numeric!(self, v => match v.get(start..start + dest.len()) {
            Some(src) => {
                for (d, s) in dest.iter_mut().zip(src) {
                    *d = T::cast_from(*s);
                }
                true
            }
            None => false,
        }, raw => false)
    }

    /// Truncate to `len` samples. Raw payloads are left untouched.
    pub(crate) fn truncate(&mut self, len: usize) {
        for_each_numeric!(self, v => v.truncate(len), raw => ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_picks_matching_variant() {
        let buf = SampleBuffer::from_vec(vec![1u16, 2, 3]);
        assert_eq!(buf.sample_type(), SampleType::UInt16);
        assert_eq!(buf.len(), 3);
        assert_eq!(u16::slice(&buf), Some(&[1u16, 2, 3][..]));
        assert!(f32::slice(&buf).is_none());
    }

    #[test]
    fn convert_same_type_copies() {
        let buf = SampleBuffer::from_vec(vec![1.5f64, 2.5, 3.5, 4.5]);
        let mut dest = [0.0f64; 2];
        assert!(buf.convert_into(1, &mut dest));
        assert_eq!(dest, [2.5, 3.5]);
    }

    #[test]
    fn convert_across_types_casts() {
        let buf = SampleBuffer::from_vec(vec![-3i32, 7, 300]);
        let mut as_f32 = [0.0f32; 3];
        assert!(buf.convert_into(0, &mut as_f32));
        assert_eq!(as_f32, [-3.0, 7.0, 300.0]);

        // -3 and 300 do not fit in u8
        let mut as_u8 = [9u8; 3];
        assert!(buf.convert_into(0, &mut as_u8));
        assert_eq!(as_u8, [0, 7, 0]);
    }

    #[test]
    fn convert_out_of_range_is_refused() {
        let buf = SampleBuffer::from_vec(vec![1i64, 2]);
        let mut dest = [0i64; 3];
        assert!(!buf.convert_into(0, &mut dest));
        assert_eq!(dest, [0, 0, 0]);
    }

    #[test]
    fn raw_payload_is_not_convertible() {
        let buf = SampleBuffer::Raw {
            sample_type: SampleType::ComplexFloat32,
            sample_count: 2,
            bytes: Bytes::from_static(&[0u8; 16]),
        };
        assert_eq!(buf.len(), 2);
        assert!(!buf.is_numeric());
        let mut dest = [0.0f32; 2];
        assert!(!buf.convert_into(0, &mut dest));
    }
}
