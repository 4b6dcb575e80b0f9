//! Output buffer layout and the buffers handed back to callers.
//!
//! [`OutputBufferBuilder`] is pure arithmetic: given the requested count, the
//! reader kind and the element size it decides how many elements to allocate,
//! where each port's samples go, and the shape and byte strides of the result.
//!
//! | Reader kind | allocation | shape | strides (bytes) |
//! |---|---|---|---|
//! | plain | `count` | `(count,)` | `(e,)` |
//! | block of `B` | `count * B` | `(count, B)` | `(e * B, e)` |
//! | multi over `P` ports | `P * count` | `(P, count)` | `(e * count, e)` |
//!
//! A block or port count of one collapses to the plain layout. For the multi
//! layout the row stride is fixed by the *requested* count, so a partial read
//! leaves each port's run in place and only the column extent shrinks.

use crate::error::{ReaderError, ReaderResult};
use crate::sample::{Sample, SampleBuffer};
use crate::sample_type::SampleType;

/// Which reader produced a buffer, as far as layout is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// One sample per logical element.
    Plain,
    /// `block_size` consecutive samples per logical element.
    Block {
        /// Samples per block.
        block_size: usize,
    },
    /// One contiguous run per port.
    Multi {
        /// Number of ports.
        ports: usize,
    },
}

impl LayoutKind {
    /// Block size used for allocation: `B` for blocks, `P` for multi, else 1.
    pub fn block_size(&self) -> usize {
        match *self {
            LayoutKind::Plain => 1,
            LayoutKind::Block { block_size } => block_size,
            LayoutKind::Multi { ports } => ports,
        }
    }

    /// Number of destinations (ports) the buffer is split into.
    pub fn destinations(&self) -> usize {
        match *self {
            LayoutKind::Multi { ports } => ports,
            _ => 1,
        }
    }
}

/// One port's slot in an output buffer: `len` elements starting at `offset`,
/// `stride` elements apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    /// First element index.
    pub offset: usize,
    /// Distance between consecutive elements.
    pub stride: usize,
    /// Number of elements.
    pub len: usize,
}

impl Destination {
    /// One past the last element touched.
    fn end(&self) -> usize {
        if self.len == 0 {
            self.offset
        } else {
            self.offset + (self.len - 1) * self.stride + 1
        }
    }
}

/// Allocation plan for one read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLayout {
    kind: LayoutKind,
    count: usize,
    element_count: usize,
}

impl BufferLayout {
    /// Layout requested for.
    pub fn kind(&self) -> LayoutKind {
        self.kind
    }

    /// Requested logical count.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Elements to allocate.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Samples each destination must receive to complete the request.
    pub fn per_destination(&self) -> usize {
        match self.kind {
            LayoutKind::Multi { .. } => self.count,
            other => self.count * other.block_size(),
        }
    }

    /// Where each port's samples are written.
    pub fn destinations(&self) -> Vec<Destination> {
        let per = self.per_destination();
        (0..self.kind.destinations())
            .map(|i| Destination {
                offset: i * per,
                stride: 1,
                len: per,
            })
            .collect()
    }

    /// Shape of a result holding `returned` logical samples.
    pub fn shape(&self, returned: usize) -> Vec<usize> {
        match self.kind {
            LayoutKind::Block { block_size } if block_size > 1 => vec![returned, block_size],
            LayoutKind::Multi { ports } if ports > 1 => vec![ports, returned],
            _ => vec![returned],
        }
    }

    /// Byte strides of the result; independent of how many samples were returned.
    pub fn strides(&self, element_size: usize) -> Vec<usize> {
        match self.kind {
            LayoutKind::Block { block_size } if block_size > 1 => {
                vec![element_size * block_size, element_size]
            }
            LayoutKind::Multi { ports } if ports > 1 => {
                vec![element_size * self.count, element_size]
            }
            _ => vec![element_size],
        }
    }

    /// Elements of the allocation that hold returned data, for truncation.
    ///
    /// Multi layouts keep the full allocation because rows are `count` apart.
    pub fn retained_elements(&self, returned: usize) -> usize {
        match self.kind {
            _ if returned == 0 => 0,
            LayoutKind::Multi { ports } if ports > 1 => self.element_count,
            other => returned * other.block_size(),
        }
    }
}

/// Pure layout computations.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputBufferBuilder;

impl OutputBufferBuilder {
    /// Plan the allocation for `count` logical samples.
    pub fn layout(count: usize, kind: LayoutKind) -> BufferLayout {
        BufferLayout {
            kind,
            count,
            element_count: count * kind.block_size(),
        }
    }

    /// `(element_count, shape, strides)` for a full read of `count` samples.
    pub fn compute_layout(
        count: usize,
        kind: LayoutKind,
        element_size: usize,
    ) -> (usize, Vec<usize>, Vec<usize>) {
        let layout = Self::layout(count, kind);
        (
            layout.element_count(),
            layout.shape(count),
            layout.strides(element_size),
        )
    }

    /// Split `buffer` into one mutable run per destination.
    ///
    /// Destinations must be contiguous (`stride == 1`), ordered, non-overlapping
    /// and inside the buffer; anything else is rejected before a single element
    /// is written.
    pub fn split<'a, T>(
        buffer: &'a mut [T],
        destinations: &[Destination],
    ) -> ReaderResult<Vec<&'a mut [T]>> {
        let mut cursor = 0;
        for dest in destinations {
            if dest.stride != 1 && dest.len > 1 {
                return Err(ReaderError::InvalidParameter(format!(
                    "destination stride {} is not contiguous",
                    dest.stride
                )));
            }
            if dest.offset < cursor || dest.end() > buffer.len() {
                return Err(ReaderError::InvalidParameter(format!(
                    "destination {}..{} does not fit a buffer of {} elements",
                    dest.offset,
                    dest.end(),
                    buffer.len()
                )));
            }
            cursor = dest.end();
        }

        let mut runs = Vec::with_capacity(destinations.len());
        let mut rest = buffer;
        let mut consumed = 0;
        for dest in destinations {
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(dest.offset - consumed);
            let (run, tail) = tail.split_at_mut(dest.len);
            runs.push(run);
            rest = tail;
            consumed = dest.offset + dest.len;
        }
        Ok(runs)
    }
}

/// Typed, shaped result of a read.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBuffer {
    data: Option<SampleBuffer>,
    shape: Vec<usize>,
    strides: Vec<usize>,
    datetime: bool,
}

impl OutputBuffer {
    /// Buffer with no typed storage, as returned for zero-count reads.
    pub fn empty() -> Self {
        Self {
            data: None,
            shape: vec![0],
            strides: Vec::new(),
            datetime: false,
        }
    }

    pub(crate) fn new(data: SampleBuffer, shape: Vec<usize>, strides: Vec<usize>) -> Self {
        Self {
            data: Some(data),
            shape,
            strides,
            datetime: false,
        }
    }

    pub(crate) fn tagged_datetime(mut self) -> Self {
        self.datetime = true;
        self
    }

    /// Element type, `None` for an untyped empty buffer.
    pub fn sample_type(&self) -> Option<SampleType> {
        self.data.as_ref().map(SampleBuffer::sample_type)
    }

    /// Logical shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Byte strides per dimension.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Number of logical elements (product of the shape).
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// `true` when the shape holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` for wall-clock domain buffers.
    pub fn is_datetime(&self) -> bool {
        self.datetime
    }

    /// NumPy-style dtype string.
    pub fn dtype(&self) -> &'static str {
        if self.datetime {
            return "datetime64[ns]";
        }
        match self.sample_type() {
            Some(SampleType::Float32) => "float32",
            Some(SampleType::Float64) => "float64",
            Some(SampleType::UInt8) => "uint8",
            Some(SampleType::Int8) => "int8",
            Some(SampleType::UInt16) => "uint16",
            Some(SampleType::Int16) => "int16",
            Some(SampleType::UInt32) => "uint32",
            Some(SampleType::Int32) => "int32",
            Some(SampleType::UInt64) => "uint64",
            Some(SampleType::Int64) => "int64",
            _ => "float64",
        }
    }

    /// Backing storage, including any slack of a partial multi read.
    pub fn as_slice<T: Sample>(&self) -> Option<&[T]> {
        self.data.as_ref().and_then(T::slice)
    }

    /// Element at a multi-dimensional index, resolved through the strides.
    pub fn get<T: Sample>(&self, index: &[usize]) -> Option<T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let element_size = std::mem::size_of::<T>();
        let mut byte_offset = 0;
        for ((&i, &extent), &stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            if i >= extent {
                return None;
            }
            byte_offset += i * stride;
        }
        self.as_slice::<T>()?.get(byte_offset / element_size).copied()
    }

    /// Samples of one row of a 2-D buffer (a block, or one port's run).
    pub fn row<T: Sample>(&self, row: usize) -> Option<&[T]> {
        if self.shape.len() != 2 || row >= self.shape[0] {
            return None;
        }
        let element_size = std::mem::size_of::<T>();
        let start = row * self.strides[0] / element_size;
        self.as_slice::<T>()?.get(start..start + self.shape[1])
    }

    /// Logical samples in row-major order, skipping slack.
    pub fn to_vec<T: Sample>(&self) -> Vec<T> {
        match self.shape.len() {
            2 => (0..self.shape[0])
                .filter_map(|r| self.row::<T>(r))
                .flat_map(|r| r.iter().copied())
                .collect(),
            _ => self
                .as_slice::<T>()
                .map(|s| s[..self.len().min(s.len())].to_vec())
                .unwrap_or_default(),
        }
    }

    /// Take the storage out.
    pub fn into_data(self) -> Option<SampleBuffer> {
        self.data
    }
}
