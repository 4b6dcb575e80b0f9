//! Runtime type dispatch.
//!
//! The active types are resolved once per call and mapped through a table to a
//! monomorphic read function. Adding a sample type means adding one arm to
//! [`value_entry`] and one to [`domain_entry`]; call sites never change.

use super::engine::{self, Fill};
use crate::buffer::{BufferLayout, LayoutKind, OutputBuffer};
use crate::domain::{DomainConverter, DomainMode};
use crate::error::{ReaderError, ReaderResult, StreamKind, UnsupportedTypeError};
use crate::port::{PortBinding, ReadNotifier};
use crate::sample::{Sample, SampleBuffer};
use crate::sample_type::{SampleType, SampleTypeRegistry};
use std::time::Instant;

/// Everything a typed read needs besides the element types.
pub(crate) struct ReadContext<'a> {
    pub ports: &'a [PortBinding],
    pub notifier: &'a ReadNotifier,
    pub layout: BufferLayout,
    pub deadline: Instant,
}

/// How the domain buffer is produced for this call.
#[derive(Debug, Clone)]
pub(crate) enum DomainTarget {
    /// Read as the resolved type.
    Native(SampleType),
    /// Read ticks as `i64` and convert per port.
    WallClock(Vec<DomainConverter>),
}

impl DomainTarget {
    /// Element type of the produced domain buffer.
    pub(crate) fn sample_type(&self) -> SampleType {
        match self {
            Self::Native(t) => *t,
            Self::WallClock(_) => SampleType::Int64,
        }
    }
}

type ValueFn = fn(&ReadContext<'_>) -> ReaderResult<(OutputBuffer, Fill)>;
type PairFn = fn(&ReadContext<'_>, &DomainTarget) -> ReaderResult<(OutputBuffer, OutputBuffer, Fill)>;

/// Resolve the type one stream is read as.
///
/// Every port's source type must be readable. A configured type (anything but the
/// `Invalid` sentinel) wins over the descriptor; otherwise the first port decides.
pub(crate) fn resolve(
    configured: SampleType,
    sources: &[SampleType],
    stream: StreamKind,
) -> Result<SampleType, UnsupportedTypeError> {
    for &source in sources {
        SampleTypeRegistry::validate(source, stream)?;
    }
    let resolved = if configured.is_unset() {
        sources.first().copied().unwrap_or(SampleType::Undefined)
    } else {
        configured
    };
    SampleTypeRegistry::validate(resolved, stream)?;
    Ok(resolved)
}

/// Resolve the domain target for `mode`.
pub(crate) fn resolve_domain(
    configured: SampleType,
    mode: DomainMode,
    ports: &[PortBinding],
) -> Result<DomainTarget, UnsupportedTypeError> {
    let descriptors: Vec<_> = ports.iter().map(|p| p.domain_descriptor()).collect();
    let sources: Vec<SampleType> = descriptors
        .iter()
        .map(|d| d.as_ref().map_or(SampleType::Undefined, |d| d.sample_type()))
        .collect();

    match mode {
        DomainMode::Native => {
            resolve(configured, &sources, StreamKind::Domain).map(DomainTarget::Native)
        }
        DomainMode::WallClock => {
            // The configured domain type is irrelevant here; output is always Int64.
            for &source in &sources {
                SampleTypeRegistry::validate(source, StreamKind::Domain)?;
            }
            let converters = descriptors
                .iter()
                .flatten()
                .map(|d| DomainConverter::for_descriptor(d))
                .collect();
            Ok(DomainTarget::WallClock(converters))
        }
    }
}

/// Table of value-only read functions.
pub(crate) fn value_entry(sample_type: SampleType) -> Option<ValueFn> {
    let entry: ValueFn = match sample_type {
        SampleType::Float32 => read_values::<f32>,
        SampleType::Float64 => read_values::<f64>,
        SampleType::UInt32 => read_values::<u32>,
        SampleType::Int32 => read_values::<i32>,
        SampleType::UInt64 => read_values::<u64>,
        SampleType::Int64 => read_values::<i64>,
        SampleType::UInt8 => read_values::<u8>,
        SampleType::Int8 => read_values::<i8>,
        SampleType::UInt16 => read_values::<u16>,
        SampleType::Int16 => read_values::<i16>,
        _ => return None,
    };
    Some(entry)
}

/// Table of value+domain read functions for a fixed value type.
fn domain_entry<T: Sample>(domain_type: SampleType) -> Option<PairFn> {
    let entry: PairFn = match domain_type {
        SampleType::Float32 => read_pair::<T, f32>,
        SampleType::Float64 => read_pair::<T, f64>,
        SampleType::UInt32 => read_pair::<T, u32>,
        SampleType::Int32 => read_pair::<T, i32>,
        SampleType::UInt64 => read_pair::<T, u64>,
        SampleType::Int64 => read_pair::<T, i64>,
        SampleType::UInt8 => read_pair::<T, u8>,
        SampleType::Int8 => read_pair::<T, i8>,
        SampleType::UInt16 => read_pair::<T, u16>,
        SampleType::Int16 => read_pair::<T, i16>,
        _ => return None,
    };
    Some(entry)
}

/// Table of value+domain read functions, keyed on both types.
pub(crate) fn pair_entry(value_type: SampleType, target: &DomainTarget) -> Option<PairFn> {
    let domain_type = target.sample_type();
    match value_type {
        SampleType::Float32 => domain_entry::<f32>(domain_type),
        SampleType::Float64 => domain_entry::<f64>(domain_type),
        SampleType::UInt32 => domain_entry::<u32>(domain_type),
        SampleType::Int32 => domain_entry::<i32>(domain_type),
        SampleType::UInt64 => domain_entry::<u64>(domain_type),
        SampleType::Int64 => domain_entry::<i64>(domain_type),
        SampleType::UInt8 => domain_entry::<u8>(domain_type),
        SampleType::Int8 => domain_entry::<i8>(domain_type),
        SampleType::UInt16 => domain_entry::<u16>(domain_type),
        SampleType::Int16 => domain_entry::<i16>(domain_type),
        _ => None,
    }
}

fn finish<T: Sample>(layout: &BufferLayout, mut data: Vec<T>, returned: usize) -> OutputBuffer {
    data.truncate(layout.retained_elements(returned));
    OutputBuffer::new(
        SampleBuffer::from_vec(data),
        layout.shape(returned),
        layout.strides(std::mem::size_of::<T>()),
    )
}

/// Allocate `len` default samples, failing instead of aborting when the
/// allocation cannot be made.
fn allocate<T: Sample>(len: usize) -> ReaderResult<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|err| {
        ReaderError::InvalidParameter(format!(
            "cannot allocate {len} {} elements: {err}",
            T::SAMPLE_TYPE
        ))
    })?;
    data.resize(len, T::default());
    Ok(data)
}

fn read_values<T: Sample>(ctx: &ReadContext<'_>) -> ReaderResult<(OutputBuffer, Fill)> {
    let mut values = allocate::<T>(ctx.layout.element_count())?;
    let fill = engine::fill::<T, T>(
        ctx.ports,
        ctx.notifier,
        &ctx.layout,
        ctx.deadline,
        &mut values,
        None,
    )?;
    Ok((finish(&ctx.layout, values, fill.samples), fill))
}

fn read_pair<T: Sample, D: Sample>(
    ctx: &ReadContext<'_>,
    target: &DomainTarget,
) -> ReaderResult<(OutputBuffer, OutputBuffer, Fill)> {
    let elements = ctx.layout.element_count();
    let mut values = allocate::<T>(elements)?;
    let mut domain = allocate::<D>(elements)?;
    let fill = engine::fill::<T, D>(
        ctx.ports,
        ctx.notifier,
        &ctx.layout,
        ctx.deadline,
        &mut values,
        Some(domain.as_mut_slice()),
    )?;

    let values = finish(&ctx.layout, values, fill.samples);
    let mut domain = finish(&ctx.layout, domain, fill.samples);

    if let DomainTarget::WallClock(converters) = target {
        domain = to_wall_clock(&ctx.layout, domain, converters, fill.samples);
    }
    Ok((values, domain, fill))
}

/// Rewrite an `i64` tick buffer into nanoseconds, one converter per port run.
fn to_wall_clock(
    layout: &BufferLayout,
    buffer: OutputBuffer,
    converters: &[DomainConverter],
    returned: usize,
) -> OutputBuffer {
    let shape = buffer.shape().to_vec();
    let strides = buffer.strides().to_vec();
    let mut data = match buffer.into_data() {
        Some(data) => data,
        None => return OutputBuffer::empty(),
    };

    if let Some(ticks) = i64::slice_mut(&mut data) {
        let runs = layout.destinations();
        let per_run = match layout.kind() {
            LayoutKind::Multi { .. } => returned,
            kind => returned * kind.block_size(),
        };
        for (run, converter) in runs.iter().zip(converters) {
            let end = (run.offset + per_run).min(ticks.len());
            if run.offset < end {
                converter.convert_in_place(&mut ticks[run.offset..end]);
            }
        }
    }

    OutputBuffer::new(data, shape, strides).tagged_datetime()
}
