//! Signal readers.
//!
//! Three reader kinds share one core:
//!
//! - [`Reader`] reads one port, output shape `(count,)`.
//! - [`BlockReader`] reads one port in blocks of `B` samples, output `(count, B)`.
//! - [`MultiReader`] reads `P` ports in lock-step, output `(P, count)` with each
//!   port's run contiguous.
//!
//! The kinds differ only in the capabilities they expose through
//! [`ReadCapabilities`]; layout is derived from which capability is present and
//! all reading goes through the same dispatch table and fill engine.
//!
//! # Example
//! ```no_run
//! use daq_reader::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let signal = Signal::new(DataDescriptor::values("ai0", SampleType::Float64), None);
//! let port = InputPort::new("ai0");
//! signal.connect(&port);
//!
//! let mut reader = BlockReader::new(&port, 4)?;
//! signal.send_values(vec![0.0f64; 8]);
//!
//! let read = reader.read(2, 100)?;
//! assert_eq!(read.values.shape(), &[2, 4]);
//! # Ok(())
//! # }
//! ```

mod block;
mod dispatch;
mod engine;
mod multi;

pub use block::BlockReader;
pub use multi::MultiReader;

use crate::buffer::{LayoutKind, OutputBuffer, OutputBufferBuilder};
use crate::config::ReaderSettings;
use crate::domain::DomainMode;
use crate::error::{ReaderError, ReaderResult, StreamKind, UnsupportedTypeError};
use crate::port::{InputPort, PortBinding, ReadNotifier};
use crate::sample_type::{SampleType, SampleTypeRegistry};
use crate::status::ReaderStatus;
use dispatch::ReadContext;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Optional layout capabilities of a reader.
///
/// A plain reader exposes neither, a block reader exposes `block_size`, a
/// multi reader exposes `port_count`.
pub trait ReadCapabilities {
    /// Fixed samples per block.
    fn block_size(&self) -> Option<usize> {
        None
    }

    /// Number of ports read in lock-step.
    fn port_count(&self) -> Option<usize> {
        None
    }
}

/// Layout kind implied by a set of capabilities.
pub fn layout_kind(caps: &(impl ReadCapabilities + ?Sized)) -> LayoutKind {
    match (caps.port_count(), caps.block_size()) {
        (Some(ports), _) => LayoutKind::Multi { ports },
        (None, Some(block_size)) => LayoutKind::Block { block_size },
        (None, None) => LayoutKind::Plain,
    }
}

/// What a reader needs from its configuration object.
pub trait ReaderConfig: ReadCapabilities {
    /// Type values are read as; `Invalid` follows the port descriptor.
    fn value_read_type(&self) -> SampleType;

    /// Type the domain is read as; `Invalid` follows the port descriptor.
    fn domain_read_type(&self) -> SampleType;

    /// Ports the reader binds, in output row order.
    fn input_ports(&self) -> &[Arc<InputPort>];

    /// Native ticks or wall-clock nanoseconds.
    fn domain_mode(&self) -> DomainMode {
        DomainMode::Native
    }

    /// Timeout used by [`SignalReader::read_default`].
    fn default_timeout_ms(&self) -> u64 {
        1000
    }
}

/// Concrete [`ReaderConfig`] built by the reader constructors.
#[derive(Debug, Clone)]
pub struct PortConfig {
    ports: Vec<Arc<InputPort>>,
    block_size: Option<usize>,
    multi: bool,
    value_read_type: SampleType,
    domain_read_type: SampleType,
    domain_mode: DomainMode,
    default_timeout_ms: u64,
}

impl PortConfig {
    fn with_ports(ports: Vec<Arc<InputPort>>, block_size: Option<usize>, multi: bool) -> Self {
        Self {
            ports,
            block_size,
            multi,
            value_read_type: SampleType::Invalid,
            domain_read_type: SampleType::Invalid,
            domain_mode: DomainMode::Native,
            default_timeout_ms: 1000,
        }
    }

    /// One port, one sample per logical element.
    pub fn single(port: &Arc<InputPort>) -> Self {
        Self::with_ports(vec![Arc::clone(port)], None, false)
    }

    /// One port, `block_size` samples per logical element.
    pub fn block(port: &Arc<InputPort>, block_size: usize) -> Self {
        Self::with_ports(vec![Arc::clone(port)], Some(block_size), false)
    }

    /// Several ports read in lock-step.
    pub fn multi(ports: &[Arc<InputPort>]) -> Self {
        Self::with_ports(ports.to_vec(), None, true)
    }

    /// Read values as `sample_type`; `Invalid` follows the port descriptor.
    pub fn with_value_read_type(mut self, sample_type: SampleType) -> Self {
        self.value_read_type = sample_type;
        self
    }

    /// Read the domain as `sample_type`; `Invalid` follows the port descriptor.
    pub fn with_domain_read_type(mut self, sample_type: SampleType) -> Self {
        self.domain_read_type = sample_type;
        self
    }

    /// Native ticks or wall-clock nanoseconds.
    pub fn with_domain_mode(mut self, mode: DomainMode) -> Self {
        self.domain_mode = mode;
        self
    }

    /// Timeout used by [`SignalReader::read_default`].
    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Apply read types, domain mode and timeout from loaded settings.
    ///
    /// `settings.block_size` is only meaningful to [`BlockReader::from_settings`].
    pub fn with_settings(self, settings: &ReaderSettings) -> Self {
        self.with_value_read_type(settings.value_read_type)
            .with_domain_read_type(settings.domain_read_type)
            .with_domain_mode(settings.domain_mode)
            .with_default_timeout_ms(settings.timeout_ms)
    }
}

impl ReadCapabilities for PortConfig {
    fn block_size(&self) -> Option<usize> {
        self.block_size
    }

    fn port_count(&self) -> Option<usize> {
        self.multi.then_some(self.ports.len())
    }
}

impl ReaderConfig for PortConfig {
    fn value_read_type(&self) -> SampleType {
        self.value_read_type
    }

    fn domain_read_type(&self) -> SampleType {
        self.domain_read_type
    }

    fn input_ports(&self) -> &[Arc<InputPort>] {
        &self.ports
    }

    fn domain_mode(&self) -> DomainMode {
        self.domain_mode
    }

    fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms
    }
}

/// Result of [`SignalReader::read`].
#[derive(Debug, Clone)]
pub struct ValueRead {
    /// Samples read, shaped by the reader kind.
    pub values: OutputBuffer,
    /// How the call ended.
    pub status: ReaderStatus,
}

/// Result of [`SignalReader::read_with_domain`].
#[derive(Debug, Clone)]
pub struct DomainRead {
    /// Samples read, shaped by the reader kind.
    pub values: OutputBuffer,
    /// Domain value of every sample, in the same shape as `values`.
    pub domain: OutputBuffer,
    /// How the call ended.
    pub status: ReaderStatus,
}

/// Operations shared by every reader kind.
pub trait SignalReader: ReadCapabilities {
    /// Read up to `count` logical samples, waiting at most `timeout_ms`.
    ///
    /// A timeout yields a partial buffer with `complete == false`; an upstream
    /// event yields an empty buffer carrying the event. Fails only when the
    /// active value type cannot be read, and never for `count == 0`.
    fn read(&mut self, count: usize, timeout_ms: u64) -> ReaderResult<ValueRead>;

    /// Like [`read`](Self::read), additionally returning the matching domain buffer.
    fn read_with_domain(&mut self, count: usize, timeout_ms: u64) -> ReaderResult<DomainRead>;

    /// Logical samples readable right now without blocking.
    fn available_count(&self) -> usize;

    /// Discard up to `count` logical samples. Returns how many were discarded.
    fn skip(&mut self, count: usize) -> usize;

    /// Replace the configured read types after validating them.
    fn set_read_types(&mut self, value: SampleType, domain: SampleType) -> ReaderResult<()>;

    /// Timeout applied by [`read_default`](Self::read_default).
    fn default_timeout_ms(&self) -> u64;

    /// Logical samples delivered since the reader was created.
    fn samples_read(&self) -> u64;

    /// [`read`](Self::read) with the configured default timeout.
    fn read_default(&mut self, count: usize) -> ReaderResult<ValueRead> {
        let timeout_ms = self.default_timeout_ms();
        self.read(count, timeout_ms)
    }
}

/// State shared by every reader kind.
#[derive(Debug)]
pub(crate) struct ReaderCore {
    bindings: Vec<PortBinding>,
    notifier: Arc<ReadNotifier>,
    kind: LayoutKind,
    value_read_type: SampleType,
    domain_read_type: SampleType,
    domain_mode: DomainMode,
    default_timeout_ms: u64,
    samples_read: u64,
}

impl ReaderCore {
    /// Validate the configured types and bind every port to one notifier.
    ///
    /// Bindings taken before a failure are released again on return.
    pub(crate) fn new(config: &(impl ReaderConfig + ?Sized)) -> ReaderResult<Self> {
        SampleTypeRegistry::check_types(config.value_read_type(), config.domain_read_type())?;

        let notifier = Arc::new(ReadNotifier::default());
        let bindings = config
            .input_ports()
            .iter()
            .map(|port| port.bind_with(Arc::clone(&notifier)))
            .collect::<ReaderResult<Vec<_>>>()?;

        Ok(Self {
            bindings,
            notifier,
            kind: layout_kind(config),
            value_read_type: config.value_read_type(),
            domain_read_type: config.domain_read_type(),
            domain_mode: config.domain_mode(),
            default_timeout_ms: config.default_timeout_ms(),
            samples_read: 0,
        })
    }

    pub(crate) fn kind(&self) -> LayoutKind {
        self.kind
    }

    pub(crate) fn ports(&self) -> impl Iterator<Item = &Arc<InputPort>> {
        self.bindings.iter().map(|b| b.port())
    }

    fn context(&self, count: usize, timeout_ms: u64) -> ReaderResult<ReadContext<'_>> {
        if count.checked_mul(self.kind.block_size()).is_none() {
            return Err(ReaderError::InvalidParameter(format!(
                "read count {count} overflows the output allocation"
            )));
        }
        Ok(ReadContext {
            ports: &self.bindings,
            notifier: &self.notifier,
            layout: OutputBufferBuilder::layout(count, self.kind),
            deadline: deadline_after(timeout_ms),
        })
    }

    fn value_sources(&self) -> Vec<SampleType> {
        self.bindings
            .iter()
            .map(|p| {
                p.value_descriptor()
                    .map_or(SampleType::Undefined, |d| d.sample_type())
            })
            .collect()
    }

    pub(crate) fn read(&mut self, count: usize, timeout_ms: u64) -> ReaderResult<ValueRead> {
        if count == 0 {
            return Ok(ValueRead {
                values: OutputBuffer::empty(),
                status: engine::touch(&self.bindings),
            });
        }

        let value_type =
            dispatch::resolve(self.value_read_type, &self.value_sources(), StreamKind::Value)?;
        let entry = dispatch::value_entry(value_type)
            .ok_or_else(|| UnsupportedTypeError::new(value_type, StreamKind::Value))?;

        debug!(count, timeout_ms, value_type = %value_type, kind = ?self.kind, "read");
        let (values, fill) = entry(&self.context(count, timeout_ms)?)?;
        self.samples_read += fill.samples as u64;

        Ok(ValueRead {
            values,
            status: fill.status(),
        })
    }

    pub(crate) fn read_with_domain(
        &mut self,
        count: usize,
        timeout_ms: u64,
    ) -> ReaderResult<DomainRead> {
        if count == 0 {
            return Ok(DomainRead {
                values: OutputBuffer::empty(),
                domain: OutputBuffer::empty(),
                status: engine::touch(&self.bindings),
            });
        }

        let value_type =
            dispatch::resolve(self.value_read_type, &self.value_sources(), StreamKind::Value)?;
        let target =
            dispatch::resolve_domain(self.domain_read_type, self.domain_mode, &self.bindings)?;
        let entry = dispatch::pair_entry(value_type, &target)
            .ok_or_else(|| UnsupportedTypeError::new(target.sample_type(), StreamKind::Domain))?;

        debug!(
            count,
            timeout_ms,
            value_type = %value_type,
            domain_type = %target.sample_type(),
            mode = ?self.domain_mode,
            kind = ?self.kind,
            "read with domain"
        );
        let (values, domain, fill) = entry(&self.context(count, timeout_ms)?, &target)?;
        self.samples_read += fill.samples as u64;

        Ok(DomainRead {
            values,
            domain,
            status: fill.status(),
        })
    }

    pub(crate) fn available_count(&self) -> usize {
        engine::available(&self.bindings, self.kind)
    }

    pub(crate) fn skip(&mut self, count: usize) -> usize {
        engine::skip(&self.bindings, self.kind, count)
    }

    pub(crate) fn set_read_types(&mut self, value: SampleType, domain: SampleType) -> ReaderResult<()> {
        SampleTypeRegistry::check_types(value, domain)?;
        self.value_read_type = value;
        self.domain_read_type = domain;
        Ok(())
    }

    pub(crate) fn value_read_type(&self) -> SampleType {
        self.value_read_type
    }

    pub(crate) fn domain_read_type(&self) -> SampleType {
        self.domain_read_type
    }

    pub(crate) fn domain_mode(&self) -> DomainMode {
        self.domain_mode
    }

    pub(crate) fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms
    }

    pub(crate) fn samples_read(&self) -> u64 {
        self.samples_read
    }
}

/// Deadline `timeout_ms` from now, clamped for absurdly large timeouts.
fn deadline_after(timeout_ms: u64) -> Instant {
    let now = Instant::now();
    now.checked_add(Duration::from_millis(timeout_ms))
        .unwrap_or_else(|| now + Duration::from_secs(u64::from(u32::MAX)))
}

/// Implements [`SignalReader`] by delegating to a `core: ReaderCore` field.
macro_rules! delegate_signal_reader {
    ($reader:ty) => {
        impl $crate::reader::SignalReader for $reader {
            fn read(
                &mut self,
                count: usize,
                timeout_ms: u64,
            ) -> $crate::error::ReaderResult<$crate::reader::ValueRead> {
                self.core.read(count, timeout_ms)
            }

            fn read_with_domain(
                &mut self,
                count: usize,
                timeout_ms: u64,
            ) -> $crate::error::ReaderResult<$crate::reader::DomainRead> {
                self.core.read_with_domain(count, timeout_ms)
            }

            fn available_count(&self) -> usize {
                self.core.available_count()
            }

            fn skip(&mut self, count: usize) -> usize {
                self.core.skip(count)
            }

            fn set_read_types(
                &mut self,
                value: $crate::sample_type::SampleType,
                domain: $crate::sample_type::SampleType,
            ) -> $crate::error::ReaderResult<()> {
                self.core.set_read_types(value, domain)
            }

            fn default_timeout_ms(&self) -> u64 {
                self.core.default_timeout_ms()
            }

            fn samples_read(&self) -> u64 {
                self.core.samples_read()
            }
        }
    };
}
pub(crate) use delegate_signal_reader;

/// Reads one port, one sample per logical element.
#[derive(Debug)]
pub struct Reader {
    core: ReaderCore,
}

impl Reader {
    /// Bind `port`, following its descriptor types.
    pub fn new(port: &Arc<InputPort>) -> ReaderResult<Self> {
        Self::from_config(&PortConfig::single(port))
    }

    /// Bind `port` with explicit read types (`Invalid` follows the descriptor).
    pub fn with_types(
        port: &Arc<InputPort>,
        value_read_type: SampleType,
        domain_read_type: SampleType,
    ) -> ReaderResult<Self> {
        Self::from_config(
            &PortConfig::single(port)
                .with_value_read_type(value_read_type)
                .with_domain_read_type(domain_read_type),
        )
    }

    /// Bind `port` with the given domain mode.
    pub fn with_domain_mode(port: &Arc<InputPort>, mode: DomainMode) -> ReaderResult<Self> {
        Self::from_config(&PortConfig::single(port).with_domain_mode(mode))
    }

    /// Bind `port` using loaded settings.
    pub fn from_settings(port: &Arc<InputPort>, settings: &ReaderSettings) -> ReaderResult<Self> {
        Self::from_config(&PortConfig::single(port).with_settings(settings))
    }

    /// Bind the single port of `config`.
    pub fn from_config(config: &(impl ReaderConfig + ?Sized)) -> ReaderResult<Self> {
        if config.input_ports().len() != 1 {
            return Err(ReaderError::Configuration(format!(
                "Reader needs exactly one input port, got {}",
                config.input_ports().len()
            )));
        }
        Ok(Self {
            core: ReaderCore::new(config)?,
        })
    }

    /// The bound port.
    pub fn port(&self) -> Option<&Arc<InputPort>> {
        self.core.ports().next()
    }

    /// Configured value read type.
    pub fn value_read_type(&self) -> SampleType {
        self.core.value_read_type()
    }

    /// Configured domain read type.
    pub fn domain_read_type(&self) -> SampleType {
        self.core.domain_read_type()
    }

    /// Native ticks or wall-clock nanoseconds.
    pub fn domain_mode(&self) -> DomainMode {
        self.core.domain_mode()
    }
}

impl ReadCapabilities for Reader {}

delegate_signal_reader!(Reader);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DataDescriptor, Ratio};
    use crate::signal::Signal;
    use crate::status::ReadStatus;

    fn source(sample_type: SampleType) -> (Arc<Signal>, Arc<InputPort>) {
        let signal = Signal::new(
            DataDescriptor::values("ai0", sample_type),
            Some(DataDescriptor::linear_time(1, Ratio::new(1, 1_000).unwrap())),
        );
        let port = InputPort::new("ai0");
        signal.connect(&port);
        (signal, port)
    }

    struct Caps(Option<usize>, Option<usize>);

    impl ReadCapabilities for Caps {
        fn block_size(&self) -> Option<usize> {
            self.0
        }
        fn port_count(&self) -> Option<usize> {
            self.1
        }
    }

    #[test]
    fn layout_follows_capabilities() {
        assert_eq!(layout_kind(&Caps(None, None)), LayoutKind::Plain);
        assert_eq!(
            layout_kind(&Caps(Some(4), None)),
            LayoutKind::Block { block_size: 4 }
        );
        assert_eq!(layout_kind(&Caps(None, Some(3))), LayoutKind::Multi { ports: 3 });
    }

    #[test]
    fn plain_read_returns_values_in_order() {
        let (signal, port) = source(SampleType::Int32);
        let mut reader = Reader::new(&port).unwrap();
        signal.send_values(vec![1i32, 2, 3, 4, 5]);

        let read = reader.read(3, 0).unwrap();
        assert_eq!(read.values.shape(), &[3]);
        assert_eq!(read.values.to_vec::<i32>(), vec![1, 2, 3]);
        assert!(read.status.is_complete());

        let read = reader.read(3, 0).unwrap();
        assert_eq!(read.values.to_vec::<i32>(), vec![4, 5]);
        assert!(!read.status.is_complete());
        assert_eq!(reader.samples_read(), 5);
    }

    #[test]
    fn zero_count_read_is_empty_and_complete() {
        let (_signal, port) = source(SampleType::Float64);
        let mut reader = Reader::new(&port).unwrap();
        let read = reader.read(0, 0).unwrap();
        assert!(read.values.sample_type().is_none());
        assert!(read.status.is_complete());
        assert_eq!(read.status.read_status(), ReadStatus::Ok);
    }

    #[test]
    fn configured_type_converts() {
        let (signal, port) = source(SampleType::Int16);
        let mut reader =
            Reader::with_types(&port, SampleType::Float64, SampleType::Invalid).unwrap();
        signal.send_values(vec![-3i16, 7]);

        let read = reader.read(2, 0).unwrap();
        assert_eq!(read.values.sample_type(), Some(SampleType::Float64));
        assert_eq!(read.values.to_vec::<f64>(), vec![-3.0, 7.0]);
    }

    #[test]
    fn construction_rejects_unreadable_configured_type() {
        let (_signal, port) = source(SampleType::Float64);
        let err = Reader::with_types(&port, SampleType::Binary, SampleType::Invalid).unwrap_err();
        assert!(matches!(err, ReaderError::Configuration(_)));
        // The failed construction released the port.
        assert!(!port.is_bound());
    }

    #[test]
    fn set_read_types_validates() {
        let (_signal, port) = source(SampleType::Float64);
        let mut reader = Reader::new(&port).unwrap();
        assert!(reader
            .set_read_types(SampleType::ComplexFloat32, SampleType::Invalid)
            .is_err());
        assert_eq!(reader.value_read_type(), SampleType::Invalid);

        reader
            .set_read_types(SampleType::Int64, SampleType::Float64)
            .unwrap();
        assert_eq!(reader.value_read_type(), SampleType::Int64);
        assert_eq!(reader.domain_read_type(), SampleType::Float64);
    }

    #[test]
    fn read_with_domain_follows_linear_rule() {
        let (signal, port) = source(SampleType::UInt8);
        let mut reader = Reader::new(&port).unwrap();
        signal.send_with_offset(vec![10u8, 20, 30], 100).unwrap();

        let read = reader.read_with_domain(3, 0).unwrap();
        assert_eq!(read.values.to_vec::<u8>(), vec![10, 20, 30]);
        assert_eq!(read.domain.sample_type(), Some(SampleType::Int64));
        assert_eq!(read.domain.to_vec::<i64>(), vec![100, 101, 102]);
        assert!(!read.domain.is_datetime());
    }

    #[test]
    fn read_default_uses_configured_timeout() {
        let (signal, port) = source(SampleType::Float32);
        let mut reader =
            Reader::from_config(&PortConfig::single(&port).with_default_timeout_ms(0)).unwrap();
        assert_eq!(reader.default_timeout_ms(), 0);
        signal.send_values(vec![1.5f32]);
        let read = reader.read_default(2).unwrap();
        assert_eq!(read.values.to_vec::<f32>(), vec![1.5]);
        assert!(!read.status.is_complete());
    }

    #[test]
    fn available_and_skip() {
        let (signal, port) = source(SampleType::Int64);
        let mut reader = Reader::new(&port).unwrap();
        signal.send_values(vec![1i64, 2, 3, 4]);

        assert_eq!(reader.available_count(), 4);
        assert_eq!(reader.skip(3), 3);
        assert_eq!(reader.available_count(), 1);
        assert_eq!(reader.read(1, 0).unwrap().values.to_vec::<i64>(), vec![4]);
    }

    #[test]
    fn oversized_count_is_an_error() {
        let (signal, port) = source(SampleType::Float64);
        let mut reader = Reader::new(&port).unwrap();
        assert!(matches!(
            reader.read(usize::MAX / 4, 0),
            Err(ReaderError::InvalidParameter(_))
        ));
        assert!(matches!(
            reader.read_with_domain(usize::MAX / 4, 0),
            Err(ReaderError::InvalidParameter(_))
        ));

        // Nothing was consumed; the reader keeps working.
        signal.send_values(vec![0.25f64]);
        assert_eq!(reader.read(1, 0).unwrap().values.to_vec::<f64>(), vec![0.25]);
    }

    #[test]
    fn from_config_rejects_port_lists() {
        let (_s1, a) = source(SampleType::Int8);
        let (_s2, b) = source(SampleType::Int8);
        let err = Reader::from_config(&PortConfig::multi(&[a, b])).unwrap_err();
        assert!(matches!(err, ReaderError::Configuration(_)));
    }
}
