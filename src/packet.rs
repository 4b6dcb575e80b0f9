//! Packets travelling from a [`Signal`](crate::signal::Signal) to its input ports.

use crate::descriptor::{DataDescriptor, DataRule};
use crate::error::{ReaderError, ReaderResult};
use crate::sample::{Sample, SampleBuffer};
use crate::sample_type::SampleType;
use std::sync::Arc;

/// One unit of queued data or notification.
#[derive(Debug, Clone)]
pub enum Packet {
    /// Samples.
    Data(Arc<DataPacket>),
    /// Structural notification.
    Event(EventPacket),
}

impl Packet {
    /// Logical sample count; zero for events.
    pub fn sample_count(&self) -> usize {
        match self {
            Packet::Data(data) => data.sample_count(),
            Packet::Event(_) => 0,
        }
    }
}

/// A run of samples sharing one descriptor, optionally paired with its domain.
#[derive(Debug, Clone)]
pub struct DataPacket {
    descriptor: Arc<DataDescriptor>,
    sample_count: usize,
    offset: i64,
    payload: Option<SampleBuffer>,
    domain: Option<Arc<DataPacket>>,
}

impl DataPacket {
    /// Packet carrying explicit samples.
    pub fn explicit(descriptor: Arc<DataDescriptor>, payload: SampleBuffer) -> Self {
        Self {
            sample_count: payload.len(),
            descriptor,
            offset: 0,
            payload: Some(payload),
            domain: None,
        }
    }

    /// Typed shortcut for [`DataPacket::explicit`].
    pub fn from_samples<T: Sample>(descriptor: Arc<DataDescriptor>, samples: Vec<T>) -> Self {
        Self::explicit(descriptor, SampleBuffer::from_vec(samples))
    }

    /// Packet whose values follow the descriptor's implicit rule.
    ///
    /// Fails when the descriptor's rule is `Explicit`, since there would be nothing to read.
    pub fn implicit(
        descriptor: Arc<DataDescriptor>,
        sample_count: usize,
        offset: i64,
    ) -> ReaderResult<Self> {
        if descriptor.rule().is_explicit() {
            return Err(ReaderError::InvalidParameter(format!(
                "signal '{}' has an explicit rule; packets need a payload",
                descriptor.name()
            )));
        }
        Ok(Self {
            descriptor,
            sample_count,
            offset,
            payload: None,
            domain: None,
        })
    }

    /// Attach a domain packet. Both must carry the same number of samples.
    pub fn with_domain(mut self, domain: DataPacket) -> ReaderResult<Self> {
        if domain.sample_count != self.sample_count {
            return Err(ReaderError::InvalidParameter(format!(
                "domain packet has {} samples, value packet has {}",
                domain.sample_count, self.sample_count
            )));
        }
        self.domain = Some(Arc::new(domain));
        Ok(self)
    }

    /// Descriptor the packet was produced under.
    pub fn descriptor(&self) -> &Arc<DataDescriptor> {
        &self.descriptor
    }

    /// Number of samples.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Offset added by a linear rule.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Explicit payload, if any.
    pub fn payload(&self) -> Option<&SampleBuffer> {
        self.payload.as_ref()
    }

    /// Attached domain packet.
    pub fn domain(&self) -> Option<&Arc<DataPacket>> {
        self.domain.as_ref()
    }

    /// Type that keeps this packet's samples from being materialized, if any.
    ///
    /// Implicit rules always materialize; an explicit packet needs a numeric payload.
    pub(crate) fn unreadable_type(&self) -> Option<SampleType> {
        if !self.descriptor.rule().is_explicit() {
            return None;
        }
        match &self.payload {
            Some(payload) if payload.is_numeric() => None,
            Some(payload) => Some(payload.sample_type()),
            None => Some(self.descriptor.sample_type()),
        }
    }

    /// Write samples `start..start + dest.len()` into `dest`, converting as needed.
    ///
    /// Returns `false` if the samples cannot be materialized (raw payload, missing
    /// payload, range past the end); `dest` is then zero-filled.
    pub(crate) fn fill<T: Sample>(&self, start: usize, dest: &mut [T]) -> bool {
        if start + dest.len() > self.sample_count {
            dest.fill(T::default());
            return false;
        }

        let ok = match self.descriptor.rule() {
            DataRule::Explicit => match &self.payload {
                Some(payload) => payload.convert_into(start, dest),
                None => false,
            },
            DataRule::Linear { delta, start: base } => {
                let mut value = self
                    .offset
                    .wrapping_add(base)
                    .wrapping_add(delta.wrapping_mul(start as i64));
                for d in dest.iter_mut() {
                    *d = T::cast_from(value);
                    value = value.wrapping_add(delta);
                }
                true
            }
            DataRule::Constant(constant) => {
                dest.fill(T::cast_from(constant));
                true
            }
        };

        if !ok {
            dest.fill(T::default());
        }
        ok
    }
}

/// What an event packet reports.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The producer switched descriptors. `None` means "unchanged" for that stream.
    DescriptorChanged {
        /// New value descriptor.
        value: Option<Arc<DataDescriptor>>,
        /// New domain descriptor.
        domain: Option<Arc<DataDescriptor>>,
    },
    /// The port lost its upstream signal.
    Disconnected,
}

/// A structural notification queued in-band with the data.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPacket {
    kind: EventKind,
}

impl EventPacket {
    /// Descriptor change event.
    pub fn descriptor_changed(
        value: Option<Arc<DataDescriptor>>,
        domain: Option<Arc<DataDescriptor>>,
    ) -> Self {
        Self {
            kind: EventKind::DescriptorChanged { value, domain },
        }
    }

    /// Disconnection event.
    pub fn disconnected() -> Self {
        Self {
            kind: EventKind::Disconnected,
        }
    }

    /// Event payload.
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }
}
