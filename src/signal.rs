//! Producer endpoint: a signal fans its packets out to every connected port.
//!
//! Acquisition loops own a `Signal` and call [`Signal::send`] (or one of the
//! typed helpers) from their own thread. Ports are held weakly, so dropping a
//! reader's port never keeps the producer busy.

use crate::descriptor::DataDescriptor;
use crate::error::{ReaderError, ReaderResult};
use crate::packet::{DataPacket, EventPacket, Packet};
use crate::port::InputPort;
use crate::sample::Sample;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct SignalState {
    value: Arc<DataDescriptor>,
    domain: Option<Arc<DataDescriptor>>,
    ports: Vec<Weak<InputPort>>,
}

/// A channel's output.
#[derive(Debug)]
pub struct Signal {
    id: u64,
    state: Mutex<SignalState>,
}

impl Signal {
    /// Create a signal with a value descriptor and optional domain descriptor.
    pub fn new(value: DataDescriptor, domain: Option<DataDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(SignalState {
                value: Arc::new(value),
                domain: domain.map(Arc::new),
                ports: Vec::new(),
            }),
        })
    }

    /// Current value descriptor.
    pub fn descriptor(&self) -> Arc<DataDescriptor> {
        Arc::clone(&self.state.lock().value)
    }

    /// Current domain descriptor.
    pub fn domain_descriptor(&self) -> Option<Arc<DataDescriptor>> {
        self.state.lock().domain.clone()
    }

    /// Connect `port`.
    ///
    /// A fresh port starts with this signal's current descriptors active. A port
    /// that was fed before receives them as a queued descriptor change.
    pub fn connect(&self, port: &Arc<InputPort>) {
        let mut state = self.state.lock();
        port.attach(self.id, Arc::clone(&state.value), state.domain.clone());
        state.ports.retain(|p| p.strong_count() > 0);
        state.ports.push(Arc::downgrade(port));
        debug!(signal = %state.value.name(), port = %port.name(), "port connected");
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        let state = self.state.lock();
        state
            .ports
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|p| p.is_connected())
            .count()
    }

    /// Replace the descriptors and notify every port in-band.
    ///
    /// `None` leaves that stream's descriptor unchanged.
    pub fn set_descriptor(
        &self,
        value: Option<DataDescriptor>,
        domain: Option<DataDescriptor>,
    ) {
        let value = value.map(Arc::new);
        let domain = domain.map(Arc::new);
        {
            let mut state = self.state.lock();
            if let Some(value) = &value {
                state.value = Arc::clone(value);
            }
            if let Some(domain) = &domain {
                state.domain = Some(Arc::clone(domain));
            }
        }
        self.send(Packet::Event(EventPacket::descriptor_changed(value, domain)));
    }

    /// Push a packet to every connected port. Returns how many ports accepted it.
    pub fn send(&self, packet: Packet) -> usize {
        let ports: Vec<Arc<InputPort>> = {
            let state = self.state.lock();
            state.ports.iter().filter_map(Weak::upgrade).collect()
        };
        ports
            .iter()
            .filter(|port| port.enqueue(self.id, packet.clone()))
            .count()
    }

    /// Send explicit samples with an explicit domain payload.
    pub fn send_samples<T: Sample, D: Sample>(
        &self,
        values: Vec<T>,
        domain: Vec<D>,
    ) -> ReaderResult<usize> {
        let (value_desc, domain_desc) = self.descriptors_for_send()?;
        let domain_packet = DataPacket::from_samples(domain_desc, domain);
        let packet = DataPacket::from_samples(value_desc, values).with_domain(domain_packet)?;
        Ok(self.send(Packet::Data(Arc::new(packet))))
    }

    /// Send explicit samples whose domain follows the domain descriptor's rule,
    /// starting at `domain_offset`.
    pub fn send_with_offset<T: Sample>(
        &self,
        values: Vec<T>,
        domain_offset: i64,
    ) -> ReaderResult<usize> {
        let (value_desc, domain_desc) = self.descriptors_for_send()?;
        let count = values.len();
        let domain_packet = DataPacket::implicit(domain_desc, count, domain_offset)?;
        let packet = DataPacket::from_samples(value_desc, values).with_domain(domain_packet)?;
        Ok(self.send(Packet::Data(Arc::new(packet))))
    }

    /// Send explicit samples without a domain.
    pub fn send_values<T: Sample>(&self, values: Vec<T>) -> usize {
        let packet = DataPacket::from_samples(self.descriptor(), values);
        self.send(Packet::Data(Arc::new(packet)))
    }

    fn descriptors_for_send(&self) -> ReaderResult<(Arc<DataDescriptor>, Arc<DataDescriptor>)> {
        let state = self.state.lock();
        let domain = state.domain.clone().ok_or_else(|| {
            ReaderError::InvalidParameter(format!(
                "signal '{}' has no domain descriptor",
                state.value.name()
            ))
        })?;
        Ok((Arc::clone(&state.value), domain))
    }
}

impl Drop for Signal {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for port in state.ports.iter().filter_map(Weak::upgrade) {
            port.detach(self.id);
        }
    }
}
