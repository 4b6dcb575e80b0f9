//! Input ports: the consumer end of a signal connection.
//!
//! Each port owns a FIFO of packets guarded by its own mutex. Producers push from
//! their own threads through [`Signal`](crate::signal::Signal); exactly one reader
//! may consume a port at a time, enforced by [`PortBinding`]. Every change to a
//! bound port wakes the [`ReadNotifier`] of the reader holding it, so a reader
//! over several ports sleeps on one condition variable and sees progress on any.
//!
//! The port also tracks the consumer's cursor: how far into the front data packet
//! the reader has progressed, and which descriptors are active. Descriptors only
//! change when the reader consumes a `DescriptorChanged` event, so every sample a
//! call drains was produced under the descriptor that call resolved its types from.
//! A data packet that does not fit the active descriptors is never drained: a
//! packet under another descriptor is surfaced as a descriptor change, and a
//! payload that cannot be converted stops the read in front of it.

use crate::descriptor::DataDescriptor;
use crate::error::{ReaderError, ReaderResult, StreamKind, UnsupportedTypeError};
use crate::packet::{DataPacket, EventKind, EventPacket, Packet};
use crate::sample::Sample;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Queue state; only touched with the port mutex held.
#[derive(Debug, Default)]
struct PortState {
    queue: VecDeque<Packet>,
    /// Samples of the front data packet already consumed.
    front_offset: usize,
    active_value: Option<Arc<DataDescriptor>>,
    active_domain: Option<Arc<DataDescriptor>>,
    /// Id of the signal currently feeding the port.
    signal_id: Option<u64>,
}

/// How the consumer may treat a queued data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Front {
    /// Drainable under the active descriptors.
    Ready,
    /// Produced under a descriptor that is not active; reported as a change.
    Foreign,
    /// Cannot be materialized as any readable type.
    Unreadable(UnsupportedTypeError),
}

fn classify(state: &PortState, data: &DataPacket, with_domain: bool) -> Front {
    let matches_active = state
        .active_value
        .as_ref()
        .is_some_and(|a| Arc::ptr_eq(a, data.descriptor()) || a == data.descriptor());
    if !matches_active {
        return Front::Foreign;
    }
    if let Some(sample_type) = data.unreadable_type() {
        return Front::Unreadable(UnsupportedTypeError::new(sample_type, StreamKind::Value));
    }
    if with_domain {
        if let Some(sample_type) = data.domain().and_then(|d| d.unreadable_type()) {
            return Front::Unreadable(UnsupportedTypeError::new(sample_type, StreamKind::Domain));
        }
    }
    Front::Ready
}

/// What a port can deliver right now without blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Availability {
    /// Samples queued ahead of the next event (or end of queue).
    pub samples: usize,
    /// An event, or a packet under another descriptor, follows those samples.
    pub event_pending: bool,
    /// A packet that cannot be read follows those samples.
    pub stall: Option<UnsupportedTypeError>,
}

/// Wakes one reader whenever any port it holds changes.
#[derive(Debug, Default)]
pub(crate) struct ReadNotifier {
    generation: Mutex<u64>,
    changed: Condvar,
}

impl ReadNotifier {
    /// Current generation; pass to [`ReadNotifier::wait_for_change`].
    pub(crate) fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    fn notify(&self) {
        *self.generation.lock() += 1;
        self.changed.notify_all();
    }

    /// Block until a port changes after `generation` was read, or `deadline` passes.
    ///
    /// Returns `false` on timeout.
    pub(crate) fn wait_for_change(&self, generation: u64, deadline: Instant) -> bool {
        let mut current = self.generation.lock();
        while *current == generation {
            if self.changed.wait_until(&mut current, deadline).timed_out() {
                return *current != generation;
            }
        }
        true
    }
}

/// Single-consumer endpoint of a signal connection.
#[derive(Debug)]
pub struct InputPort {
    name: String,
    state: Mutex<PortState>,
    bound: AtomicBool,
    listener: Mutex<Option<Arc<ReadNotifier>>>,
}

impl InputPort {
    /// Create an unconnected port.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(PortState::default()),
            bound: AtomicBool::new(false),
            listener: Mutex::new(None),
        })
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` while a signal feeds the port.
    pub fn is_connected(&self) -> bool {
        self.state.lock().signal_id.is_some()
    }

    /// `true` while a reader holds the port.
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Active value descriptor.
    pub fn value_descriptor(&self) -> Option<Arc<DataDescriptor>> {
        self.state.lock().active_value.clone()
    }

    /// Active domain descriptor.
    pub fn domain_descriptor(&self) -> Option<Arc<DataDescriptor>> {
        self.state.lock().active_domain.clone()
    }

    /// Number of packets (data and event) waiting in the queue.
    pub fn queued_packets(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Disconnect from the current signal.
    ///
    /// Queued packets stay readable; a `Disconnected` event is appended after them.
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        if state.signal_id.take().is_some() {
            state.queue.push_back(Packet::Event(EventPacket::disconnected()));
            drop(state);
            self.wake();
            debug!(port = %self.name, "port disconnected");
        }
    }

    /// Claim the port for one reader.
    pub fn bind(self: &Arc<Self>) -> ReaderResult<PortBinding> {
        self.bind_with(Arc::new(ReadNotifier::default()))
    }

    /// Claim the port, waking `notifier` on every change until the binding drops.
    pub(crate) fn bind_with(
        self: &Arc<Self>,
        notifier: Arc<ReadNotifier>,
    ) -> ReaderResult<PortBinding> {
        if !self.is_connected() {
            return Err(ReaderError::PortNotConnected(self.name.clone()));
        }
        if self
            .bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ReaderError::PortInUse(self.name.clone()));
        }
        *self.listener.lock() = Some(notifier);
        Ok(PortBinding {
            port: Arc::clone(self),
        })
    }

    fn wake(&self) {
        if let Some(notifier) = self.listener.lock().as_ref() {
            notifier.notify();
        }
    }

    // ---------------------------------------------------------------------
    // Producer side (called by Signal)
    // ---------------------------------------------------------------------

    /// Start feeding the port from `signal_id`.
    ///
    /// The first connection activates the descriptors directly. Any later one
    /// queues a `DescriptorChanged` event behind the packets already queued, so a
    /// reader sees the switch in-band.
    pub(crate) fn attach(
        &self,
        signal_id: u64,
        value: Arc<DataDescriptor>,
        domain: Option<Arc<DataDescriptor>>,
    ) {
        let mut state = self.state.lock();
        state.signal_id = Some(signal_id);
        if state.active_value.is_none() {
            state.active_value = Some(value);
            state.active_domain = domain;
        } else {
            state
                .queue
                .push_back(Packet::Event(EventPacket::descriptor_changed(Some(value), domain)));
        }
        drop(state);
        self.wake();
    }

    /// Push a packet produced by `signal_id`. Returns `false` if the port is fed
    /// by another signal (or none) and the packet was dropped.
    pub(crate) fn enqueue(&self, signal_id: u64, packet: Packet) -> bool {
        let mut state = self.state.lock();
        if state.signal_id != Some(signal_id) {
            return false;
        }
        state.queue.push_back(packet);
        drop(state);
        self.wake();
        true
    }

    /// Called when the feeding signal goes away.
    pub(crate) fn detach(&self, signal_id: u64) {
        let mut state = self.state.lock();
        if state.signal_id == Some(signal_id) {
            state.signal_id = None;
            state.queue.push_back(Packet::Event(EventPacket::disconnected()));
            drop(state);
            self.wake();
        }
    }

    // ---------------------------------------------------------------------
    // Consumer side (called by the bound reader)
    // ---------------------------------------------------------------------

    /// Values-only [`InputPort::drainable`].
    pub(crate) fn availability(&self) -> Availability {
        self.drainable(false)
    }

    /// Samples a read can drain right now, checking domain payloads when
    /// `with_domain` is set.
    pub(crate) fn drainable(&self, with_domain: bool) -> Availability {
        let state = self.state.lock();
        let mut avail = Availability {
            samples: 0,
            event_pending: false,
            stall: None,
        };
        for (i, packet) in state.queue.iter().enumerate() {
            let data = match packet {
                Packet::Data(data) => data,
                Packet::Event(_) => {
                    avail.event_pending = true;
                    break;
                }
            };
            match classify(&state, data, with_domain) {
                Front::Ready => {
                    let consumed = if i == 0 { state.front_offset } else { 0 };
                    avail.samples += data.sample_count() - consumed;
                }
                Front::Foreign => {
                    avail.event_pending = true;
                    break;
                }
                Front::Unreadable(err) => {
                    avail.stall = Some(err);
                    break;
                }
            }
        }
        avail
    }

    /// Move up to `count` samples into the destinations.
    ///
    /// Stops in front of an event and in front of any packet that does not fit the
    /// active descriptors; such a packet stays queued for the next call.
    /// `values` (and `domain`, when given) must be at least `count` long. Returns
    /// the number of samples moved.
    pub(crate) fn take<T: Sample, D: Sample>(
        &self,
        count: usize,
        values: &mut [T],
        mut domain: Option<&mut [D]>,
    ) -> usize {
        let with_domain = domain.is_some();
        let mut state = self.state.lock();
        let mut moved = 0;

        while moved < count {
            let offset = state.front_offset;
            let data = match state.queue.front() {
                Some(Packet::Data(data)) if classify(&state, data, with_domain) == Front::Ready => {
                    Arc::clone(data)
                }
                _ => break,
            };

            let n = (data.sample_count() - offset).min(count - moved);
            if !data.fill(offset, &mut values[moved..moved + n]) {
                break;
            }
            if let Some(domain) = domain.as_deref_mut() {
                let dest = &mut domain[moved..moved + n];
                match data.domain() {
                    Some(dp) => {
                        if !dp.fill(offset, dest) {
                            break;
                        }
                    }
                    None => {
                        dest.fill(D::default());
                        debug!(port = %self.name, samples = n, "packet carries no domain; zero-filled");
                    }
                }
            }

            trace!(port = %self.name, offset, samples = n, "drained packet");
            moved += n;
            advance(&mut state, n, data.sample_count());
        }

        moved
    }

    /// Discard up to `count` drainable samples. Returns how many.
    pub(crate) fn skip(&self, count: usize) -> usize {
        let mut state = self.state.lock();
        let mut skipped = 0;
        while skipped < count {
            let total = match state.queue.front() {
                Some(Packet::Data(data)) if classify(&state, data, false) == Front::Ready => {
                    data.sample_count()
                }
                _ => break,
            };
            let n = (total - state.front_offset).min(count - skipped);
            skipped += n;
            advance(&mut state, n, total);
        }
        skipped
    }

    /// Consume the front event, applying descriptor changes.
    ///
    /// A front data packet produced under another descriptor is reported as a
    /// descriptor change to that packet's descriptors and stays queued.
    pub(crate) fn pop_event(&self) -> Option<EventPacket> {
        let mut state = self.state.lock();
        let adopted = match state.queue.front() {
            Some(Packet::Event(_)) => None,
            Some(Packet::Data(data)) if classify(&state, data, false) == Front::Foreign => {
                let domain = data
                    .domain()
                    .map(|d| Arc::clone(d.descriptor()))
                    .filter(|d| state.active_domain.as_ref() != Some(d));
                Some(EventPacket::descriptor_changed(
                    Some(Arc::clone(data.descriptor())),
                    domain,
                ))
            }
            _ => return None,
        };
        let event = match adopted {
            Some(event) => event,
            None => match state.queue.pop_front() {
                Some(Packet::Event(event)) => {
                    state.front_offset = 0;
                    event
                }
                _ => return None,
            },
        };

        if let EventKind::DescriptorChanged { value, domain } = event.kind() {
            if let Some(value) = value {
                state.active_value = Some(Arc::clone(value));
            }
            if let Some(domain) = domain {
                state.active_domain = Some(Arc::clone(domain));
            }
        }
        debug!(port = %self.name, event = ?event.kind(), "consumed event");
        Some(event)
    }
}

fn advance(state: &mut PortState, n: usize, packet_len: usize) {
    state.front_offset += n;
    if state.front_offset >= packet_len {
        state.queue.pop_front();
        state.front_offset = 0;
    }
}

/// Exclusive consumer claim on a port; released on drop.
#[derive(Debug)]
pub struct PortBinding {
    port: Arc<InputPort>,
}

impl PortBinding {
    /// The bound port.
    pub fn port(&self) -> &Arc<InputPort> {
        &self.port
    }
}

impl std::ops::Deref for PortBinding {
    type Target = InputPort;

    fn deref(&self) -> &InputPort {
        &self.port
    }
}

impl Drop for PortBinding {
    fn drop(&mut self) {
        *self.port.listener.lock() = None;
        self.port.bound.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleBuffer;
    use crate::sample_type::SampleType;
    use std::time::Duration;

    const SIGNAL: u64 = 7;

    fn connected_port() -> (Arc<InputPort>, Arc<DataDescriptor>) {
        let port = InputPort::new("in");
        let desc = Arc::new(DataDescriptor::values("ai0", SampleType::Int32));
        port.attach(SIGNAL, Arc::clone(&desc), None);
        (port, desc)
    }

    fn data(desc: &Arc<DataDescriptor>, values: Vec<i32>) -> Packet {
        Packet::Data(Arc::new(DataPacket::from_samples(Arc::clone(desc), values)))
    }

    #[test]
    fn take_spans_packets_and_keeps_remainder() {
        let (port, desc) = connected_port();
        port.enqueue(SIGNAL, data(&desc, vec![1, 2, 3]));
        port.enqueue(SIGNAL, data(&desc, vec![4, 5]));

        let mut values = [0i32; 4];
        assert_eq!(port.take::<i32, i64>(4, &mut values, None), 4);
        assert_eq!(values, [1, 2, 3, 4]);

        let avail = port.availability();
        assert_eq!(avail.samples, 1);
        assert!(!avail.event_pending);

        let mut rest = [0i32; 4];
        assert_eq!(port.take::<i32, i64>(4, &mut rest, None), 1);
        assert_eq!(rest[0], 5);
        assert_eq!(port.queued_packets(), 0);
    }

    #[test]
    fn take_stops_at_event() {
        let (port, desc) = connected_port();
        let next = Arc::new(DataDescriptor::values("ai0", SampleType::Float64));
        port.enqueue(SIGNAL, data(&desc, vec![1, 2]));
        port.enqueue(
            SIGNAL,
            Packet::Event(EventPacket::descriptor_changed(Some(Arc::clone(&next)), None)),
        );

        let avail = port.availability();
        assert_eq!(avail.samples, 2);
        assert!(avail.event_pending);

        let mut values = [0i32; 5];
        assert_eq!(port.take::<i32, i64>(5, &mut values, None), 2);
        assert_eq!(port.value_descriptor().unwrap().sample_type(), SampleType::Int32);

        assert!(port.pop_event().is_some());
        assert_eq!(port.value_descriptor().unwrap().sample_type(), SampleType::Float64);
        assert!(port.pop_event().is_none());
    }

    #[test]
    fn skip_discards_without_copy() {
        let (port, desc) = connected_port();
        port.enqueue(SIGNAL, data(&desc, vec![1, 2, 3]));
        assert_eq!(port.skip(2), 2);
        let mut values = [0i32; 1];
        port.take::<i32, i64>(1, &mut values, None);
        assert_eq!(values, [3]);
    }

    #[test]
    fn binding_is_exclusive() {
        let (port, _) = connected_port();
        let first = port.bind().unwrap();
        assert!(port.is_bound());
        assert!(matches!(port.bind(), Err(ReaderError::PortInUse(_))));
        drop(first);
        assert!(!port.is_bound());
        assert!(port.bind().is_ok());
    }

    #[test]
    fn binding_requires_connection() {
        let port = InputPort::new("loose");
        assert!(matches!(port.bind(), Err(ReaderError::PortNotConnected(_))));
    }

    #[test]
    fn enqueue_from_foreign_signal_is_dropped() {
        let (port, desc) = connected_port();
        assert!(!port.enqueue(SIGNAL + 1, data(&desc, vec![1])));
        assert_eq!(port.queued_packets(), 0);
    }

    #[test]
    fn wait_times_out_without_data() {
        let (port, _) = connected_port();
        let notifier = Arc::new(ReadNotifier::default());
        let _binding = port.bind_with(Arc::clone(&notifier)).unwrap();
        let generation = notifier.generation();
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(!notifier.wait_for_change(generation, deadline));
    }

    #[test]
    fn wait_wakes_on_enqueue() {
        let (port, desc) = connected_port();
        let notifier = Arc::new(ReadNotifier::default());
        let _binding = port.bind_with(Arc::clone(&notifier)).unwrap();
        let generation = notifier.generation();

        let producer = {
            let port = Arc::clone(&port);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                port.enqueue(SIGNAL, data(&desc, vec![1]));
            })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        assert!(notifier.wait_for_change(generation, deadline));
        producer.join().unwrap();
        assert_eq!(port.availability().samples, 1);
    }

    #[test]
    fn shared_notifier_wakes_on_any_port() {
        let (a, _) = connected_port();
        let (b, _) = connected_port();
        let notifier = Arc::new(ReadNotifier::default());
        let _a = a.bind_with(Arc::clone(&notifier)).unwrap();
        let _b = b.bind_with(Arc::clone(&notifier)).unwrap();

        let generation = notifier.generation();
        b.disconnect();
        assert!(notifier.wait_for_change(generation, Instant::now()));
    }

    #[test]
    fn released_binding_stops_notifying() {
        let (port, desc) = connected_port();
        let notifier = Arc::new(ReadNotifier::default());
        drop(port.bind_with(Arc::clone(&notifier)).unwrap());

        let generation = notifier.generation();
        port.enqueue(SIGNAL, data(&desc, vec![1]));
        assert_eq!(notifier.generation(), generation);
    }

    #[test]
    fn reconnect_queues_descriptor_change_behind_old_data() {
        let (port, desc) = connected_port();
        port.enqueue(SIGNAL, data(&desc, vec![1, 2]));

        let next = Arc::new(DataDescriptor::values("text", SampleType::String));
        port.attach(SIGNAL + 1, Arc::clone(&next), None);
        assert_eq!(port.value_descriptor().unwrap().sample_type(), SampleType::Int32);

        let avail = port.availability();
        assert_eq!(avail.samples, 2);
        assert!(avail.event_pending);

        let mut values = [0i32; 4];
        assert_eq!(port.take::<i32, i64>(4, &mut values, None), 2);
        let event = port.pop_event().unwrap();
        assert!(matches!(
            event.kind(),
            EventKind::DescriptorChanged { value: Some(v), .. } if v == &next
        ));
        assert_eq!(port.value_descriptor().unwrap().sample_type(), SampleType::String);
    }

    #[test]
    fn unconvertible_payload_is_left_queued() {
        let (port, desc) = connected_port();
        port.enqueue(SIGNAL, data(&desc, vec![1]));
        let raw = SampleBuffer::Raw {
            sample_type: SampleType::Binary,
            sample_count: 3,
            bytes: bytes::Bytes::from_static(&[0u8; 3]),
        };
        port.enqueue(
            SIGNAL,
            Packet::Data(Arc::new(DataPacket::explicit(Arc::clone(&desc), raw))),
        );

        let avail = port.availability();
        assert_eq!(avail.samples, 1);
        assert_eq!(
            avail.stall,
            Some(UnsupportedTypeError::new(SampleType::Binary, StreamKind::Value))
        );

        let mut values = [7i32; 4];
        assert_eq!(port.take::<i32, i64>(4, &mut values, None), 1);
        assert_eq!(values[0], 1);
        assert_eq!(port.take::<i32, i64>(3, &mut values, None), 0);
        assert_eq!(port.skip(3), 0);
        assert_eq!(port.queued_packets(), 1);
    }

    #[test]
    fn packet_under_inactive_descriptor_becomes_a_change() {
        let (port, _) = connected_port();
        let other = Arc::new(DataDescriptor::values("ai0", SampleType::Float32));
        let packet = DataPacket::from_samples(Arc::clone(&other), vec![0.5f32]);
        port.enqueue(SIGNAL, Packet::Data(Arc::new(packet)));

        let avail = port.availability();
        assert_eq!(avail.samples, 0);
        assert!(avail.event_pending);
        let mut values = [0i32; 1];
        assert_eq!(port.take::<i32, i64>(1, &mut values, None), 0);

        assert!(port.pop_event().is_some());
        assert_eq!(port.value_descriptor().unwrap().sample_type(), SampleType::Float32);
        let mut values = [0.0f32; 1];
        assert_eq!(port.take::<f32, i64>(1, &mut values, None), 1);
        assert_eq!(values, [0.5]);
    }

    #[test]
    fn disconnect_appends_event_after_data() {
        let (port, desc) = connected_port();
        port.enqueue(SIGNAL, data(&desc, vec![1, 2]));
        port.disconnect();
        assert!(!port.is_connected());

        let avail = port.availability();
        assert_eq!(avail.samples, 2);
        assert!(avail.event_pending);
    }
}
