//! Drains bound ports into typed destination runs.
//!
//! One loop serves all three reader kinds. Ports advance in lock-step: each pass
//! takes the same number of samples from every port (the common amount available
//! ahead of any event), so the k-th sample of every run was the k-th sample its
//! port delivered. Block readers additionally round every take down to whole
//! blocks. When nothing can be taken the loop sleeps on the reader's notifier,
//! which every bound port signals, until any port changes or the shared deadline
//! passes.
//!
//! A packet that cannot be read as the active type is never drained. If it is the
//! first thing a call meets, the call fails with its type; otherwise the call
//! returns what it collected in front of it.

use crate::buffer::{BufferLayout, LayoutKind, OutputBufferBuilder};
use crate::error::{ReaderResult, UnsupportedTypeError};
use crate::port::{Availability, PortBinding, ReadNotifier};
use crate::sample::Sample;
use crate::status::{EventDescriptor, ReaderStatus};
use std::time::Instant;
use tracing::{trace, warn};

/// Outcome of one fill.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fill {
    /// Logical samples delivered (blocks for block readers, per-port samples for multi).
    pub samples: usize,
    /// Event consumed instead of data.
    pub event: Option<EventDescriptor>,
    /// Requested logical count.
    pub requested: usize,
}

impl Fill {
    pub(crate) fn status(&self) -> ReaderStatus {
        match &self.event {
            Some(event) => ReaderStatus::event(event.clone()),
            None => ReaderStatus::ok(self.samples, self.samples == self.requested),
        }
    }
}

fn granularity(kind: LayoutKind) -> usize {
    match kind {
        LayoutKind::Block { block_size } => block_size.max(1),
        _ => 1,
    }
}

/// Samples every port can deliver right now, rounded down to whole granules.
fn common_available(avail: &[Availability], gran: usize) -> usize {
    let common = avail.iter().map(|a| a.samples).min().unwrap_or(0);
    common - common % gran
}

/// First port whose progress is blocked by a pending event.
fn blocked_by_event(avail: &[Availability], gran: usize) -> Option<usize> {
    avail
        .iter()
        .position(|a| a.event_pending && a.samples < gran)
}

/// First port stopped by an unreadable packet before a full granule.
fn blocked_by_stall(
    avail: &[Availability],
    gran: usize,
) -> Option<(usize, UnsupportedTypeError)> {
    avail
        .iter()
        .enumerate()
        .find_map(|(i, a)| a.stall.filter(|_| a.samples < gran).map(|err| (i, err)))
}

/// Consume the event blocking port `index`, discarding any partial granule ahead of it.
fn consume_event(ports: &[PortBinding], index: usize, leftover: usize) -> Option<EventDescriptor> {
    let port = &ports[index];
    if leftover > 0 {
        let dropped = port.skip(leftover);
        warn!(
            port = %port.name(),
            dropped,
            "discarding incomplete block ahead of event"
        );
    }
    port.pop_event()
        .map(|event| EventDescriptor::from_packet(index, event))
}

/// Fill `values` (and `domain`) from `ports` according to `layout`.
pub(crate) fn fill<T: Sample, D: Sample>(
    ports: &[PortBinding],
    notifier: &ReadNotifier,
    layout: &BufferLayout,
    deadline: Instant,
    values: &mut [T],
    domain: Option<&mut [D]>,
) -> ReaderResult<Fill> {
    let destinations = layout.destinations();
    let mut value_runs = OutputBufferBuilder::split(values, &destinations)?;
    let mut domain_runs = match domain {
        Some(domain) => Some(OutputBufferBuilder::split(domain, &destinations)?),
        None => None,
    };
    let with_domain = domain_runs.is_some();

    let gran = granularity(layout.kind());
    let per_port = layout.per_destination();
    let mut filled = 0;
    let mut event = None;

    while filled < per_port {
        // Read before the ports so a change racing the check still wakes the wait.
        let seen = notifier.generation();
        let avail: Vec<Availability> = ports.iter().map(|p| p.drainable(with_domain)).collect();
        let take = common_available(&avail, gran).min(per_port - filled);

        if take > 0 {
            for (i, port) in ports.iter().enumerate() {
                let range = filled..filled + take;
                let dom = domain_runs
                    .as_mut()
                    .map(|runs| &mut runs[i][range.clone()]);
                let moved = port.take(take, &mut value_runs[i][range], dom);
                debug_assert_eq!(moved, take);
            }
            filled += take;
            trace!(filled, per_port, "lock-step take");
            continue;
        }

        if let Some(index) = blocked_by_event(&avail, gran) {
            if filled == 0 {
                event = consume_event(ports, index, avail[index].samples);
            }
            break;
        }

        if let Some((index, err)) = blocked_by_stall(&avail, gran) {
            if filled == 0 {
                warn!(
                    port = %ports[index].name(),
                    sample_type = %err.sample_type,
                    "queued packet cannot be read"
                );
                return Err(err.into());
            }
            break;
        }

        if Instant::now() >= deadline {
            break;
        }

        notifier.wait_for_change(seen, deadline);
    }

    Ok(Fill {
        samples: filled / gran,
        event,
        requested: layout.count(),
    })
}

/// Status of a zero-count read: touches the ports only to surface a pending event.
pub(crate) fn touch(ports: &[PortBinding]) -> ReaderStatus {
    for (index, port) in ports.iter().enumerate() {
        let avail = port.availability();
        if avail.event_pending && avail.samples == 0 {
            if let Some(event) = port.pop_event() {
                return ReaderStatus::event(EventDescriptor::from_packet(index, event));
            }
        }
    }
    ReaderStatus::ok(0, true)
}

/// Logical samples deliverable without blocking.
pub(crate) fn available(ports: &[PortBinding], kind: LayoutKind) -> usize {
    let gran = granularity(kind);
    let avail: Vec<Availability> = ports.iter().map(|p| p.availability()).collect();
    common_available(&avail, gran) / gran
}

/// Discard up to `count` logical samples in lock-step. Returns how many.
pub(crate) fn skip(ports: &[PortBinding], kind: LayoutKind, count: usize) -> usize {
    let gran = granularity(kind);
    let avail: Vec<Availability> = ports.iter().map(|p| p.availability()).collect();
    let take = common_available(&avail, gran).min(count.saturating_mul(gran));
    for port in ports {
        port.skip(take);
    }
    take / gran
}
