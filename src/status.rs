//! Per-call read status.
//!
//! Every read returns a [`ReaderStatus`], including zero-count reads. Partial
//! completion (timeout) and upstream events are reported here and never as errors.

use crate::descriptor::DataDescriptor;
use crate::packet::{EventKind, EventPacket};
use std::sync::Arc;

/// Coarse outcome of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Samples (possibly fewer than requested) were delivered.
    Ok,
    /// An upstream event was consumed instead of samples.
    Event,
}

/// An upstream notification surfaced by a read.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDescriptor {
    port_index: usize,
    kind: EventKind,
}

impl EventDescriptor {
    pub(crate) fn from_packet(port_index: usize, packet: EventPacket) -> Self {
        Self {
            port_index,
            kind: packet.kind().clone(),
        }
    }

    /// Index of the port the event came from (always 0 for single-port readers).
    pub fn port_index(&self) -> usize {
        self.port_index
    }

    /// Event payload.
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// `true` for a descriptor change.
    pub fn is_descriptor_change(&self) -> bool {
        matches!(self.kind, EventKind::DescriptorChanged { .. })
    }

    /// New value descriptor carried by a descriptor change.
    pub fn value_descriptor(&self) -> Option<&Arc<DataDescriptor>> {
        match &self.kind {
            EventKind::DescriptorChanged { value, .. } => value.as_ref(),
            EventKind::Disconnected => None,
        }
    }

    /// New domain descriptor carried by a descriptor change.
    pub fn domain_descriptor(&self) -> Option<&Arc<DataDescriptor>> {
        match &self.kind {
            EventKind::DescriptorChanged { domain, .. } => domain.as_ref(),
            EventKind::Disconnected => None,
        }
    }
}

/// Result metadata of one read call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderStatus {
    complete: bool,
    samples_read: usize,
    event: Option<EventDescriptor>,
}

impl ReaderStatus {
    /// Samples delivered; `complete` when the requested count was reached.
    pub fn ok(samples_read: usize, complete: bool) -> Self {
        Self {
            complete,
            samples_read,
            event: None,
        }
    }

    /// An event was consumed; no samples were delivered.
    pub fn event(event: EventDescriptor) -> Self {
        Self {
            complete: false,
            samples_read: 0,
            event: Some(event),
        }
    }

    /// `true` when the call reached the requested count.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Logical samples delivered by the call.
    pub fn samples_read(&self) -> usize {
        self.samples_read
    }

    /// Event consumed by the call.
    pub fn event_descriptor(&self) -> Option<&EventDescriptor> {
        self.event.as_ref()
    }

    /// Coarse outcome.
    pub fn read_status(&self) -> ReadStatus {
        if self.event.is_some() {
            ReadStatus::Event
        } else {
            ReadStatus::Ok
        }
    }
}
