//! # DAQ Signal Reader
//!
//! Typed, blocking readers over the packet queues that connect acquisition
//! signals to their consumers. Producers push data and event packets into
//! [`InputPort`]s from their own threads; a reader bound to those ports drains
//! them into shaped, typed [`OutputBuffer`]s.
//!
//! ## Crate Structure
//!
//! - **`sample_type`**: The closed set of sample representations and the
//!   registry deciding which of them are readable.
//! - **`sample`**: The [`Sample`] trait implemented by the ten readable numeric
//!   primitives, and the packet payload storage.
//! - **`descriptor`**: Data descriptors: sample type, data rule, tick resolution, origin.
//! - **`packet`**, **`signal`**, **`port`**: The producer/consumer plumbing.
//! - **`domain`**: Native and wall-clock domain conversion.
//! - **`buffer`**: Output layout (element count, shape, strides) and the
//!   resulting [`OutputBuffer`].
//! - **`status`**: Per-call [`ReaderStatus`].
//! - **`reader`**: [`Reader`], [`BlockReader`] and [`MultiReader`].
//! - **`config`** and **`logging`**: Figment-based settings and tracing setup.
//! - **`error`**: [`ReaderError`] and [`UnsupportedTypeError`].
//!
//! ## Reading
//!
//! Every read takes a logical sample count and a timeout in milliseconds. It
//! returns what was collected by the deadline (`complete == false` if short),
//! an empty buffer carrying an upstream event, or fails when the active sample
//! type cannot be read. A count of zero never fails.

pub mod buffer;
pub mod config;
pub mod descriptor;
pub mod domain;
pub mod error;
pub mod logging;
pub mod packet;
pub mod port;
pub mod reader;
pub mod sample;
pub mod sample_type;
pub mod signal;
pub mod status;

pub use buffer::{BufferLayout, Destination, LayoutKind, OutputBuffer, OutputBufferBuilder};
pub use config::{LogSettings, ReaderSettings};
pub use descriptor::{DataDescriptor, DataRule, Ratio};
pub use domain::{DomainConverter, DomainMode};
pub use error::{ReaderError, ReaderResult, StreamKind, UnsupportedTypeError};
pub use packet::{DataPacket, EventKind, EventPacket, Packet};
pub use port::{InputPort, PortBinding};
pub use reader::{
    BlockReader, DomainRead, MultiReader, PortConfig, ReadCapabilities, Reader, ReaderConfig,
    SignalReader, ValueRead,
};
pub use sample::{Sample, SampleBuffer};
pub use sample_type::{SampleType, SampleTypeRegistry};
pub use signal::Signal;
pub use status::{EventDescriptor, ReadStatus, ReaderStatus};

/// Common imports for reader users.
pub mod prelude {
    pub use crate::{
        BlockReader, DataDescriptor, DomainMode, InputPort, MultiReader, OutputBuffer, Ratio,
        Reader, ReaderStatus, SampleType, Signal, SignalReader,
    };
}
