//! Error types for the reader subsystem.
//!
//! This module defines `ReaderError`, the single error type returned by every
//! fallible operation in the crate. It is derived with `thiserror` so callers can
//! use `?` freely and still match on the category.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps `figment::Error` when a settings file or the environment
//!   cannot be parsed into [`ReaderSettings`](crate::config::ReaderSettings).
//! - **`Configuration`**: Semantic setup errors, raised before any data flows
//!   (a statically unsupported read type, a block size of zero, an empty port list).
//! - **`UnsupportedType`**: Raised lazily inside a read when the type resolved from
//!   the live descriptor cannot be materialized into a numeric buffer.
//! - **`InvalidParameter`**: Malformed descriptor data or a destination layout that
//!   does not fit its allocation.
//! - **`PortInUse` / `PortNotConnected`**: Binding a port that another reader owns,
//!   or reading from a port with no upstream signal.
//!
//! Timeouts and upstream events are deliberately absent: they are reported through
//! [`ReaderStatus`](crate::status::ReaderStatus), never through `Err`.

use crate::sample_type::SampleType;
use thiserror::Error;

/// Convenience alias for results using the reader error type.
pub type ReaderResult<T> = std::result::Result<T, ReaderError>;

/// Which of the two streams of a read an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// The sample values.
    Value,
    /// The domain (x-axis) values attached to the samples.
    Domain,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StreamKind::Value => "values",
            StreamKind::Domain => "domain",
        };
        write!(f, "{}", label)
    }
}

/// A resolved sample type cannot be read into a numeric buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unsupported {stream} sample type: {sample_type}")]
pub struct UnsupportedTypeError {
    /// The offending type.
    pub sample_type: SampleType,
    /// Stream the type was resolved for.
    pub stream: StreamKind,
}

impl UnsupportedTypeError {
    /// Create an error for `sample_type` on `stream`.
    pub fn new(sample_type: SampleType, stream: StreamKind) -> Self {
        Self {
            sample_type,
            stream,
        }
    }
}

/// Primary error type for the reader subsystem.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Settings could not be extracted from file or environment.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Setup-time validation failed.
    ///
    /// **Error Type**: Permanent - the reader cannot be built with these settings.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The active value or domain type is outside the readable set.
    ///
    /// **Error Type**: Permanent for the current descriptor. No buffer was touched
    /// and no sample was consumed.
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),

    /// Malformed parameter (descriptor field, buffer layout).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The port is already bound to a live reader.
    #[error("Input port '{0}' is already bound to a reader")]
    PortInUse(String),

    /// The port has no upstream signal.
    #[error("Input port '{0}' is not connected to a signal")]
    PortNotConnected(String),
}

impl From<figment::Error> for ReaderError {
    fn from(err: figment::Error) -> Self {
        ReaderError::Config(Box::new(err))
    }
}
