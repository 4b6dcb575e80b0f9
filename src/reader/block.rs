//! Fixed-size block reader.

use super::{delegate_signal_reader, PortConfig, ReadCapabilities, ReaderConfig, ReaderCore};
use crate::config::ReaderSettings;
use crate::error::{ReaderError, ReaderResult};
use crate::port::InputPort;
use crate::sample_type::SampleType;
use std::sync::Arc;

/// Reads one port in blocks of `block_size` samples.
///
/// A read of `count` returns `count` whole blocks, shape `(count, block_size)`.
/// Partial blocks are never returned: at timeout they stay queued, and samples
/// that cannot complete a block before an upstream event are discarded.
#[derive(Debug)]
pub struct BlockReader {
    core: ReaderCore,
    block_size: usize,
}

impl BlockReader {
    /// Bind `port` with `block_size` samples per block.
    pub fn new(port: &Arc<InputPort>, block_size: usize) -> ReaderResult<Self> {
        Self::from_config(&PortConfig::block(port, block_size))
    }

    /// Bind `port` using loaded settings, including `settings.block_size`.
    pub fn from_settings(port: &Arc<InputPort>, settings: &ReaderSettings) -> ReaderResult<Self> {
        Self::from_config(&PortConfig::block(port, settings.block_size).with_settings(settings))
    }

    /// Bind the single port of `config`, which must expose a block size.
    pub fn from_config(config: &(impl ReaderConfig + ?Sized)) -> ReaderResult<Self> {
        let block_size = match config.block_size() {
            Some(0) | None => {
                return Err(ReaderError::Configuration(
                    "block size must be at least 1".to_string(),
                ))
            }
            Some(size) => size,
        };
        if config.input_ports().len() != 1 || config.port_count().is_some() {
            return Err(ReaderError::Configuration(format!(
                "BlockReader needs exactly one input port, got {}",
                config.input_ports().len()
            )));
        }
        Ok(Self {
            core: ReaderCore::new(config)?,
            block_size,
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
}

impl ReadCapabilities for BlockReader {
    fn block_size(&self) -> Option<usize> {
        Some(self.block_size)
    }
}

delegate_signal_reader!(BlockReader);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LayoutKind;
    use crate::descriptor::{DataDescriptor, Ratio};
    use crate::reader::{layout_kind, SignalReader};
    use crate::signal::Signal;

    fn source() -> (Arc<Signal>, Arc<InputPort>) {
        let signal = Signal::new(
            DataDescriptor::values("ai0", SampleType::Float64),
            Some(DataDescriptor::linear_time(1, Ratio::new(1, 1_000).unwrap())),
        );
        let port = InputPort::new("ai0");
        signal.connect(&port);
        (signal, port)
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let (_signal, port) = source();
        let err = BlockReader::new(&port, 0).unwrap_err();
        assert!(matches!(err, ReaderError::Configuration(_)));
        assert!(!port.is_bound());
    }

    #[test]
    fn exposes_block_capability() {
        let (_signal, port) = source();
        let reader = BlockReader::new(&port, 4).unwrap();
        assert_eq!(reader.block_size(), Some(4));
        assert_eq!(reader.port_count(), None);
        assert_eq!(layout_kind(&reader), LayoutKind::Block { block_size: 4 });
    }

    #[test]
    fn blocks_are_row_major() {
        let (signal, port) = source();
        let mut reader = BlockReader::new(&port, 3).unwrap();
        signal.send_values((0..6).map(f64::from).collect::<Vec<_>>());

        let read = reader.read(2, 0).unwrap();
        assert_eq!(read.values.shape(), &[2, 3]);
        assert_eq!(read.values.strides(), &[24, 8]);
        assert_eq!(read.values.row::<f64>(1).unwrap(), &[3.0, 4.0, 5.0]);
        assert_eq!(read.values.get::<f64>(&[0, 2]), Some(2.0));
        assert!(read.status.is_complete());
    }

    #[test]
    fn partial_block_stays_queued_at_timeout() {
        let (signal, port) = source();
        let mut reader = BlockReader::new(&port, 4).unwrap();
        signal.send_values(vec![1.0f64; 6]);

        assert_eq!(reader.available_count(), 1);
        let read = reader.read(2, 0).unwrap();
        assert_eq!(read.status.samples_read(), 1);
        assert_eq!(read.values.shape(), &[1, 4]);
        assert!(!read.status.is_complete());

        signal.send_values(vec![2.0f64; 2]);
        let read = reader.read(1, 0).unwrap();
        assert_eq!(read.values.to_vec::<f64>(), vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn domain_shares_block_shape() {
        let (signal, port) = source();
        let mut reader = BlockReader::new(&port, 2).unwrap();
        signal
            .send_with_offset(vec![0.5f64, 1.5, 2.5, 3.5], 10)
            .unwrap();

        let read = reader.read_with_domain(2, 0).unwrap();
        assert_eq!(read.domain.shape(), &[2, 2]);
        assert_eq!(read.domain.to_vec::<i64>(), vec![10, 11, 12, 13]);
    }

    #[test]
    fn skip_counts_blocks() {
        let (signal, port) = source();
        let mut reader = BlockReader::new(&port, 2).unwrap();
        signal.send_values(vec![0.0f64; 5]);
        assert_eq!(reader.skip(5), 2);
        assert_eq!(reader.available_count(), 0);
        assert_eq!(port.queued_packets(), 1);
    }
}
