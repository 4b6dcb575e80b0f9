//! Lock-step reader over several ports.

use super::{delegate_signal_reader, PortConfig, ReadCapabilities, ReaderConfig, ReaderCore};
use crate::config::ReaderSettings;
use crate::error::{ReaderError, ReaderResult};
use crate::port::InputPort;
use crate::sample_type::SampleType;
use std::sync::Arc;

/// Reads `P` ports in lock-step.
///
/// A read of `count` returns shape `(P, count)`: row `p` holds port `p`'s samples
/// contiguously, and column `k` holds the k-th sample each port delivered since
/// the reader was bound. Row strides stay `count * element_size` even when a
/// timeout returns fewer than `count` columns.
///
/// All ports must currently share one value type (and one domain type when the
/// domain is read natively); a mix of readable source types is converted to the
/// type of the first port, or to the configured read type.
#[derive(Debug)]
pub struct MultiReader {
    core: ReaderCore,
    port_count: usize,
}

impl MultiReader {
    /// Bind every port in `ports`, in row order.
    pub fn new(ports: &[Arc<InputPort>]) -> ReaderResult<Self> {
        Self::from_config(&PortConfig::multi(ports))
    }

    /// Bind `ports` using loaded settings.
    pub fn from_settings(ports: &[Arc<InputPort>], settings: &ReaderSettings) -> ReaderResult<Self> {
        Self::from_config(&PortConfig::multi(ports).with_settings(settings))
    }

    /// Bind the ports of `config`, which must expose a port count.
    pub fn from_config(config: &(impl ReaderConfig + ?Sized)) -> ReaderResult<Self> {
        let port_count = config.input_ports().len();
        if port_count == 0 {
            return Err(ReaderError::Configuration(
                "MultiReader needs at least one input port".to_string(),
            ));
        }
        if config.port_count() != Some(port_count) {
            return Err(ReaderError::Configuration(format!(
                "port count capability {:?} does not match {} input ports",
                config.port_count(),
                port_count
            )));
        }
        Ok(Self {
            core: ReaderCore::new(config)?,
            port_count,
        })
    }

    /// The bound ports, in row order.
    pub fn ports(&self) -> Vec<Arc<InputPort>> {
        self.core.ports().cloned().collect()
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

impl ReadCapabilities for MultiReader {
    fn port_count(&self) -> Option<usize> {
        Some(self.port_count)
    }
}

delegate_signal_reader!(MultiReader);
