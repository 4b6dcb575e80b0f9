//! Domain conversion: native ticks or wall-clock nanoseconds.
//!
//! In [`DomainMode::Native`] the domain stream is read like any other stream,
//! using the type resolved from the port's domain descriptor. In
//! [`DomainMode::WallClock`] the reader always reads the ticks as `i64` and then
//! rewrites them in place into nanoseconds since the Unix epoch using the
//! domain's tick resolution and origin. The result is tagged as a date-time
//! buffer even though its storage is plain `Int64`.

use crate::descriptor::{DataDescriptor, Ratio};
use serde::{Deserialize, Serialize};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// How a reader materializes the domain stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainMode {
    /// Pass-through in the domain's own (or configured) sample type.
    #[default]
    Native,
    /// `Int64` nanoseconds since the Unix epoch, tagged as date-time.
    WallClock,
}

/// Converts native domain ticks of one descriptor into wall-clock nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainConverter {
    resolution: Ratio,
    origin_ns: i64,
}

impl DomainConverter {
    /// Converter for ticks of `resolution` seconds counted from `origin_ns`.
    pub fn new(resolution: Ratio, origin_ns: i64) -> Self {
        Self {
            resolution,
            origin_ns,
        }
    }

    /// Converter matching a domain descriptor.
    pub fn for_descriptor(descriptor: &DataDescriptor) -> Self {
        Self::new(descriptor.tick_resolution(), descriptor.origin_ns())
    }

    /// Nanoseconds since the Unix epoch for one tick value, saturating at the
    /// `i64` range.
    pub fn tick_to_ns(&self, tick: i64) -> i64 {
        let num = i128::from(self.resolution.numerator());
        let den = i128::from(self.resolution.denominator());
        let since_origin = i128::from(tick)
            .checked_mul(num)
            .and_then(|v| v.checked_mul(NANOS_PER_SECOND))
            .map(|v| v / den)
            .unwrap_or(if (tick < 0) != (num < 0) {
                i128::MIN
            } else {
                i128::MAX
            });
        let ns = i128::from(self.origin_ns).saturating_add(since_origin);
        ns.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }

    /// Rewrite a slice of ticks into nanoseconds.
    pub fn convert_in_place(&self, ticks: &mut [i64]) {
        for tick in ticks.iter_mut() {
            *tick = self.tick_to_ns(*tick);
        }
    }
}
