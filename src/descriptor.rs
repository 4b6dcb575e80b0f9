//! Data descriptors: what a signal's packets contain and how to interpret them.
//!
//! A descriptor names the sample type, the rule that produces sample values, and
//! for domain signals the tick resolution and origin (epoch). Descriptors are
//! immutable once built and shared behind `Arc` between the producer, the queued
//! packets and the port's active state.

use crate::error::{ReaderError, ReaderResult};
use crate::sample_type::SampleType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Unix epoch in ISO 8601 form; the default origin for time domains.
pub const UNIX_EPOCH_ORIGIN: &str = "1970-01-01T00:00:00Z";

/// Rational scale factor (`numerator / denominator`), denominator strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ratio {
    numerator: i64,
    denominator: i64,
}

impl Ratio {
    /// Create a ratio, rejecting a zero denominator. The sign is normalized onto
    /// the numerator.
    pub fn new(numerator: i64, denominator: i64) -> ReaderResult<Self> {
        if denominator == 0 {
            return Err(ReaderError::InvalidParameter(
                "ratio denominator must not be zero".into(),
            ));
        }
        let (numerator, denominator) = if denominator < 0 {
            (-numerator, -denominator)
        } else {
            (numerator, denominator)
        };
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// `1 / 1`
    pub const fn one() -> Self {
        Self {
            numerator: 1,
            denominator: 1,
        }
    }

    /// Numerator.
    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    /// Denominator (always > 0).
    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    /// Approximate value as `f64`.
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::one()
    }
}

impl std::fmt::Display for Ratio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// How sample values of a packet are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DataRule {
    /// Values are carried in the packet payload.
    Explicit,
    /// Sample `i` of a packet with offset `o` is `o + start + delta * i`.
    Linear {
        /// Increment between consecutive samples.
        delta: i64,
        /// Constant added to every sample.
        start: i64,
    },
    /// Every sample has the same value.
    Constant(f64),
}

impl DataRule {
    /// `true` when packets must carry a payload.
    pub fn is_explicit(&self) -> bool {
        matches!(self, DataRule::Explicit)
    }
}

/// Immutable description of one signal's packets.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDescriptor {
    name: String,
    sample_type: SampleType,
    rule: DataRule,
    tick_resolution: Ratio,
    origin: String,
    origin_ns: i64,
    unit: Option<String>,
}

impl DataDescriptor {
    /// Start building a descriptor.
    pub fn builder() -> DataDescriptorBuilder {
        DataDescriptorBuilder::default()
    }

    /// Shortcut for an explicit value descriptor.
    pub fn values(name: impl Into<String>, sample_type: SampleType) -> Self {
        Self {
            name: name.into(),
            sample_type,
            rule: DataRule::Explicit,
            tick_resolution: Ratio::one(),
            origin: String::new(),
            origin_ns: 0,
            unit: None,
        }
    }

    /// Shortcut for a linear `Int64` time domain starting at the Unix epoch.
    pub fn linear_time(delta: i64, tick_resolution: Ratio) -> Self {
        Self {
            name: "time".into(),
            sample_type: SampleType::Int64,
            rule: DataRule::Linear { delta, start: 0 },
            tick_resolution,
            origin: UNIX_EPOCH_ORIGIN.into(),
            origin_ns: 0,
            unit: Some("s".into()),
        }
    }

    /// Signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared sample type.
    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    /// Value rule.
    pub fn rule(&self) -> DataRule {
        self.rule
    }

    /// Duration of one tick in seconds, as a ratio.
    pub fn tick_resolution(&self) -> Ratio {
        self.tick_resolution
    }

    /// Origin as given (ISO 8601), empty for non-time signals.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Origin as nanoseconds since the Unix epoch.
    pub fn origin_ns(&self) -> i64 {
        self.origin_ns
    }

    /// Physical unit symbol.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

/// Builder for [`DataDescriptor`].
#[derive(Debug, Clone)]
pub struct DataDescriptorBuilder {
    name: String,
    sample_type: SampleType,
    rule: DataRule,
    tick_resolution: Ratio,
    origin: String,
    unit: Option<String>,
}

impl Default for DataDescriptorBuilder {
    fn default() -> Self {
        Self {
            name: String::new(),
            sample_type: SampleType::Undefined,
            rule: DataRule::Explicit,
            tick_resolution: Ratio::one(),
            origin: String::new(),
            unit: None,
        }
    }
}

impl DataDescriptorBuilder {
    /// Set the signal name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the sample type.
    pub fn sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    /// Set the value rule.
    pub fn rule(mut self, rule: DataRule) -> Self {
        self.rule = rule;
        self
    }

    /// Set the tick resolution.
    pub fn tick_resolution(mut self, resolution: Ratio) -> Self {
        self.tick_resolution = resolution;
        self
    }

    /// Set the origin (ISO 8601 date or date-time).
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the unit symbol.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Validate and build. Fails on an origin that is not ISO 8601.
    pub fn build(self) -> ReaderResult<DataDescriptor> {
        let origin_ns = parse_origin_ns(&self.origin)?;
        Ok(DataDescriptor {
            name: self.name,
            sample_type: self.sample_type,
            rule: self.rule,
            tick_resolution: self.tick_resolution,
            origin: self.origin,
            origin_ns,
            unit: self.unit,
        })
    }
}

/// Parse an origin into nanoseconds since the Unix epoch.
///
/// Accepts RFC 3339 date-times and bare `YYYY-MM-DD` dates (midnight UTC). An empty
/// origin means the Unix epoch.
pub fn parse_origin_ns(origin: &str) -> ReaderResult<i64> {
    let origin = origin.trim();
    if origin.is_empty() {
        return Ok(0);
    }

    let instant = match DateTime::parse_from_rfc3339(origin) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => NaiveDate::parse_from_str(origin, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| {
                ReaderError::InvalidParameter(format!("Invalid domain origin '{}'", origin))
            })?,
    };

    instant.timestamp_nanos_opt().ok_or_else(|| {
        ReaderError::InvalidParameter(format!(
            "Domain origin '{}' is outside the nanosecond range",
            origin
        ))
    })
}
