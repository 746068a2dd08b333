//! Defect classification of parsed bench files.
//!
//! A characterisation file is defective when any reading leaves the
//! voltage or resistance envelope of its model family, or when its readings
//! span more than the allowed time window. A verification file is defective
//! when any measured loop current leaves the current envelope.
//!
//! # Example
//!
//! ```
//! use calbench_core::{Classification, Thresholds};
//!
//! let thresholds = Thresholds::default();
//! assert_eq!(thresholds.config().current.max, 20.47);
//! # let _ = Classification::Valid;
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, PrimitiveDateTime};

use calbench_types::{ModelFamily, ParsedBody, ParsedFile};

/// Inclusive numeric envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    /// Create a new envelope.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies within the bounds, both ends included.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Bridge envelopes for one model family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FamilyBounds {
    /// Bridge voltage in mV.
    pub voltage: Range,
    /// Bridge resistance in Ω.
    pub resistance: Range,
}

/// Configuration for defect thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Longest allowed span between the first and last reading, in hours.
    pub max_spread_hours: i64,
    pub eni100: FamilyBounds,
    pub eni12: FamilyBounds,
    pub eni12m: FamilyBounds,
    /// Used when the header names no known family.
    pub unknown: FamilyBounds,
    /// Loop current envelope for verification runs, in mA.
    pub current: Range,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_spread_hours: 7 * 24,
            eni100: FamilyBounds {
                voltage: Range::new(-200.0, 200.0),
                resistance: Range::new(3000.0, 7000.0),
            },
            eni12: FamilyBounds {
                voltage: Range::new(-200.0, 200.0),
                resistance: Range::new(2000.0, 6000.0),
            },
            eni12m: FamilyBounds {
                voltage: Range::new(-200.0, 200.0),
                resistance: Range::new(2000.0, 6000.0),
            },
            unknown: FamilyBounds {
                voltage: Range::new(-500.0, 500.0),
                resistance: Range::new(0.0, 100_000.0),
            },
            current: Range::new(3.8, 20.47),
        }
    }
}

impl ThresholdConfig {
    /// Bounds applied to readings of `family`.
    pub fn bounds_for(&self, family: ModelFamily) -> &FamilyBounds {
        match family {
            ModelFamily::EnI100 => &self.eni100,
            ModelFamily::EnI12 => &self.eni12,
            ModelFamily::EnI12M => &self.eni12m,
            ModelFamily::Unknown => &self.unknown,
        }
    }

    /// Allowed reading span as a duration.
    pub fn max_spread(&self) -> Duration {
        Duration::hours(self.max_spread_hours)
    }
}

/// Why a file was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DefectReason {
    VoltageOutOfRange {
        value: f64,
        bounds: Range,
        at: PrimitiveDateTime,
    },
    ResistanceOutOfRange {
        value: f64,
        bounds: Range,
        at: PrimitiveDateTime,
    },
    /// Readings span more than the allowed window.
    DateSpread { spread_hours: f64, max_hours: i64 },
    CurrentOutOfRange {
        value: f64,
        bounds: Range,
        at: PrimitiveDateTime,
    },
}

impl fmt::Display for DefectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefectReason::VoltageOutOfRange { value, bounds, at } => {
                write!(f, "voltage {value} mV outside {bounds} at {at}")
            }
            DefectReason::ResistanceOutOfRange { value, bounds, at } => {
                write!(f, "resistance {value} Ω outside {bounds} at {at}")
            }
            DefectReason::DateSpread {
                spread_hours,
                max_hours,
            } => write!(
                f,
                "readings span {spread_hours:.1} h, more than {max_hours} h"
            ),
            DefectReason::CurrentOutOfRange { value, bounds, at } => {
                write!(f, "loop current {value} mA outside {bounds} at {at}")
            }
        }
    }
}

/// Result of classifying one file.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Valid,
    Defective(DefectReason),
}

impl Classification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Classification::Valid)
    }
}

/// Defect classifier.
#[derive(Debug, Clone, Default)]
pub struct Thresholds {
    config: ThresholdConfig,
}

impl Thresholds {
    /// Create a classifier with custom configuration.
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Classify a parsed file. The first violation found is reported.
    pub fn classify(&self, file: &ParsedFile) -> Classification {
        match &file.body {
            ParsedBody::Characterisation { readings, .. } => {
                let bounds = self.config.bounds_for(file.header.family);
                for r in readings {
                    if !r.missing.voltage && !bounds.voltage.contains(r.voltage) {
                        return Classification::Defective(DefectReason::VoltageOutOfRange {
                            value: r.voltage,
                            bounds: bounds.voltage,
                            at: r.timestamp,
                        });
                    }
                    if !r.missing.resistance && !bounds.resistance.contains(r.resistance) {
                        return Classification::Defective(DefectReason::ResistanceOutOfRange {
                            value: r.resistance,
                            bounds: bounds.resistance,
                            at: r.timestamp,
                        });
                    }
                }

                let first = readings.iter().map(|r| r.timestamp).min();
                let last = readings.iter().map(|r| r.timestamp).max();
                if let (Some(first), Some(last)) = (first, last) {
                    let spread = last - first;
                    if spread > self.config.max_spread() {
                        return Classification::Defective(DefectReason::DateSpread {
                            spread_hours: spread.as_seconds_f64() / 3600.0,
                            max_hours: self.config.max_spread_hours,
                        });
                    }
                }
                Classification::Valid
            }
            ParsedBody::Verification { readings } => readings
                .iter()
                .find(|r| !self.config.current.contains(r.current_real))
                .map(|r| {
                    Classification::Defective(DefectReason::CurrentOutOfRange {
                        value: r.current_real,
                        bounds: self.config.current,
                        at: r.timestamp,
                    })
                })
                .unwrap_or(Classification::Valid),
        }
    }
}
