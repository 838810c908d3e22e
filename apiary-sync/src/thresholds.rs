//! Static health bands for hive metrics.
//!
//! | metric        | ok      | alert                 | critical    |
//! |---------------|---------|-----------------------|-------------|
//! | temperature   | [32,36] | [30,32) ∪ (36,38]     | <30 ∪ >38   |
//! | humidity      | [50,70] | [40,50) ∪ (70,75]     | <40 ∪ >75   |
//! | weight        | >40     | [30,40]               | <30         |
//! | acoustic      | "Activa"| anything else         | -           |

use crate::models::{MetricKind, Reading, Severity};
use serde::Serialize;

/// Acoustic state reported by a colony with an active queen.
pub const ACTIVE_ACOUSTIC_STATE: &str = "Activa";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub severity: Severity,
    pub label: &'static str,
}

impl Classification {
    const OK: Self = Self { severity: Severity::Ok, label: "Normal" };
    const ALERT: Self = Self { severity: Severity::Alert, label: "Alert" };
    const CRITICAL: Self = Self { severity: Severity::Critical, label: "Critical" };
    const UNKNOWN: Self = Self { severity: Severity::Unknown, label: "Unknown" };
}

/// Maps one reading to its severity tier. Pure and total: anything that is
/// not a finite number on a numeric metric is `Unknown`, never `Ok`.
pub fn classify(kind: MetricKind, reading: &Reading) -> Classification {
    if kind == MetricKind::AcousticState {
        return match reading.as_text() {
            Some(state) if state == ACTIVE_ACOUSTIC_STATE => Classification {
                severity: Severity::Ok,
                label: ACTIVE_ACOUSTIC_STATE,
            },
            _ => Classification::ALERT,
        };
    }

    match reading.as_number() {
        Some(value) if value.is_finite() => classify_value(kind, value),
        _ => Classification::UNKNOWN,
    }
}

fn classify_value(kind: MetricKind, v: f64) -> Classification {
    match kind {
        MetricKind::Temperature => {
            if (32.0..=36.0).contains(&v) {
                Classification::OK
            } else if (30.0..32.0).contains(&v) || (v > 36.0 && v <= 38.0) {
                Classification::ALERT
            } else {
                Classification::CRITICAL
            }
        }
        MetricKind::Humidity => {
            if (50.0..=70.0).contains(&v) {
                Classification::OK
            } else if (40.0..50.0).contains(&v) || (v > 70.0 && v <= 75.0) {
                Classification::ALERT
            } else {
                Classification::CRITICAL
            }
        }
        MetricKind::Weight => {
            if v > 40.0 {
                Classification::OK
            } else if (30.0..=40.0).contains(&v) {
                Classification::ALERT
            } else {
                Classification::CRITICAL
            }
        }
        MetricKind::AcousticState => Classification::UNKNOWN,
    }
}
