//! Apiary-level aggregates used by the dashboard widgets and the reports view.

use crate::alerts::{count_active, worst_severity};
use crate::models::{Colony, MetricKind, MetricSample, Severity};
use crate::timestamp::to_utc;
use chrono::TimeZone;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiarySummary {
    pub total: usize,
    pub healthy: usize,
    pub alert: usize,
    pub critical: usize,
    pub unknown: usize,
    pub active_alerts: usize,
    pub average_temperature: Option<f64>,
    pub average_humidity: Option<f64>,
    pub average_weight: Option<f64>,
}

impl ApiarySummary {
    pub fn from_colonies(colonies: &[Colony]) -> Self {
        let mut summary = ApiarySummary {
            total: colonies.len(),
            active_alerts: count_active(colonies),
            average_temperature: average(colonies, MetricKind::Temperature),
            average_humidity: average(colonies, MetricKind::Humidity),
            average_weight: average(colonies, MetricKind::Weight),
            ..Default::default()
        };

        for colony in colonies {
            match worst_severity(colony) {
                Severity::Ok => summary.healthy += 1,
                Severity::Alert => summary.alert += 1,
                Severity::Critical => summary.critical += 1,
                Severity::Unknown => summary.unknown += 1,
            }
        }

        summary
    }

    /// Colonies needing attention (alert or critical).
    pub fn attention(&self) -> usize {
        self.alert + self.critical
    }
}

fn average(colonies: &[Colony], kind: MetricKind) -> Option<f64> {
    let values: Vec<f64> = colonies
        .iter()
        .filter_map(|c| c.metrics.reading(kind).as_number())
        .filter(|v| v.is_finite())
        .collect();
    mean(&values)
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    /// `YYYY-MM` in the viewer's zone.
    pub month: String,
    pub value: f64,
}

/// Monthly means of one metric, ascending by month (annual trend chart).
pub fn monthly_averages<Tz: TimeZone>(
    samples: &[MetricSample],
    kind: MetricKind,
    tz: &Tz,
) -> Vec<MonthlyPoint> {
    let mut buckets: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for sample in samples {
        let (Some(value), Some(utc)) = (sample.value(kind), to_utc(sample.instant_ms)) else {
            continue;
        };
        let month = utc.with_timezone(tz).naive_local().format("%Y-%m").to_string();
        buckets.entry(month).or_default().push(value);
    }

    buckets
        .into_iter()
        .filter_map(|(month, values)| mean(&values).map(|value| MonthlyPoint { month, value }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricSnapshot, Reading};
    use chrono::{FixedOffset, Utc};

    fn colony(id: &str, t: Reading, h: f64, w: f64, acoustic: &str) -> Colony {
        Colony {
            id: id.into(),
            name: id.into(),
            apiary: Some("Apiario Norte".into()),
            image_url: None,
            metrics: MetricSnapshot {
                temperature: t,
                humidity: Reading::Number(h),
                weight: Reading::Number(w),
                acoustic_state: Reading::Text(acoustic.into()),
            },
            last_synced: Utc::now(),
        }
    }

    #[test]
    fn test_summary_buckets_and_averages() {
        let set = vec![
            colony("h1", Reading::Number(34.0), 60.0, 45.0, "Activa"),
            colony("h2", Reading::Number(37.0), 60.0, 45.0, "Activa"),
            colony("h3", Reading::Number(39.0), 80.0, 25.0, "Activa"),
            colony("h4", Reading::Missing, 60.0, 45.0, "Activa"),
        ];
        let summary = ApiarySummary::from_colonies(&set);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.healthy, 1);
        assert_eq!(summary.alert, 1);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.attention(), 2);
        assert_eq!(summary.active_alerts, 1 + 3 + 1);
        assert_eq!(summary.average_temperature, Some((34.0 + 37.0 + 39.0) / 3.0));
        assert_eq!(summary.average_weight, Some((45.0 * 3.0 + 25.0) / 4.0));
    }

    #[test]
    fn test_silent_queen_marks_colony_in_alert() {
        let set = vec![colony("h1", Reading::Number(34.0), 60.0, 45.0, "Silenciosa")];
        let summary = ApiarySummary::from_colonies(&set);
        assert_eq!(summary.healthy, 0);
        assert_eq!(summary.alert, 1);
        assert_eq!(summary.active_alerts, 0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = ApiarySummary::from_colonies(&[]);
        assert_eq!(summary, ApiarySummary::default());
    }

    #[test]
    fn test_monthly_averages() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let at = |m: u32, d: u32, w: Option<f64>| MetricSample {
            instant_ms: tz.with_ymd_and_hms(2025, m, d, 12, 0, 0).unwrap().timestamp_millis(),
            temperature: None,
            humidity: None,
            weight: w,
        };
        let samples = vec![at(6, 1, Some(50.0)), at(5, 3, Some(40.0)), at(6, 20, Some(54.0)), at(7, 1, None)];
        let trend = monthly_averages(&samples, MetricKind::Weight, &tz);
        assert_eq!(
            trend,
            vec![
                MonthlyPoint { month: "2025-05".into(), value: 40.0 },
                MonthlyPoint { month: "2025-06".into(), value: 52.0 },
            ]
        );
    }

    #[test]
    fn test_monthly_bucket_follows_viewer_zone() {
        // 2025-01-31 23:30 UTC is already February in UTC+02:00.
        let instant_ms = Utc.with_ymd_and_hms(2025, 1, 31, 23, 30, 0).unwrap().timestamp_millis();
        let samples = [MetricSample { instant_ms, temperature: None, humidity: None, weight: Some(48.0) }];

        let utc = monthly_averages(&samples, MetricKind::Weight, &Utc);
        let east = monthly_averages(&samples, MetricKind::Weight, &FixedOffset::east_opt(7200).unwrap());
        assert_eq!(utc[0].month, "2025-01");
        assert_eq!(east[0].month, "2025-02");
    }
}
