//! Time-series pipeline: raw sensor history -> ordered, chart-ready samples.
//!
//! Records whose timestamp cannot be normalized are dropped, never
//! interpolated or stamped with "now". The output is rebuilt from scratch on
//! every call and is sorted ascending by instant (stable on ties).

use crate::models::{MetricKind, MetricSample, RawHistoryRecord, Reading};
use crate::timestamp::{self, to_utc};
use chrono::{DateTime, NaiveDate, TimeZone};
use serde::Serialize;
use tracing::{debug, warn};

/// Single-metric projection of a series, ready for a line chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub instant_ms: i64,
    pub value: f64,
}

pub fn build(records: &[RawHistoryRecord], metrics: &[MetricKind]) -> Vec<MetricSample> {
    let mut dropped = 0usize;

    let mut samples: Vec<MetricSample> = records
        .iter()
        .filter_map(|record| {
            let instant_ms = match record.timestamp.as_ref().map(timestamp::normalize) {
                Some(Ok(ms)) => ms,
                Some(Err(e)) => {
                    debug!("dropping history record: {}", e);
                    dropped += 1;
                    return None;
                }
                None => {
                    debug!("dropping history record without timestamp");
                    dropped += 1;
                    return None;
                }
            };
            sample_from(record, instant_ms, metrics)
        })
        .collect();

    if dropped > 0 {
        warn!("{} of {} history records had unusable timestamps", dropped, records.len());
    }

    samples.sort_by_key(|s| s.instant_ms);
    samples
}

fn sample_from(record: &RawHistoryRecord, instant_ms: i64, metrics: &[MetricKind]) -> Option<MetricSample> {
    let mut sample = MetricSample { instant_ms, temperature: None, humidity: None, weight: None };
    let mut present = false;

    for &kind in metrics {
        let value = Reading::from_value(record.metric(kind))
            .as_number()
            .filter(|v| v.is_finite());
        let Some(value) = value else { continue };
        match kind {
            MetricKind::Temperature => sample.temperature = Some(value),
            MetricKind::Humidity => sample.humidity = Some(value),
            MetricKind::Weight => sample.weight = Some(value),
            MetricKind::AcousticState => continue,
        }
        present = true;
    }

    present.then_some(sample)
}

/// Projects one metric out of a series, skipping samples that lack it.
pub fn points(samples: &[MetricSample], kind: MetricKind) -> Vec<ChartPoint> {
    samples
        .iter()
        .filter_map(|s| s.value(kind).map(|value| ChartPoint { instant_ms: s.instant_ms, value }))
        .collect()
}

/// True when `instant_ms` falls on the same calendar day as `now`, in `now`'s
/// zone. Resets at local midnight, not 24h after the first sample.
pub fn is_same_local_day<Tz: TimeZone>(instant_ms: i64, now: &DateTime<Tz>) -> bool {
    match to_utc(instant_ms) {
        Some(utc) => utc.with_timezone(&now.timezone()).date_naive() == now.date_naive(),
        None => false,
    }
}

/// Samples of the current local day, for the "today only" drill-down.
pub fn today_only<Tz: TimeZone>(samples: &[MetricSample], now: &DateTime<Tz>) -> Vec<MetricSample> {
    samples.iter().copied().filter(|s| is_same_local_day(s.instant_ms, now)).collect()
}

/// Inclusive calendar-day range filter (reports view).
pub fn within_days<Tz: TimeZone>(
    samples: &[MetricSample],
    start: NaiveDate,
    end: NaiveDate,
    tz: &Tz,
) -> Vec<MetricSample> {
    samples
        .iter()
        .copied()
        .filter(|s| {
            to_utc(s.instant_ms)
                .map(|utc| utc.with_timezone(tz).date_naive())
                .is_some_and(|day| day >= start && day <= end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use serde_json::json;

    fn record(ts: serde_json::Value, t: f64) -> RawHistoryRecord {
        RawHistoryRecord {
            timestamp: Some(ts),
            temperature: Some(json!(t)),
            humidity: Some(json!(60.0)),
            weight: None,
        }
    }

    #[test]
    fn test_unparseable_record_is_dropped() {
        let records = vec![
            record(json!("2025-07-01T10:00:00Z"), 33.0),
            record(json!("no es una fecha"), 99.0),
            record(json!("2025-07-01T11:00:00Z"), 34.0),
        ];
        let series = build(&records, &MetricKind::NUMERIC);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].temperature, Some(33.0));
        assert_eq!(series[1].temperature, Some(34.0));
    }

    #[test]
    fn test_output_sorted_and_stable() {
        let records = vec![
            record(json!("2025-07-03"), 1.0),
            record(json!("2025-07-01"), 2.0),
            record(json!("2025-07-02T00:00:00+00:00"), 3.0),
            record(json!("2025-07-01T00:00:00Z"), 4.0),
        ];
        let series = build(&records, &[MetricKind::Temperature]);
        let temps: Vec<_> = series.iter().filter_map(|s| s.temperature).collect();
        assert_eq!(temps, vec![2.0, 4.0, 3.0, 1.0]);
        assert!(series.windows(2).all(|w| w[0].instant_ms <= w[1].instant_ms));
        assert!(series.len() <= records.len());
    }

    #[test]
    fn test_only_requested_metrics_are_kept() {
        let records = vec![record(json!("2025-07-01"), 33.0)];
        let series = build(&records, &[MetricKind::Humidity]);
        assert_eq!(series[0].temperature, None);
        assert_eq!(series[0].humidity, Some(60.0));

        // Weight is absent on the record: nothing to emit.
        assert!(build(&records, &[MetricKind::Weight]).is_empty());
    }

    #[test]
    fn test_missing_timestamp_and_empty_input() {
        let mut rec = record(json!("2025-07-01"), 33.0);
        rec.timestamp = None;
        assert!(build(&[rec], &MetricKind::NUMERIC).is_empty());
        assert!(build(&[], &MetricKind::NUMERIC).is_empty());
    }

    #[test]
    fn test_points_projection() {
        let records = vec![
            record(json!("2025-07-01"), 33.0),
            RawHistoryRecord {
                timestamp: Some(json!("2025-07-02")),
                humidity: Some(json!(55)),
                ..Default::default()
            },
        ];
        let series = build(&records, &MetricKind::NUMERIC);
        assert_eq!(points(&series, MetricKind::Temperature).len(), 1);
        assert_eq!(points(&series, MetricKind::Humidity).len(), 2);
    }

    #[test]
    fn test_today_uses_calendar_day_not_rolling_window() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let now = tz.with_ymd_and_hms(2025, 1, 2, 0, 30, 0).unwrap();
        let late_yesterday = tz.with_ymd_and_hms(2025, 1, 1, 23, 50, 0).unwrap().timestamp_millis();
        let early_today = tz.with_ymd_and_hms(2025, 1, 2, 0, 5, 0).unwrap().timestamp_millis();

        // 40 minutes ago, but a different local day.
        assert!(!is_same_local_day(late_yesterday, &now));
        assert!(is_same_local_day(early_today, &now));

        // Same UTC day as `now` in UTC terms would say otherwise.
        let utc_now = now.with_timezone(&Utc);
        assert!(is_same_local_day(late_yesterday, &utc_now));
    }

    #[test]
    fn test_today_only_and_within_days() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let samples: Vec<MetricSample> = [1, 2, 3, 4]
            .iter()
            .map(|d| MetricSample {
                instant_ms: tz.with_ymd_and_hms(2025, 7, *d, 12, 0, 0).unwrap().timestamp_millis(),
                temperature: Some(34.0),
                humidity: None,
                weight: None,
            })
            .collect();

        let now = tz.with_ymd_and_hms(2025, 7, 3, 18, 0, 0).unwrap();
        assert_eq!(today_only(&samples, &now).len(), 1);

        let start = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap();
        assert_eq!(within_days(&samples, start, end, &tz).len(), 2);
        assert!(within_days(&samples, end, start, &tz).is_empty());
    }
}
