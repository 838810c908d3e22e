//! Alert derivation.
//!
//! Two alert sources coexist and are never merged:
//! - derived alerts, recomputed from thresholds on every publish;
//! - server alerts, which carry the operator workflow state (pending/resolved).

use crate::models::{AlertRecord, Colony, MetricKind, ServerAlert, Severity, WorkflowState};
use crate::thresholds::classify;

/// Derived alerts for one colony: one record per numeric metric that is not `Ok`.
pub fn derive(colony: &Colony) -> Vec<AlertRecord> {
    MetricKind::NUMERIC
        .iter()
        .filter_map(|&kind| {
            let reading = colony.metrics.reading(kind);
            let classification = classify(kind, reading);
            (classification.severity != Severity::Ok).then(|| AlertRecord {
                colony_id: colony.id.clone(),
                category: kind,
                severity: classification.severity,
                observed_value: reading.clone(),
            })
        })
        .collect()
}

/// Derived alerts for a whole colony set, in colony order.
pub fn derive_all(colonies: &[Colony]) -> Vec<AlertRecord> {
    colonies.iter().flat_map(derive).collect()
}

/// Dashboard badge: total derived alerts across all colonies.
pub fn count_active(colonies: &[Colony]) -> usize {
    colonies.iter().map(|c| derive(c).len()).sum()
}

/// Worst severity over every metric, acoustic state included.
pub fn worst_severity(colony: &Colony) -> Severity {
    [
        MetricKind::Temperature,
        MetricKind::Humidity,
        MetricKind::Weight,
        MetricKind::AcousticState,
    ]
    .iter()
    .map(|&kind| classify(kind, colony.metrics.reading(kind)).severity)
    .max_by_key(Severity::rank)
    .unwrap_or(Severity::Ok)
}

/// Alert list filter of the hive detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertFilter {
    #[default]
    Active,
    Resolved,
    All,
}

impl AlertFilter {
    pub fn matches(&self, alert: &ServerAlert) -> bool {
        match self {
            AlertFilter::Active => alert.state == WorkflowState::Pending,
            AlertFilter::Resolved => alert.state == WorkflowState::Resolved,
            AlertFilter::All => true,
        }
    }
}

pub fn filter_server_alerts(alerts: &[ServerAlert], filter: AlertFilter) -> Vec<&ServerAlert> {
    alerts.iter().filter(|a| filter.matches(a)).collect()
}

/// `(pending, resolved)` counts for the filter buttons.
pub fn count_by_state(alerts: &[ServerAlert]) -> (usize, usize) {
    alerts.iter().fold((0, 0), |(pending, resolved), a| match a.state {
        WorkflowState::Pending => (pending + 1, resolved),
        WorkflowState::Resolved => (pending, resolved + 1),
        WorkflowState::Unknown => (pending, resolved),
    })
}
