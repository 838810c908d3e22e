//! What a view subscribes to, and what it gets back.

use crate::error::SyncError;
use crate::models::{AlertRecord, Colony, MetricSample, ServerAlert};
use crate::report::ApiarySummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewKind {
    Dashboard,
    Hive { colony_id: String },
    Reports { colony_id: Option<String> },
}

/// Identity of a synchronized view. Two keys that differ in any part
/// (colony or tab) are two different sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriptionKey {
    pub view: ViewKind,
    pub tab: Option<String>,
}

impl SubscriptionKey {
    pub fn dashboard() -> Self {
        Self { view: ViewKind::Dashboard, tab: None }
    }

    pub fn hive(colony_id: impl Into<String>) -> Self {
        let colony_id = colony_id.into().trim().to_string();
        Self { view: ViewKind::Hive { colony_id }, tab: None }
    }

    pub fn reports(colony_id: Option<String>) -> Self {
        let colony_id = colony_id.map(|id| id.trim().to_string());
        Self { view: ViewKind::Reports { colony_id }, tab: None }
    }

    pub fn with_tab(mut self, tab: impl Into<String>) -> Self {
        self.tab = Some(tab.into());
        self
    }

    /// Colony the key is scoped to, if any.
    pub fn colony_id(&self) -> Option<&str> {
        match &self.view {
            ViewKind::Dashboard => None,
            ViewKind::Hive { colony_id } => Some(colony_id),
            ViewKind::Reports { colony_id } => colony_id.as_deref(),
        }
    }

    /// A key naming a colony must name a non-blank one.
    pub fn validate(&self) -> Result<(), SyncError> {
        match &self.view {
            ViewKind::Hive { colony_id } if colony_id.is_empty() => {
                Err(SyncError::InvalidKey(format!("{self}: hive view requires a colony id")))
            }
            ViewKind::Reports { colony_id: Some(id) } if id.is_empty() => {
                Err(SyncError::InvalidKey(format!("{self}: selected colony id is blank")))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.view {
            ViewKind::Dashboard => f.write_str("dashboard")?,
            ViewKind::Hive { colony_id } => write!(f, "hive:{colony_id}")?,
            ViewKind::Reports { colony_id: None } => f.write_str("reports")?,
            ViewKind::Reports { colony_id: Some(id) } => write!(f, "reports:{id}")?,
        }
        if let Some(tab) = &self.tab {
            write!(f, "#{tab}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewStatus {
    /// Waiting for the first fetch of the session.
    Loading,
    Ready,
    /// The colony no longer exists; the view should stop showing it.
    NotFound { colony_id: String },
    /// The subscription key is unusable; nothing will be fetched.
    Misconfigured { reason: String },
}

/// Immutable bundle published to the view on every successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub key: SubscriptionKey,
    pub colonies: Vec<Colony>,
    /// Threshold-derived alerts, recomputed on every publish.
    pub derived_alerts: Vec<AlertRecord>,
    pub active_alert_count: usize,
    /// Server-persisted alerts carrying the operator workflow state.
    pub server_alerts: Vec<ServerAlert>,
    pub series: Vec<MetricSample>,
    pub summary: ApiarySummary,
    pub last_sync: Option<DateTime<Utc>>,
    pub is_loading_initial: bool,
    pub status: ViewStatus,
}

impl Snapshot {
    /// Placeholder published when a session starts or cannot start.
    pub(crate) fn empty(key: SubscriptionKey, status: ViewStatus) -> Self {
        Self {
            is_loading_initial: status == ViewStatus::Loading,
            key,
            colonies: Vec::new(),
            derived_alerts: Vec::new(),
            active_alert_count: 0,
            server_alerts: Vec::new(),
            series: Vec::new(),
            summary: ApiarySummary::default(),
            last_sync: None,
            status,
        }
    }

    pub fn colony(&self, id: &str) -> Option<&Colony> {
        self.colonies.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_identity() {
        assert_eq!(SubscriptionKey::dashboard().to_string(), "dashboard");
        assert_eq!(SubscriptionKey::hive(" 42 ").to_string(), "hive:42");
        assert_eq!(SubscriptionKey::hive("42").with_tab("alerts").to_string(), "hive:42#alerts");
        assert_eq!(SubscriptionKey::reports(None).to_string(), "reports");
        assert_eq!(SubscriptionKey::reports(Some("7".into())).to_string(), "reports:7");

        assert_eq!(SubscriptionKey::hive("42"), SubscriptionKey::hive("42 "));
        assert_ne!(SubscriptionKey::hive("42"), SubscriptionKey::hive("42").with_tab("history"));
    }

    #[test]
    fn test_key_validation() {
        assert!(SubscriptionKey::dashboard().validate().is_ok());
        assert!(SubscriptionKey::hive("42").validate().is_ok());
        assert!(SubscriptionKey::reports(None).validate().is_ok());
        assert!(matches!(SubscriptionKey::hive("  ").validate(), Err(SyncError::InvalidKey(_))));
        assert!(SubscriptionKey::reports(Some(String::new())).validate().is_err());
    }

    #[test]
    fn test_empty_snapshot() {
        let loading = Snapshot::empty(SubscriptionKey::dashboard(), ViewStatus::Loading);
        assert!(loading.is_loading_initial);
        assert!(loading.colonies.is_empty());

        let broken = Snapshot::empty(
            SubscriptionKey::hive(""),
            ViewStatus::Misconfigured { reason: "missing id".into() },
        );
        assert!(!broken.is_loading_initial);
        assert_eq!(broken.last_sync, None);
    }
}
