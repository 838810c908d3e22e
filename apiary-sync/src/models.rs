use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One raw metric reading as the backend sent it. Sensors occasionally
/// report text or nothing at all, so numbers are not assumed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

impl Reading {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n.as_f64().map(Reading::Number).unwrap_or_default(),
            Some(Value::String(s)) => Reading::Text(s.clone()),
            _ => Reading::Missing,
        }
    }

    /// Numeric view of the reading; numeric strings ("34.5") count.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Reading::Number(v) => Some(*v),
            Reading::Text(s) => s.trim().parse::<f64>().ok(),
            Reading::Missing => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reading::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Number(v) => write!(f, "{v:.1}"),
            Reading::Text(s) => f.write_str(s),
            Reading::Missing => f.write_str("--"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Temperature,
    Humidity,
    Weight,
    AcousticState,
}

impl MetricKind {
    /// Metrics that feed derived alerts and chart series.
    pub const NUMERIC: [MetricKind; 3] =
        [MetricKind::Temperature, MetricKind::Humidity, MetricKind::Weight];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "temperature",
            MetricKind::Humidity => "humidity",
            MetricKind::Weight => "weight",
            MetricKind::AcousticState => "acoustic_state",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "°C",
            MetricKind::Humidity => "%",
            MetricKind::Weight => "kg",
            MetricKind::AcousticState => "",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known readings of a colony.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub temperature: Reading,
    pub humidity: Reading,
    pub weight: Reading,
    pub acoustic_state: Reading,
}

impl MetricSnapshot {
    pub fn reading(&self, kind: MetricKind) -> &Reading {
        match kind {
            MetricKind::Temperature => &self.temperature,
            MetricKind::Humidity => &self.humidity,
            MetricKind::Weight => &self.weight,
            MetricKind::AcousticState => &self.acoustic_state,
        }
    }
}

/// One monitored beehive. Only the sync engine creates or replaces these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Colony {
    pub id: String,
    pub name: String,
    pub apiary: Option<String>,
    pub image_url: Option<String>,
    pub metrics: MetricSnapshot,
    /// Instant at which the engine last saw this colony's content change.
    pub last_synced: DateTime<Utc>,
}

impl Colony {
    /// Equality ignoring the sync stamp.
    pub fn same_content(&self, other: &Colony) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.apiary == other.apiary
            && self.image_url == other.image_url
            && self.metrics == other.metrics
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Alert,
    Critical,
    Unknown,
}

impl Severity {
    /// Ordering used to pick a colony's worst reading.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Ok => 0,
            Severity::Unknown => 1,
            Severity::Alert => 2,
            Severity::Critical => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Ok => "ok",
            Severity::Alert => "alert",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Client-side alert derived from thresholds. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub colony_id: String,
    pub category: MetricKind,
    pub severity: Severity,
    pub observed_value: Reading,
}

/// Operator workflow state of a server-persisted alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Pending,
    Resolved,
    Unknown,
}

impl WorkflowState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pendiente" | "pending" => WorkflowState::Pending,
            "resuelta" | "resolved" => WorkflowState::Resolved,
            _ => WorkflowState::Unknown,
        }
    }
}

/// Alert stored by the backend (`GET /alerts/{colonyId}`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerAlert {
    pub id: String,
    pub colony_id: String,
    pub title: String,
    pub description: String,
    pub state: WorkflowState,
    pub raised_at_ms: Option<i64>,
}

/// One sensor-history record as received; interpreted by the series builder.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawHistoryRecord {
    #[serde(default, alias = "fecha", alias = "date")]
    pub timestamp: Option<Value>,
    #[serde(default, alias = "temperatura_promedio", alias = "temperatura")]
    pub temperature: Option<Value>,
    #[serde(default, alias = "humedad_promedio", alias = "humedad")]
    pub humidity: Option<Value>,
    #[serde(default, alias = "peso_promedio", alias = "peso")]
    pub weight: Option<Value>,
}

impl RawHistoryRecord {
    pub fn metric(&self, kind: MetricKind) -> Option<&Value> {
        match kind {
            MetricKind::Temperature => self.temperature.as_ref(),
            MetricKind::Humidity => self.humidity.as_ref(),
            MetricKind::Weight => self.weight.as_ref(),
            MetricKind::AcousticState => None,
        }
    }
}

/// Chart-ready telemetry point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSample {
    pub instant_ms: i64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub weight: Option<f64>,
}

impl MetricSample {
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Temperature => self.temperature,
            MetricKind::Humidity => self.humidity,
            MetricKind::Weight => self.weight,
            MetricKind::AcousticState => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_from_value() {
        assert_eq!(Reading::from_value(Some(&serde_json::json!(34.5))), Reading::Number(34.5));
        assert_eq!(Reading::from_value(Some(&serde_json::json!("Activa"))), Reading::Text("Activa".into()));
        assert_eq!(Reading::from_value(Some(&Value::Null)), Reading::Missing);
        assert_eq!(Reading::from_value(Some(&serde_json::json!(true))), Reading::Missing);
        assert_eq!(Reading::from_value(None), Reading::Missing);
    }

    #[test]
    fn test_reading_numeric_view() {
        assert_eq!(Reading::Text(" 61.2 ".into()).as_number(), Some(61.2));
        assert_eq!(Reading::Text("n/a".into()).as_number(), None);
        assert_eq!(Reading::Missing.as_number(), None);
        assert_eq!(Reading::Missing.to_string(), "--");
        assert_eq!(Reading::Number(34.0).to_string(), "34.0");
    }

    #[test]
    fn test_workflow_state_parse() {
        assert_eq!(WorkflowState::parse("pendiente"), WorkflowState::Pending);
        assert_eq!(WorkflowState::parse("Resuelta"), WorkflowState::Resolved);
        assert_eq!(WorkflowState::parse("resolved"), WorkflowState::Resolved);
        assert_eq!(WorkflowState::parse("archived"), WorkflowState::Unknown);
    }

    #[test]
    fn test_history_record_aliases() {
        let rec: RawHistoryRecord = serde_json::from_value(serde_json::json!({
            "fecha": "2025-07-01",
            "temperatura_promedio": 34.2,
            "humedad_promedio": 60,
            "peso_promedio": "45.5"
        }))
        .unwrap();
        assert_eq!(rec.timestamp, Some(serde_json::json!("2025-07-01")));
        assert_eq!(rec.metric(MetricKind::Humidity), Some(&serde_json::json!(60)));
        assert_eq!(rec.metric(MetricKind::AcousticState), None);
    }

    #[test]
    fn test_severity_rank() {
        assert!(Severity::Critical.rank() > Severity::Alert.rank());
        assert!(Severity::Alert.rank() > Severity::Unknown.rank());
        assert!(Severity::Unknown.rank() > Severity::Ok.rank());
    }
}
