//! Backend endpoints and payload decoding.
//!
//! The backend still speaks its legacy (Spanish) field names; English names
//! are accepted as aliases. Status codes are interpreted here and only here.

use crate::error::SourceError;
use crate::models::{Colony, MetricSnapshot, RawHistoryRecord, Reading, ServerAlert, WorkflowState};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryScope {
    /// Readings of the current day (hive detail charts).
    Daily,
    /// Whole retained history (reports).
    Full,
}

impl HistoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryScope::Daily => "daily",
            HistoryScope::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Colonies,
    Colony(String),
    Alerts(String),
    SensorHistory { colony_id: String, scope: HistoryScope },
}

impl Endpoint {
    /// Path relative to the API base URL, query included.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Colonies => "/colonies".to_string(),
            Endpoint::Colony(id) => format!("/colonies/{id}"),
            Endpoint::Alerts(id) => format!("/alerts/{id}"),
            Endpoint::SensorHistory { colony_id, scope } => {
                format!("/sensor-history/{colony_id}?scope={}", scope.as_str())
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {}", self.path())
    }
}

/// Status line and body of one answered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn no_content() -> Self {
        Self::new(204, "")
    }
}

/// Result of `GET /colonies/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ColonyLookup {
    Found(Colony),
    /// 200 with an empty array, or 404: the colony no longer exists.
    NotFound,
    /// 204: nothing to show yet, not an error.
    Empty,
}

#[derive(Debug, Deserialize)]
struct WireColony {
    #[serde(default, alias = "colmena_id")]
    id: Option<Value>,
    #[serde(default, alias = "nombre_colmena")]
    name: Option<String>,
    #[serde(default, alias = "nombre_apiario")]
    apiary: Option<String>,
    #[serde(default, alias = "foto_colmena_url")]
    image_url: Option<String>,
    #[serde(default, alias = "temperatura")]
    temperature: Option<Value>,
    #[serde(default, alias = "humedad")]
    humidity: Option<Value>,
    #[serde(default, alias = "peso")]
    weight: Option<Value>,
    #[serde(default, alias = "sonido")]
    acoustic_state: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireAlert {
    #[serde(default, alias = "_id")]
    id: Option<Value>,
    #[serde(default, alias = "colmena_id")]
    colony_id: Option<Value>,
    #[serde(default, alias = "titulo_alerta")]
    title: Option<String>,
    #[serde(default, alias = "descripcion_alerta")]
    description: Option<String>,
    #[serde(default, alias = "estado_alerta")]
    status: Option<String>,
    #[serde(default, alias = "fecha")]
    created_at: Option<Value>,
}

/// Identifiers arrive as strings or integers depending on the backend table.
fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl WireColony {
    fn into_colony(self, synced_at: DateTime<Utc>) -> Option<Colony> {
        let id = identifier(self.id.as_ref())?;
        Some(Colony {
            name: self.name.unwrap_or_default(),
            apiary: non_empty(self.apiary),
            image_url: non_empty(self.image_url),
            metrics: MetricSnapshot {
                temperature: Reading::from_value(self.temperature.as_ref()),
                humidity: Reading::from_value(self.humidity.as_ref()),
                weight: Reading::from_value(self.weight.as_ref()),
                acoustic_state: Reading::from_value(self.acoustic_state.as_ref()),
            },
            last_synced: synced_at,
            id,
        })
    }
}

impl WireAlert {
    fn into_alert(self, default_colony: &str) -> Option<ServerAlert> {
        let id = identifier(self.id.as_ref())?;
        let raised_at_ms = self
            .created_at
            .as_ref()
            .and_then(|v| timestamp::normalize(v).map_err(|e| debug!("alert {}: {}", id, e)).ok());
        Some(ServerAlert {
            colony_id: identifier(self.colony_id.as_ref()).unwrap_or_else(|| default_colony.to_string()),
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            state: self.status.as_deref().map(WorkflowState::parse).unwrap_or(WorkflowState::Unknown),
            raised_at_ms,
            id,
        })
    }
}

fn unexpected(endpoint: &Endpoint, status: u16) -> SourceError {
    SourceError::UnexpectedStatus { endpoint: endpoint.to_string(), status }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Splits a body into its JSON array elements. `accept_object` lets a lone
/// object stand for a one-element array.
fn elements(endpoint: &Endpoint, body: &str, accept_object: bool) -> Result<Vec<Value>, SourceError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SourceError::payload(endpoint.to_string(), e))?;
    match value {
        Value::Array(items) => Ok(items),
        obj @ Value::Object(_) if accept_object => Ok(vec![obj]),
        other => Err(SourceError::payload(
            endpoint.to_string(),
            format!("expected a JSON array, got {}", json_kind(&other)),
        )),
    }
}

/// Decodes each element independently; malformed ones are logged and dropped.
fn decode_each<T, W, F>(endpoint: &Endpoint, items: Vec<Value>, what: &str, convert: F) -> Vec<T>
where
    W: for<'de> Deserialize<'de>,
    F: Fn(W) -> Option<T>,
{
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<W>(item) {
            Ok(wire) => convert(wire),
            Err(e) => {
                debug!("{}: malformed {} record: {}", endpoint, what, e);
                None
            }
        })
        .collect();

    if decoded.len() < total {
        warn!("{}: dropped {} of {} {} records", endpoint, total - decoded.len(), total, what);
    }
    decoded
}

fn colonies_from(endpoint: &Endpoint, items: Vec<Value>, synced_at: DateTime<Utc>) -> Vec<Colony> {
    decode_each(endpoint, items, "colony", |w: WireColony| w.into_colony(synced_at))
}

/// `GET /colonies`: 200 array, or 204 for an empty apiary.
pub fn decode_colonies(
    endpoint: &Endpoint,
    response: &RawResponse,
    synced_at: DateTime<Utc>,
) -> Result<Vec<Colony>, SourceError> {
    match response.status {
        200 => Ok(colonies_from(endpoint, elements(endpoint, &response.body, false)?, synced_at)),
        204 => Ok(Vec::new()),
        status => Err(unexpected(endpoint, status)),
    }
}

/// `GET /colonies/{id}`.
pub fn decode_colony(
    endpoint: &Endpoint,
    response: &RawResponse,
    synced_at: DateTime<Utc>,
) -> Result<ColonyLookup, SourceError> {
    match response.status {
        200 => {
            let items = elements(endpoint, &response.body, true)?;
            if items.is_empty() {
                return Ok(ColonyLookup::NotFound);
            }
            colonies_from(endpoint, items, synced_at)
                .into_iter()
                .next()
                .map(ColonyLookup::Found)
                .ok_or_else(|| SourceError::payload(endpoint.to_string(), "no usable colony record"))
        }
        204 => Ok(ColonyLookup::Empty),
        404 => Ok(ColonyLookup::NotFound),
        status => Err(unexpected(endpoint, status)),
    }
}

/// `GET /alerts/{colonyId}`.
pub fn decode_alerts(
    endpoint: &Endpoint,
    response: &RawResponse,
    colony_id: &str,
) -> Result<Vec<ServerAlert>, SourceError> {
    match response.status {
        200 => {
            let items = elements(endpoint, &response.body, false)?;
            Ok(decode_each(endpoint, items, "alert", |w: WireAlert| w.into_alert(colony_id)))
        }
        204 => Ok(Vec::new()),
        status => Err(unexpected(endpoint, status)),
    }
}

/// `GET /sensor-history/{colonyId}`. Timestamps are left raw for the series builder.
pub fn decode_history(endpoint: &Endpoint, response: &RawResponse) -> Result<Vec<RawHistoryRecord>, SourceError> {
    match response.status {
        200 => {
            let items = elements(endpoint, &response.body, false)?;
            Ok(decode_each(endpoint, items, "history", Some))
        }
        204 => Ok(Vec::new()),
        status => Err(unexpected(endpoint, status)),
    }
}
