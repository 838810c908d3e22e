/*!
Builders for backend payloads, in the legacy field names the real API sends.
*/

use serde_json::{json, Value};

/// One colony record as `GET /colonies` returns it. Defaults to a healthy hive.
#[derive(Debug, Clone)]
pub struct ColonyFixture {
    pub id: String,
    pub name: String,
    pub apiary: String,
    pub temperature: Value,
    pub humidity: Value,
    pub weight: Value,
    pub sound: Value,
}

impl ColonyFixture {
    pub fn new<S: Into<String>>(id: S) -> Self {
        let id = id.into();
        Self {
            name: format!("Colmena {id}"),
            apiary: "Apiario Central".into(),
            temperature: json!(34.0),
            humidity: json!(60.0),
            weight: json!(45.0),
            sound: json!("Activa"),
            id,
        }
    }

    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn temperature(mut self, value: f64) -> Self {
        self.temperature = json!(value);
        self
    }

    pub fn humidity(mut self, value: f64) -> Self {
        self.humidity = json!(value);
        self
    }

    pub fn weight(mut self, value: f64) -> Self {
        self.weight = json!(value);
        self
    }

    pub fn sound<S: Into<String>>(mut self, state: S) -> Self {
        self.sound = json!(state.into());
        self
    }

    /// Sensor offline: weight reported as null.
    pub fn without_weight(mut self) -> Self {
        self.weight = Value::Null;
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "colmena_id": self.id,
            "nombre_colmena": self.name,
            "nombre_apiario": self.apiary,
            "foto_colmena_url": format!("https://img.example/colmenas/{}.jpg", self.id),
            "temperatura": self.temperature,
            "humedad": self.humidity,
            "peso": self.weight,
            "sonido": self.sound
        })
    }
}

/// Array body for a list of colonies.
pub fn colonies(list: &[ColonyFixture]) -> Value {
    Value::Array(list.iter().map(ColonyFixture::to_json).collect())
}

/// One averaged sensor-history record (`GET /sensor-history/{id}`).
pub fn history_record(fecha: &str, temperature: f64, humidity: f64, weight: f64) -> Value {
    json!({
        "fecha": fecha,
        "temperatura_promedio": temperature,
        "humedad_promedio": humidity,
        "peso_promedio": weight
    })
}

/// One server-persisted alert (`GET /alerts/{id}`); `estado` is `pendiente` or `resuelta`.
pub fn server_alert(id: &str, colony_id: &str, title: &str, estado: &str) -> Value {
    json!({
        "_id": id,
        "colmena_id": colony_id,
        "titulo_alerta": title,
        "descripcion_alerta": format!("{title} en la colmena {colony_id}"),
        "estado_alerta": estado,
        "fecha": chrono::Utc::now().to_rfc3339()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_sync::wire::{decode_alerts, decode_colonies, decode_history};
    use apiary_sync::{Endpoint, HistoryScope, RawResponse, Reading, WorkflowState};

    #[test]
    fn test_fixtures_decode_through_wire_layer() {
        let body = colonies(&[ColonyFixture::new("42").named("Reina Norte").temperature(39.0).without_weight()]);
        let response = RawResponse::new(200, body.to_string());
        let decoded = decode_colonies(&Endpoint::Colonies, &response, chrono::Utc::now()).unwrap();
        assert_eq!(decoded[0].id, "42");
        assert_eq!(decoded[0].name, "Reina Norte");
        assert_eq!(decoded[0].metrics.temperature, Reading::Number(39.0));
        assert_eq!(decoded[0].metrics.weight, Reading::Missing);

        let alerts = json!([server_alert("a1", "42", "Temperatura alta", "pendiente")]);
        let decoded = decode_alerts(
            &Endpoint::Alerts("42".into()),
            &RawResponse::new(200, alerts.to_string()),
            "42",
        )
        .unwrap();
        assert_eq!(decoded[0].state, WorkflowState::Pending);
        assert!(decoded[0].raised_at_ms.is_some());

        let history = json!([history_record("2025-07-01", 34.0, 60.0, 45.0)]);
        let endpoint = Endpoint::SensorHistory { colony_id: "42".into(), scope: HistoryScope::Daily };
        let decoded = decode_history(&endpoint, &RawResponse::new(200, history.to_string())).unwrap();
        assert_eq!(decoded.len(), 1);
    }
}
