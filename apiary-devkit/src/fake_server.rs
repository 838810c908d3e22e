/*!
Throwaway HTTP backend for exercising `HttpDataSource` end to end.

Every request under `/api` is answered from a table keyed by path and
query (`/colonies/42`, `/sensor-history/42?scope=daily`). Unknown paths get 404.
*/

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A request the fake backend received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct FakeState {
    routes: Mutex<HashMap<String, (u16, String)>>,
    seen: Mutex<Vec<SeenRequest>>,
}

pub struct FakeApi {
    addr: SocketAddr,
    state: Arc<FakeState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeApi {
    /// Binds an ephemeral port on 127.0.0.1 and starts serving.
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.context("binding fake api")?;
        let addr = listener.local_addr()?;
        let state = Arc::new(FakeState::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new().fallback(answer).with_state(state.clone());
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                log::error!("fake api stopped: {}", e);
            }
        });

        log::info!("🧪 Fake API listening on {}", addr);
        Ok(Self { addr, state, shutdown: Some(shutdown_tx) })
    }

    /// Value for `api.base_url`.
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Answers `path` (relative to `/api`, query included) with `status` and a JSON body.
    pub fn route(&self, path: &str, status: u16, body: Value) {
        let body = if status == 204 { String::new() } else { body.to_string() };
        self.route_raw(path, status, &body);
    }

    pub fn route_raw(&self, path: &str, status: u16, body: &str) {
        self.state.routes.lock().insert(path.to_string(), (status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().clone()
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn answer(State(state): State<Arc<FakeState>>, uri: Uri, headers: HeaderMap) -> Response {
    let full = uri.path_and_query().map(|p| p.as_str()).unwrap_or_else(|| uri.path());
    let path = full.strip_prefix("/api").unwrap_or(full).to_string();

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.seen.lock().push(SeenRequest { path: path.clone(), authorization });

    let route = state.routes.lock().get(&path).cloned();
    match route {
        Some((status, body)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
