/*!
Mock data source for running the engine without a backend.

Replies are scripted per endpoint path. Queued replies are consumed in
order and the last one sticks, so a test scripts only the transitions it
cares about. Unscripted endpoints answer `204 No Content`.
*/

use apiary_sync::{DataSource, Endpoint, RawResponse, SourceError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(RawResponse),
    TransportError(String),
}

/// Closed gate holding fetches until released.
struct Gate {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    async fn pass(&self) {
        loop {
            let notified = self.notify.notified();
            if self.open.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Gate>>>,
    completed: AtomicUsize,
}

/// Scripted `DataSource`. Clones share their script and request log.
#[derive(Clone, Default)]
pub struct MockDataSource {
    inner: Arc<Inner>,
}

impl MockDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for `endpoint`.
    pub fn push(&self, endpoint: &Endpoint, reply: MockReply) -> &Self {
        self.inner
            .scripts
            .lock()
            .entry(endpoint.path())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn respond(&self, endpoint: &Endpoint, status: u16, body: Value) -> &Self {
        let body = if status == 204 { String::new() } else { body.to_string() };
        self.push(endpoint, MockReply::Respond(RawResponse::new(status, body)))
    }

    pub fn respond_raw(&self, endpoint: &Endpoint, status: u16, body: &str) -> &Self {
        self.push(endpoint, MockReply::Respond(RawResponse::new(status, body)))
    }

    pub fn fail(&self, endpoint: &Endpoint, message: &str) -> &Self {
        self.push(endpoint, MockReply::TransportError(message.to_string()))
    }

    /// Drops whatever is scripted for `endpoint` and queues `reply` alone.
    pub fn replace(&self, endpoint: &Endpoint, reply: MockReply) -> &Self {
        self.inner.scripts.lock().insert(endpoint.path(), VecDeque::from([reply]));
        self
    }

    /// From now on, fetches block (after being logged) until [`release`](Self::release).
    pub fn hold(&self) {
        let gate = Arc::new(Gate { open: AtomicBool::new(false), notify: Notify::new() });
        *self.inner.gate.lock() = Some(gate);
    }

    /// Lets every held fetch complete and stops holding new ones.
    pub fn release(&self) {
        if let Some(gate) = self.inner.gate.lock().take() {
            gate.open.store(true, Ordering::SeqCst);
            gate.notify.notify_waiters();
        }
    }

    /// Paths requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.inner.requests.lock().clone()
    }

    pub fn request_count(&self, endpoint: &Endpoint) -> usize {
        let path = endpoint.path();
        self.inner.requests.lock().iter().filter(|p| **p == path).count()
    }

    /// Fetches that have returned a reply (or error).
    pub fn completed(&self) -> usize {
        self.inner.completed.load(Ordering::SeqCst)
    }

    fn next_reply(&self, path: &str) -> MockReply {
        let mut scripts = self.inner.scripts.lock();
        match scripts.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(no_content),
            Some(queue) => queue.front().cloned().unwrap_or_else(no_content),
            None => no_content(),
        }
    }
}

fn no_content() -> MockReply {
    MockReply::Respond(RawResponse::no_content())
}

impl DataSource for MockDataSource {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<RawResponse, SourceError> {
        let path = endpoint.path();
        self.inner.requests.lock().push(path.clone());
        log::debug!("[MOCK] {}", endpoint);

        let gate = self.inner.gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let reply = self.next_reply(&path);
        self.inner.completed.fetch_add(1, Ordering::SeqCst);
        match reply {
            MockReply::Respond(response) => Ok(response),
            MockReply::TransportError(message) => Err(SourceError::transport(endpoint.to_string(), message)),
        }
    }
}
