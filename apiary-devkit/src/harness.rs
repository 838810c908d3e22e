/*!
Test harness for engine consumers.

`SnapshotRecorder` stands in for a view: hand its callback to
`subscribe`, then await the snapshots you expect.
*/

use anyhow::Result;
use apiary_sync::{Snapshot, Viewport};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
pub struct SnapshotRecorder {
    snapshots: Arc<Mutex<Vec<Snapshot>>>,
}

impl SnapshotRecorder {
    pub fn new() -> Self {
        env_logger::try_init().ok(); // Init logging pour tests
        Self::default()
    }

    /// Callback to pass to `subscribe`; records every delivered snapshot.
    pub fn callback(&self) -> impl FnMut(&Snapshot) + Send + 'static {
        let snapshots = self.snapshots.clone();
        move |snapshot: &Snapshot| snapshots.lock().push(snapshot.clone())
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn last(&self) -> Option<Snapshot> {
        self.snapshots.lock().last().cloned()
    }

    /// Polls until a recorded snapshot matches `predicate`, returning the first match.
    pub async fn wait_for<P>(&self, timeout_ms: u64, predicate: P) -> Result<Snapshot>
    where
        P: Fn(&Snapshot) -> bool,
    {
        let start = Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if let Some(found) = self.snapshots.lock().iter().find(|s| predicate(s)).cloned() {
                return Ok(found);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        log::warn!("⏰ Timeout waiting for snapshot ({} recorded)", self.count());
        anyhow::bail!("no matching snapshot within {timeout_ms}ms ({} recorded)", self.count())
    }

    /// Polls until at least `count` snapshots have been recorded.
    pub async fn wait_for_count(&self, count: usize, timeout_ms: u64) -> Result<()> {
        let start = Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if self.count() >= count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        anyhow::bail!("expected {count} snapshots within {timeout_ms}ms, got {}", self.count())
    }
}

/// Viewport whose scroll offset is set by the test; counts anchor restores.
#[derive(Default)]
pub struct RecordingViewport {
    offset_px: Mutex<f64>,
    restores: AtomicUsize,
}

impl RecordingViewport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scroll_to(&self, offset_px: f64) {
        *self.offset_px.lock() = offset_px;
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

impl Viewport for RecordingViewport {
    fn scroll_offset(&self) -> f64 {
        *self.offset_px.lock()
    }

    fn restore_anchor(&self) {
        self.restores.fetch_add(1, Ordering::SeqCst);
    }
}
