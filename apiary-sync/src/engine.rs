//! Public face of the synchronization engine.
//!
//! ```no_run
//! # async fn demo(source: impl apiary_sync::DataSource) -> Result<(), apiary_sync::SyncError> {
//! use apiary_sync::{SubscriptionKey, SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(source, SyncConfig::default())?;
//! let sub = engine.subscribe(SubscriptionKey::hive("42"), |snapshot| {
//!     println!("{} colonies, {} alerts", snapshot.colonies.len(), snapshot.active_alert_count);
//! });
//! // ... later, when the view goes away:
//! sub.unsubscribe();
//! # Ok(())
//! # }
//! ```

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::session::{self, IdentitySlot, Session, SessionPhase, SnapshotCallback};
use crate::snapshot::{Snapshot, SubscriptionKey, ViewStatus};
use crate::source::DataSource;
use crate::state::SubscriptionState;
use crate::viewport::Viewport;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Spawns one polling session per subscription. Cheap to clone.
pub struct SyncEngine<S> {
    source: Arc<S>,
    config: Arc<SyncConfig>,
}

impl<S> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self { source: self.source.clone(), config: self.config.clone() }
    }
}

impl<S: DataSource> SyncEngine<S> {
    pub fn new(source: S, config: SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self { source: Arc::new(source), config: Arc::new(config) })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Starts synchronizing `key`. Must be called from within a Tokio runtime.
    ///
    /// `on_snapshot` runs on the polling task. It must not block on the
    /// thread that will unsubscribe, since teardown waits for an ongoing
    /// delivery to finish.
    pub fn subscribe<F>(&self, key: SubscriptionKey, on_snapshot: F) -> Subscription
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        self.start(key, None, Box::new(on_snapshot), session::new_slot())
    }

    /// Like [`subscribe`](Self::subscribe), restoring the view's scroll
    /// anchor after refreshes that land while it is scrolled down.
    pub fn subscribe_with_viewport<F>(
        &self,
        key: SubscriptionKey,
        viewport: Arc<dyn Viewport>,
        on_snapshot: F,
    ) -> Subscription
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        self.start(key, Some(viewport), Box::new(on_snapshot), session::new_slot())
    }

    /// Binding for a view whose key changes over its lifetime.
    pub fn binding(&self) -> ViewBinding<S> {
        ViewBinding { engine: self.clone(), viewport: None, slot: session::new_slot(), current: None }
    }

    fn start(
        &self,
        key: SubscriptionKey,
        viewport: Option<Arc<dyn Viewport>>,
        mut on_snapshot: SnapshotCallback,
        slot: IdentitySlot,
    ) -> Subscription {
        let id = Uuid::new_v4();
        let state = SubscriptionState::new();
        let refresh = Arc::new(Notify::new());

        if let Err(e) = key.validate() {
            error!("not synchronizing: {}", e);
            let snapshot = Arc::new(Snapshot::empty(
                key.clone(),
                ViewStatus::Misconfigured { reason: e.to_string() },
            ));
            state.publish(snapshot.clone());
            on_snapshot(&snapshot);
            return Subscription { id, key, slot, stop: None, state, refresh };
        }

        {
            let current = slot.lock();
            *current.borrow_mut() = Some(id);
        }
        state.advance(SessionPhase::LoadingInitial);

        let (stop_tx, stop_rx) = oneshot::channel();
        let session = Session {
            id,
            key: key.clone(),
            source: self.source.clone(),
            config: self.config.clone(),
            slot: slot.clone(),
            state: state.clone(),
            viewport,
            on_snapshot,
        };
        tokio::spawn(session.run(stop_rx, refresh.clone()));
        info!("{}: session {} started (every {:?})", key, id, self.config.poll_interval());

        Subscription { id, key, slot, stop: Some(stop_tx), state, refresh }
    }
}

/// Handle of a running session. Dropping it tears the session down.
pub struct Subscription {
    id: Uuid,
    key: SubscriptionKey,
    slot: IdentitySlot,
    stop: Option<oneshot::Sender<()>>,
    state: Arc<SubscriptionState>,
    refresh: Arc<Notify>,
}

impl Subscription {
    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Last snapshot published to this subscription.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.state.latest()
    }

    /// Asks for an immediate resync, e.g. after a write. Coalesced with any
    /// fetch already in flight.
    pub fn request_refresh(&self) {
        if self.stop.is_some() {
            self.refresh.notify_one();
        }
    }

    /// Stops polling. Once this returns, `on_snapshot` will not be called again.
    pub fn unsubscribe(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.state.tear_down() {
            return;
        }

        {
            let current = self.slot.lock();
            let mut current = current.borrow_mut();
            if *current == Some(self.id) {
                *current = None;
            }
        }

        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        debug!("{}: session {} torn down", self.key, self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// One mounted view. Successive sessions share an identity slot, so a
/// superseded session cannot publish once its successor has been bound.
pub struct ViewBinding<S: DataSource> {
    engine: SyncEngine<S>,
    viewport: Option<Arc<dyn Viewport>>,
    slot: IdentitySlot,
    current: Option<Subscription>,
}

impl<S: DataSource> ViewBinding<S> {
    pub fn with_viewport(mut self, viewport: Arc<dyn Viewport>) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Synchronizes `key`. Returns `false` (and keeps the running session and
    /// its callback) when `key` is already bound.
    pub fn bind<F>(&mut self, key: SubscriptionKey, on_snapshot: F) -> bool
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        if self.current.as_ref().is_some_and(|s| s.key() == &key) {
            return false;
        }
        self.clear();
        let viewport = self.viewport.clone();
        self.current = Some(self.engine.start(key, viewport, Box::new(on_snapshot), self.slot.clone()));
        true
    }

    /// Tears down the current session (view unmounted).
    pub fn clear(&mut self) {
        if let Some(subscription) = self.current.take() {
            subscription.unsubscribe();
        }
    }

    pub fn current(&self) -> Option<&Subscription> {
        self.current.as_ref()
    }
}
