//! What a `Subscription` handle and its polling task both see: the session
//! phase and the last published snapshot.

use crate::session::SessionPhase;
use crate::snapshot::Snapshot;
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) struct SubscriptionState {
    phase: Mutex<SessionPhase>,
    latest: Mutex<Option<Arc<Snapshot>>>,
}

impl SubscriptionState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { phase: Mutex::new(SessionPhase::Idle), latest: Mutex::new(None) })
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock()
    }

    /// Moves to `next`. `TornDown` is final and never overwritten.
    pub fn advance(&self, next: SessionPhase) {
        let mut phase = self.phase.lock();
        if *phase != SessionPhase::TornDown {
            *phase = next;
        }
    }

    /// Returns false if the session was already torn down.
    pub fn tear_down(&self) -> bool {
        let mut phase = self.phase.lock();
        if *phase == SessionPhase::TornDown {
            return false;
        }
        *phase = SessionPhase::TornDown;
        true
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.lock().clone()
    }

    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        *self.latest.lock() = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SubscriptionKey, ViewStatus};

    #[test]
    fn test_torn_down_is_final() {
        let state = SubscriptionState::new();
        state.advance(SessionPhase::LoadingInitial);
        assert_eq!(state.phase(), SessionPhase::LoadingInitial);

        assert!(state.tear_down());
        assert!(!state.tear_down());
        state.advance(SessionPhase::Steady);
        assert_eq!(state.phase(), SessionPhase::TornDown);
    }

    #[test]
    fn test_publish_replaces_latest() {
        let state = SubscriptionState::new();
        assert!(state.latest().is_none());

        let loading = Arc::new(Snapshot::empty(SubscriptionKey::dashboard(), ViewStatus::Loading));
        state.publish(loading.clone());
        assert_eq!(state.latest(), Some(loading));
    }
}
