//! One polling session: timer, coalesced fetches, merge, publish.
//!
//! A session owns its view state exclusively. Results are published only
//! while the session's id is still the one stored in its identity slot; the
//! slot lock is held for the whole delivery, so once a teardown has swapped
//! the id out, nothing from this session can reach the view again.

use crate::alerts;
use crate::config::SyncConfig;
use crate::error::SourceError;
use crate::models::{Colony, MetricKind, MetricSample, ServerAlert};
use crate::report::ApiarySummary;
use crate::series;
use crate::snapshot::{Snapshot, SubscriptionKey, ViewKind, ViewStatus};
use crate::source::DataSource;
use crate::state::SubscriptionState;
use crate::viewport::{needs_restore, Viewport};
use crate::wire::{self, ColonyLookup, Endpoint, HistoryScope, RawResponse};
use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Not polling: never started (bad key) or finished (colony not found).
    Idle,
    LoadingInitial,
    Steady,
    LoadingRefresh,
    TornDown,
}

/// Id of the session currently allowed to publish for a view.
pub(crate) type IdentitySlot = Arc<ReentrantMutex<RefCell<Option<Uuid>>>>;

pub(crate) fn new_slot() -> IdentitySlot {
    Arc::new(ReentrantMutex::new(RefCell::new(None)))
}

pub(crate) type SnapshotCallback = Box<dyn FnMut(&Snapshot) + Send>;

type FetchResult = Result<RawResponse, SourceError>;
type InFlight = Pin<Box<dyn Future<Output = FetchOutcome> + Send>>;

/// Endpoints hit by one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchPlan {
    pub primary: Endpoint,
    pub alerts: Option<Endpoint>,
    pub history: Option<Endpoint>,
}

impl FetchPlan {
    pub(crate) fn for_key(key: &SubscriptionKey, include_history: bool) -> Self {
        match &key.view {
            ViewKind::Dashboard => Self { primary: Endpoint::Colonies, alerts: None, history: None },
            ViewKind::Hive { colony_id } => Self {
                primary: Endpoint::Colony(colony_id.clone()),
                alerts: Some(Endpoint::Alerts(colony_id.clone())),
                history: include_history.then(|| Endpoint::SensorHistory {
                    colony_id: colony_id.clone(),
                    scope: HistoryScope::Daily,
                }),
            },
            ViewKind::Reports { colony_id } => Self {
                primary: Endpoint::Colonies,
                alerts: None,
                history: colony_id.as_ref().filter(|_| include_history).map(|id| {
                    Endpoint::SensorHistory { colony_id: id.clone(), scope: HistoryScope::Full }
                }),
            },
        }
    }
}

struct FetchOutcome {
    primary: (Endpoint, FetchResult),
    alerts: Option<(Endpoint, FetchResult)>,
    history: Option<(Endpoint, FetchResult)>,
    completed_at: DateTime<Utc>,
}

enum Primary {
    Colonies(Vec<Colony>),
    NotFound(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

#[derive(Default)]
struct ViewState {
    colonies: Vec<Colony>,
    server_alerts: Vec<ServerAlert>,
    series: Vec<MetricSample>,
    history_loaded: bool,
    initial_complete: bool,
    last_sync: Option<DateTime<Utc>>,
}

pub(crate) struct Session<S> {
    pub id: Uuid,
    pub key: SubscriptionKey,
    pub source: Arc<S>,
    pub config: Arc<SyncConfig>,
    pub slot: IdentitySlot,
    pub state: Arc<SubscriptionState>,
    pub viewport: Option<Arc<dyn Viewport>>,
    pub on_snapshot: SnapshotCallback,
}

impl<S: DataSource> Session<S> {
    pub(crate) async fn run(mut self, mut stop: oneshot::Receiver<()>, refresh: Arc<Notify>) {
        let mut state = ViewState::default();
        self.deliver(Snapshot::empty(self.key.clone(), ViewStatus::Loading), false);

        let mut ticker = time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<InFlight> = None;
        let mut fetches: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => self.try_start(&state, &mut in_flight, &mut fetches, "tick"),
                _ = refresh.notified() => self.try_start(&state, &mut in_flight, &mut fetches, "refresh"),
                outcome = wait_in_flight(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    if self.apply(&mut state, outcome) == Flow::Finished {
                        break;
                    }
                }
            }
        }

        debug!("{}: session {} stopped", self.key, self.id);
    }

    /// At most one fetch per session is outstanding; extra triggers are dropped.
    fn try_start(&self, state: &ViewState, in_flight: &mut Option<InFlight>, fetches: &mut u64, cause: &str) {
        if in_flight.is_some() {
            debug!("{}: {} coalesced, fetch still in flight", self.key, cause);
            return;
        }

        let every = u64::from(self.config.polling.history_every_ticks.max(1));
        let include_history = !state.history_loaded || *fetches % every == 0;
        *fetches += 1;

        self.set_phase(if state.initial_complete {
            SessionPhase::LoadingRefresh
        } else {
            SessionPhase::LoadingInitial
        });
        let plan = FetchPlan::for_key(&self.key, include_history);
        *in_flight = Some(start_fetch(self.source.clone(), plan));
    }

    fn apply(&mut self, state: &mut ViewState, outcome: FetchOutcome) -> Flow {
        let FetchOutcome { primary: (endpoint, result), alerts, history, completed_at } = outcome;

        let incoming = match result.and_then(|resp| decode_primary(&endpoint, &resp, completed_at)) {
            Ok(Primary::Colonies(colonies)) => colonies,
            Ok(Primary::NotFound(colony_id)) => {
                info!("{}: colony {} not found, stopping session", self.key, colony_id);
                self.set_phase(SessionPhase::Idle);
                let mut snapshot = Snapshot::empty(self.key.clone(), ViewStatus::NotFound { colony_id });
                snapshot.last_sync = Some(completed_at);
                self.deliver(snapshot, false);
                return Flow::Finished;
            }
            Err(e) => {
                warn!("{}: refresh failed, keeping last snapshot: {}", self.key, e);
                self.set_phase(if state.initial_complete {
                    SessionPhase::Steady
                } else {
                    SessionPhase::LoadingInitial
                });
                return Flow::Continue;
            }
        };

        if let Some((endpoint, result)) = alerts {
            let colony_id = self.key.colony_id().unwrap_or_default();
            match result.and_then(|resp| wire::decode_alerts(&endpoint, &resp, colony_id)) {
                Ok(list) => state.server_alerts = list,
                Err(e) => warn!("{}: keeping previous server alerts: {}", self.key, e),
            }
        }

        if let Some((endpoint, result)) = history {
            match result.and_then(|resp| wire::decode_history(&endpoint, &resp)) {
                Ok(records) => {
                    state.series = series::build(&records, &MetricKind::NUMERIC);
                    state.history_loaded = true;
                }
                Err(e) => warn!("{}: keeping previous series: {}", self.key, e),
            }
        }

        state.colonies = merge(&state.colonies, incoming, completed_at);
        state.last_sync = Some(completed_at);
        let is_refresh = state.initial_complete;
        state.initial_complete = true;

        self.set_phase(SessionPhase::Steady);
        let snapshot = self.ready_snapshot(state);
        self.deliver(snapshot, is_refresh);
        Flow::Continue
    }

    fn ready_snapshot(&self, state: &ViewState) -> Snapshot {
        let colonies = state.colonies.clone();
        Snapshot {
            key: self.key.clone(),
            derived_alerts: alerts::derive_all(&colonies),
            active_alert_count: alerts::count_active(&colonies),
            summary: ApiarySummary::from_colonies(&colonies),
            server_alerts: state.server_alerts.clone(),
            series: state.series.clone(),
            last_sync: state.last_sync,
            is_loading_initial: false,
            status: ViewStatus::Ready,
            colonies,
        }
    }

    /// Publishes `snapshot` if this session is still current. With
    /// `refresh` set, the viewport is sampled first and its anchor restored after.
    fn deliver(&mut self, snapshot: Snapshot, refresh: bool) -> bool {
        let guard = self.slot.lock();
        if *guard.borrow() != Some(self.id) {
            debug!("{}: discarding result of superseded session {}", self.key, self.id);
            return false;
        }

        let threshold = self.config.viewport.scroll_anchor_threshold_px;
        let restore = refresh && self.viewport.as_deref().is_some_and(|v| needs_restore(v, threshold));

        let snapshot = Arc::new(snapshot);
        self.state.publish(snapshot.clone());
        (self.on_snapshot)(&snapshot);

        if restore {
            if let Some(viewport) = &self.viewport {
                viewport.restore_anchor();
            }
        }
        drop(guard);
        true
    }

    fn set_phase(&self, next: SessionPhase) {
        self.state.advance(next);
    }
}

fn start_fetch<S: DataSource>(source: Arc<S>, plan: FetchPlan) -> InFlight {
    Box::pin(async move {
        let FetchPlan { primary, alerts, history } = plan;
        let (primary_result, alerts_result, history_result) = tokio::join!(
            source.fetch(&primary),
            fetch_optional(source.as_ref(), alerts.as_ref()),
            fetch_optional(source.as_ref(), history.as_ref()),
        );
        FetchOutcome {
            primary: (primary, primary_result),
            alerts: alerts.zip(alerts_result),
            history: history.zip(history_result),
            completed_at: Utc::now(),
        }
    })
}

async fn fetch_optional<S: DataSource>(source: &S, endpoint: Option<&Endpoint>) -> Option<FetchResult> {
    match endpoint {
        Some(endpoint) => Some(source.fetch(endpoint).await),
        None => None,
    }
}

async fn wait_in_flight(in_flight: &mut Option<InFlight>) -> FetchOutcome {
    match in_flight {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

fn decode_primary(endpoint: &Endpoint, response: &RawResponse, at: DateTime<Utc>) -> Result<Primary, SourceError> {
    match endpoint {
        Endpoint::Colony(id) => Ok(match wire::decode_colony(endpoint, response, at)? {
            ColonyLookup::Found(colony) => Primary::Colonies(vec![colony]),
            ColonyLookup::Empty => Primary::Colonies(Vec::new()),
            ColonyLookup::NotFound => Primary::NotFound(id.clone()),
        }),
        _ => wire::decode_colonies(endpoint, response, at).map(Primary::Colonies),
    }
}

/// The incoming set decides membership and order. A colony whose content did
/// not change keeps its previous sync stamp; changed or new ones get `at`.
pub(crate) fn merge(previous: &[Colony], incoming: Vec<Colony>, at: DateTime<Utc>) -> Vec<Colony> {
    let known: HashMap<&str, &Colony> = previous.iter().map(|c| (c.id.as_str(), c)).collect();
    incoming
        .into_iter()
        .map(|mut colony| {
            colony.last_synced = match known.get(colony.id.as_str()) {
                Some(prev) if prev.same_content(&colony) => prev.last_synced,
                _ => at,
            };
            colony
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricSnapshot, Reading};
    use chrono::Duration;

    fn colony(id: &str, temperature: f64, at: DateTime<Utc>) -> Colony {
        Colony {
            id: id.into(),
            name: format!("Colmena {id}"),
            apiary: None,
            image_url: None,
            metrics: MetricSnapshot {
                temperature: Reading::Number(temperature),
                ..Default::default()
            },
            last_synced: at,
        }
    }

    #[test]
    fn test_merge_is_idempotent_for_identical_fetches() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(3);
        let first = merge(&[], vec![colony("a", 34.0, t0), colony("b", 35.0, t0)], t0);
        let second = merge(&first, vec![colony("a", 34.0, t1), colony("b", 35.0, t1)], t1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_membership_and_stamps() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(3);
        let previous = merge(&[], vec![colony("a", 34.0, t0), colony("b", 35.0, t0)], t0);

        let merged = merge(&previous, vec![colony("c", 33.0, t1), colony("a", 39.0, t1)], t1);
        let ids: Vec<_> = merged.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert!(merged.iter().all(|c| c.last_synced == t1));

        assert!(merge(&previous, Vec::new(), t1).is_empty());
    }

    #[test]
    fn test_fetch_plans() {
        let dashboard = FetchPlan::for_key(&SubscriptionKey::dashboard(), true);
        assert_eq!(dashboard.primary, Endpoint::Colonies);
        assert_eq!((dashboard.alerts, dashboard.history), (None, None));

        let hive = FetchPlan::for_key(&SubscriptionKey::hive("42"), true);
        assert_eq!(hive.primary, Endpoint::Colony("42".into()));
        assert_eq!(hive.alerts, Some(Endpoint::Alerts("42".into())));
        assert_eq!(
            hive.history,
            Some(Endpoint::SensorHistory { colony_id: "42".into(), scope: HistoryScope::Daily })
        );
        assert_eq!(FetchPlan::for_key(&SubscriptionKey::hive("42"), false).history, None);

        let reports = FetchPlan::for_key(&SubscriptionKey::reports(Some("7".into())), true);
        assert_eq!(reports.primary, Endpoint::Colonies);
        assert_eq!(
            reports.history,
            Some(Endpoint::SensorHistory { colony_id: "7".into(), scope: HistoryScope::Full })
        );
        assert_eq!(FetchPlan::for_key(&SubscriptionKey::reports(None), true).history, None);
    }

    #[test]
    fn test_primary_decoding_by_endpoint() {
        let at = Utc::now();
        let ep = Endpoint::Colony("42".into());
        assert!(matches!(
            decode_primary(&ep, &RawResponse::new(404, ""), at),
            Ok(Primary::NotFound(id)) if id == "42"
        ));
        assert!(matches!(
            decode_primary(&ep, &RawResponse::no_content(), at),
            Ok(Primary::Colonies(c)) if c.is_empty()
        ));
        // A 404 on the list endpoint is a transient failure, not "not found".
        assert!(decode_primary(&Endpoint::Colonies, &RawResponse::new(404, ""), at).is_err());
    }
}
