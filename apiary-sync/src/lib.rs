/*!
# apiary-sync - Live telemetry synchronization for beehive monitoring

Keeps a long-lived view (dashboard, hive detail, reports) consistent with a
periodically polled, partially unreliable backend:
- `SyncEngine` polls, merges and publishes immutable `Snapshot`s per view
- `thresholds` / `alerts` recompute colony health from static bands
- `series` turns raw sensor history into an ordered chart-ready sequence
- `timestamp` normalizes the backend's many date shapes, or refuses them
*/

pub mod alerts;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod report;
pub mod series;
pub mod session;
pub mod snapshot;
pub mod source;
mod state;
pub mod thresholds;
pub mod timestamp;
pub mod viewport;
pub mod wire;

pub use config::SyncConfig;
pub use engine::{Subscription, SyncEngine, ViewBinding};
pub use error::{SourceError, SyncError};
pub use models::{AlertRecord, Colony, MetricKind, MetricSample, Reading, ServerAlert, Severity, WorkflowState};
pub use session::SessionPhase;
pub use snapshot::{Snapshot, SubscriptionKey, ViewKind, ViewStatus};
pub use source::{DataSource, HttpDataSource};
pub use viewport::Viewport;
pub use wire::{Endpoint, HistoryScope, RawResponse};
