/*!
# Apiary DevKit - Mocks and helpers for developing against apiary-sync

Lets engine code and views be exercised without a running backend:
- `MockDataSource`: scripted, gateable in-memory data source
- fixture builders producing legacy-format backend payloads
- `SnapshotRecorder` to capture and await published snapshots
- `FakeApi`: a throwaway axum server for the HTTP data source
*/

pub mod fake_server;
pub mod fixtures;
pub mod harness;
pub mod mock_source;

pub use fake_server::{FakeApi, SeenRequest};
pub use fixtures::ColonyFixture;
pub use harness::{RecordingViewport, SnapshotRecorder};
pub use mock_source::{MockDataSource, MockReply};
