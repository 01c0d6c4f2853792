#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use lexledger_core::clock::{Clock, ManualClock};
use lexledger_core::config::EngineConfig;
use lexledger_core::document::{Document, DocumentVersion, NewVersion};
use lexledger_core::memory::{InMemoryStore, StaticIdentityResolver};
use lexledger_core::notify::{EventHook, Notification};
use lexledger_core::types::{DbId, Timestamp};
use lexledger_core::{Engine, EngineStores};

pub const ORG: DbId = 1;
pub const OTHER_ORG: DbId = 2;
pub const ALICE: DbId = 100;
pub const BOB: DbId = 200;

/// Route engine logs through the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn start() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

/// Collects every notification for later inspection.
#[derive(Default)]
pub struct RecordingHook {
    pub seen: Mutex<Vec<Notification>>,
}

impl RecordingHook {
    pub fn event_types(&self) -> Vec<&'static str> {
        self.seen.lock().unwrap().iter().map(|n| n.event_type()).collect()
    }
}

impl EventHook for RecordingHook {
    fn emit(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub hook: Arc<RecordingHook>,
    pub engine: Engine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let hook = Arc::new(RecordingHook::default());
        let identities = Arc::new(StaticIdentityResolver::new([(ALICE, "Alice Counsel"), (BOB, "Bob Paralegal")]));
        let stores = EngineStores::in_memory(store.clone()).with_identities(identities);
        let engine = Engine::new(stores, clock.clone(), hook.clone(), config);
        Self {
            store,
            clock,
            hook,
            engine,
        }
    }

    pub async fn document(&self, title: &str) -> Document {
        self.store.insert_document_at(ORG, title, self.clock.now()).await
    }

    pub async fn record(&self, document_id: DbId, title: &str, content: &str, author: DbId) -> DocumentVersion {
        self.engine
            .history
            .record_version(
                document_id,
                NewVersion {
                    title: title.into(),
                    content: content.into(),
                    created_by: author,
                    ..NewVersion::default()
                },
            )
            .await
            .unwrap()
    }
}
