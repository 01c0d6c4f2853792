//! The engine publishing through [`BusEventHook`] and a relay draining it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lexledger_core::config::EngineConfig;
use lexledger_core::document::NewVersion;
use lexledger_core::memory::InMemoryStore;
use lexledger_core::share::ShareConfig;
use lexledger_core::{Engine, EngineStores};
use lexledger_events::{BusEventHook, DeliveryError, DomainEvent, EventBus, EventKind, EventRelay, EventSink, RelayReport};

const ORG: i64 = 1;
const ALICE: i64 = 100;

fn engine(bus: Arc<EventBus>) -> (Arc<InMemoryStore>, Engine) {
    let store = Arc::new(InMemoryStore::new());
    let engine = Engine::new(
        EngineStores::in_memory(store.clone()),
        Arc::new(lexledger_core::clock::SystemClock),
        Arc::new(BusEventHook::new(bus)),
        EngineConfig::default(),
    );
    (store, engine)
}

#[derive(Default)]
struct CollectingSink {
    seen: Mutex<Vec<EventKind>>,
    reject: Option<EventKind>,
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn deliver(&self, event: &DomainEvent) -> Result<(), DeliveryError> {
        if self.reject == Some(event.kind) {
            return Err(DeliveryError::Unavailable("endpoint unavailable".into()));
        }
        event.to_json()?;
        self.seen.lock().unwrap().push(event.kind);
        Ok(())
    }
}

#[tokio::test]
async fn share_lifecycle_reaches_subscribers() {
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let (store, engine) = engine(bus.clone());

    let doc = store.insert_document(ORG, "Lease").await;
    let created = engine
        .shares
        .create(doc.id, ShareConfig::view_only(ALICE))
        .await
        .unwrap();
    engine
        .shares
        .revoke(created.share.id, ALICE, Some("signed"))
        .await
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind, EventKind::ShareCreated);
    assert_eq!(first.document_id, doc.id);
    assert_eq!(first.share_id, Some(created.share.id));
    assert_eq!(first.actor_id, ALICE);

    let second = rx.recv().await.unwrap();
    assert_eq!(second.kind, EventKind::ShareRevoked);
    assert_eq!(second.sequence, first.sequence + 1);
    assert_eq!(second.to_json().unwrap()["notification"]["reason"], "signed");
}

#[tokio::test]
async fn relay_delivers_until_the_bus_closes() {
    let bus = Arc::new(EventBus::default());
    let rx = bus.subscribe();
    let (store, engine) = engine(bus.clone());

    let sink = Arc::new(CollectingSink {
        reject: Some(EventKind::ShareCreated),
        ..CollectingSink::default()
    });
    let relay_sink = sink.clone();
    let relay = tokio::spawn(async move { EventRelay::run(relay_sink.as_ref(), rx).await });

    let doc = store.insert_document(ORG, "Brief").await;
    engine
        .history
        .record_version(
            doc.id,
            NewVersion {
                title: "Brief".into(),
                content: "Argument".into(),
                created_by: ALICE,
                ..NewVersion::default()
            },
        )
        .await
        .unwrap();
    engine
        .shares
        .create(doc.id, ShareConfig::view_only(ALICE))
        .await
        .unwrap();

    // The engine holds the last sender clone through its hook.
    drop(engine);
    drop(bus);

    let report = relay.await.unwrap();
    assert_eq!(
        report,
        RelayReport {
            delivered: 1,
            failed: 1,
            lagged: 0,
        }
    );
    assert_eq!(*sink.seen.lock().unwrap(), vec![EventKind::VersionCreated]);
}
