//! Integration tests for [`PgStore`] against a real database.
//!
//! - version append advances `current_version` and rejects gaps or reuse
//! - stored versions cannot be updated or deleted
//! - conditional counters never exceed their limit
//! - revocation is one-way
//! - audit queries filter and order newest first
//! - the diff cache is write-once
//!
//! These need a PostgreSQL server reachable through `DATABASE_URL`.

use std::collections::BTreeMap;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use lexledger_core::audit::{AuditEventType, AuditFilter, NewAuditEvent};
use lexledger_core::diff::{DiffKey, VersionDiffResult};
use lexledger_core::document::VersionSnapshot;
use lexledger_core::share::{AccessType, NewAccessLogEntry, NewShare, PermissionLevel};
use lexledger_core::store::{AuditStore, DiffCache, ShareStore, StoreError, VersionStore};
use lexledger_core::types::{DbId, Timestamp};
use lexledger_db::repositories::AuditEventRepo;
use lexledger_db::PgStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(minute: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, minute, 0).unwrap()
}

fn snapshot(document_id: DbId, version_number: i32, content: &str) -> VersionSnapshot {
    let mut metadata = BTreeMap::new();
    metadata.insert("jurisdiction".to_string(), serde_json::json!("NY"));
    VersionSnapshot {
        document_id,
        version_number,
        title: format!("Agreement v{version_number}"),
        content: content.to_string(),
        metadata,
        quality_score: Some(0.9),
        change_summary: None,
        created_by: 100,
        created_at: at(version_number as u32),
    }
}

fn new_share(document_id: DbId, slug: &str, allowed_views: i64) -> NewShare {
    NewShare {
        document_id,
        organization_id: 1,
        slug: slug.to_string(),
        access_code_hash: None,
        permission: PermissionLevel::Download,
        valid_from: at(0),
        expires_at: Some(at(0) + Duration::days(7)),
        allowed_views,
        allowed_downloads: -1,
        allowed_ips: vec!["192.0.2.1".into()],
        requires_authentication: false,
        created_by: 100,
        created_at: at(0),
    }
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn append_advances_current_version(pool: PgPool) {
    lexledger_db::health_check(&pool).await.unwrap();
    let store = PgStore::new(pool);
    let doc = store.create_document(1, "Agreement").await.unwrap();
    assert_eq!(doc.current_version, 0);

    let v1 = store.append_version(snapshot(doc.id, 1, "first")).await.unwrap();
    store.append_version(snapshot(doc.id, 2, "second")).await.unwrap();
    assert_eq!(v1.metadata["jurisdiction"], "NY");

    let reloaded = store.load_document(doc.id).await.unwrap().unwrap();
    assert_eq!(reloaded.current_version, 2);
    assert_eq!(reloaded.title, "Agreement v2");

    let listed = store.list_versions(doc.id, None).await.unwrap();
    let numbers: Vec<_> = listed.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![2, 1]);

    let limited = store.list_versions(doc.id, Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].content, "second");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn append_rejects_reused_and_skipped_numbers(pool: PgPool) {
    let store = PgStore::new(pool);
    let doc = store.create_document(1, "Agreement").await.unwrap();
    store.append_version(snapshot(doc.id, 1, "first")).await.unwrap();

    let reused = store.append_version(snapshot(doc.id, 1, "again")).await.unwrap_err();
    assert_matches!(reused, StoreError::Conflict(_));

    let skipped = store.append_version(snapshot(doc.id, 3, "gap")).await.unwrap_err();
    assert_matches!(skipped, StoreError::Conflict(_));

    let missing = store.append_version(snapshot(9_999, 1, "orphan")).await.unwrap_err();
    assert_matches!(missing, StoreError::Backend(_));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn stored_versions_cannot_be_rewritten_or_removed(pool: PgPool) {
    let store = PgStore::new(pool);
    let doc = store.create_document(1, "Agreement").await.unwrap();
    store.append_version(snapshot(doc.id, 1, "first")).await.unwrap();

    let updated = sqlx::query("UPDATE document_versions SET content = 'edited' WHERE document_id = $1")
        .bind(doc.id)
        .execute(store.pool())
        .await;
    assert!(updated.is_err(), "version rows must be immutable");

    let deleted = sqlx::query("DELETE FROM document_versions WHERE document_id = $1")
        .bind(doc.id)
        .execute(store.pool())
        .await;
    assert!(deleted.is_err(), "version rows must not be deleted");

    let parent = sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(doc.id)
        .execute(store.pool())
        .await;
    assert!(parent.is_err(), "a versioned document must not take its versions with it");

    let kept = store.load_version(doc.id, 1).await.unwrap().unwrap();
    assert_eq!(kept.content, "first");
}

// ---------------------------------------------------------------------------
// Shares
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn view_counter_stops_at_limit(pool: PgPool) {
    let store = PgStore::new(pool);
    let doc = store.create_document(1, "Agreement").await.unwrap();
    let share = store.save_share(new_share(doc.id, "limit-slug", 2)).await.unwrap();

    assert_eq!(store.try_increment_views(share.id).await.unwrap().unwrap().view_count, 1);
    assert_eq!(store.try_increment_views(share.id).await.unwrap().unwrap().view_count, 2);
    assert!(store.try_increment_views(share.id).await.unwrap().is_none());

    let reloaded = store.load_share("limit-slug").await.unwrap().unwrap();
    assert_eq!(reloaded.view_count, 2);
    assert_eq!(reloaded.allowed_ips, vec!["192.0.2.1".to_string()]);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn duplicate_slug_is_a_conflict(pool: PgPool) {
    let store = PgStore::new(pool);
    let doc = store.create_document(1, "Agreement").await.unwrap();
    store.save_share(new_share(doc.id, "same-slug", -1)).await.unwrap();
    let err = store.save_share(new_share(doc.id, "same-slug", -1)).await.unwrap_err();
    assert_matches!(err, StoreError::Conflict(_));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn revocation_is_one_way(pool: PgPool) {
    let store = PgStore::new(pool);
    let doc = store.create_document(1, "Agreement").await.unwrap();
    let share = store.save_share(new_share(doc.id, "revoke-slug", -1)).await.unwrap();

    let revoked = store
        .revoke(share.id, 200, Some("matter closed"), at(5))
        .await
        .unwrap()
        .unwrap();
    assert!(!revoked.is_active);
    assert_eq!(revoked.revoked_by, Some(200));
    assert_eq!(revoked.revoked_at, Some(at(5)));

    assert!(store.revoke(share.id, 300, None, at(6)).await.unwrap().is_none());
    assert!(store.try_increment_views(share.id).await.unwrap().is_none());

    let reloaded = store.load_share_by_id(share.id).await.unwrap().unwrap();
    assert_eq!(reloaded.revocation_reason.as_deref(), Some("matter closed"));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn access_log_is_newest_first(pool: PgPool) {
    let store = PgStore::new(pool);
    let doc = store.create_document(1, "Agreement").await.unwrap();
    let share = store.save_share(new_share(doc.id, "log-slug", -1)).await.unwrap();

    for (minute, access_type) in [(1, AccessType::View), (2, AccessType::Download), (3, AccessType::Denied)] {
        store
            .append_access_log(NewAccessLogEntry {
                share_id: share.id,
                access_type,
                requester_ip: "192.0.2.1".into(),
                requester_identity: None,
                success: access_type != AccessType::Denied,
                failure_reason: (access_type == AccessType::Denied).then(|| "ip_not_allowed".to_string()),
                created_at: at(minute),
            })
            .await
            .unwrap();
    }

    let entries = store.list_access_log(share.id, 2).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].access_type, AccessType::Denied);
    assert_eq!(entries[0].failure_reason.as_deref(), Some("ip_not_allowed"));
    assert_eq!(entries[1].access_type, AccessType::Download);
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn audit_query_filters_and_orders(pool: PgPool) {
    let store = PgStore::new(pool);
    let doc = store.create_document(1, "Agreement").await.unwrap();

    let mut last_count = AuditEventRepo::count_for_document(store.pool(), doc.id).await.unwrap();
    assert_eq!(last_count, 0);
    for (minute, kind, actor) in [
        (1, AuditEventType::Created, Some(100)),
        (2, AuditEventType::Viewed, None),
        (3, AuditEventType::Viewed, Some(100)),
    ] {
        let mut event = NewAuditEvent::new(doc.id, kind, format!("event at {minute}"));
        event.actor_id = actor;
        event.created_at = Some(at(minute));
        store.append_event(event).await.unwrap();

        let count = AuditEventRepo::count_for_document(store.pool(), doc.id).await.unwrap();
        assert_eq!(count, last_count + 1);
        last_count = count;
    }

    let all = store.query_events(doc.id, &AuditFilter::default(), None).await.unwrap();
    let descriptions: Vec<_> = all.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(descriptions, vec!["event at 3", "event at 2", "event at 1"]);

    let views = AuditFilter {
        event_type: Some(AuditEventType::Viewed),
        ..AuditFilter::default()
    };
    assert_eq!(store.query_events(doc.id, &views, None).await.unwrap().len(), 2);

    let by_actor = AuditFilter {
        actor_id: Some(100),
        since: Some(at(2)),
        ..AuditFilter::default()
    };
    let matched = store.query_events(doc.id, &by_actor, Some(10)).await.unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].description, "event at 3");

    let deleted = sqlx::query("DELETE FROM audit_events WHERE document_id = $1")
        .bind(doc.id)
        .execute(store.pool())
        .await;
    assert!(deleted.is_err(), "audit rows must be append-only");
    assert_eq!(
        AuditEventRepo::count_for_document(store.pool(), doc.id).await.unwrap(),
        last_count
    );
}

// ---------------------------------------------------------------------------
// Diff cache
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn diff_cache_is_write_once(pool: PgPool) {
    let store = PgStore::new(pool);
    let doc = store.create_document(1, "Agreement").await.unwrap();
    let v1 = store.append_version(snapshot(doc.id, 1, "alpha")).await.unwrap();
    let v2 = store.append_version(snapshot(doc.id, 2, "alpha beta")).await.unwrap();

    let key = DiffKey {
        document_id: doc.id,
        from_version: 1,
        to_version: 2,
    };
    assert!(store.get(&key).await.unwrap().is_none());

    let result = VersionDiffResult::between(&v1, &v2);
    store.put(&key, &result).await.unwrap();
    store.put(&key, &result).await.unwrap();

    let cached = store.get(&key).await.unwrap().unwrap();
    assert_eq!(cached, result);
}
