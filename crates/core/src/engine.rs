//! Wiring of the engine services over a set of stores.

use std::sync::Arc;

use crate::audit_trail::AuditTrailService;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::diff::DiffEngine;
use crate::history::VersionHistoryService;
use crate::memory::InMemoryStore;
use crate::notify::{EventHook, NoopEventHook};
use crate::share_manager::SecureShareManager;
use crate::stats::CollaborationStatsAggregator;
use crate::store::{AnonymousResolver, AuditStore, DiffCache, IdentityResolver, ShareStore, VersionStore};

/// The store implementations the services run against.
#[derive(Clone)]
pub struct EngineStores {
    pub versions: Arc<dyn VersionStore>,
    pub shares: Arc<dyn ShareStore>,
    pub audit: Arc<dyn AuditStore>,
    pub diff_cache: Arc<dyn DiffCache>,
    pub identities: Arc<dyn IdentityResolver>,
}

impl EngineStores {
    /// Back every store with one in-memory instance.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            versions: store.clone(),
            shares: store.clone(),
            audit: store.clone(),
            diff_cache: store,
            identities: Arc::new(AnonymousResolver),
        }
    }

    pub fn with_identities(mut self, identities: Arc<dyn IdentityResolver>) -> Self {
        self.identities = identities;
        self
    }
}

/// All services, sharing one clock, hook and configuration.
///
/// Cheaply cloneable; every service sits behind an `Arc`.
#[derive(Clone)]
pub struct Engine {
    pub config: Arc<EngineConfig>,
    pub diff: Arc<DiffEngine>,
    pub history: Arc<VersionHistoryService>,
    pub shares: Arc<SecureShareManager>,
    pub audit: Arc<AuditTrailService>,
    pub stats: Arc<CollaborationStatsAggregator>,
}

impl Engine {
    pub fn new(
        stores: EngineStores,
        clock: Arc<dyn Clock>,
        hook: Arc<dyn EventHook>,
        config: EngineConfig,
    ) -> Self {
        let config = Arc::new(config);

        let diff = Arc::new(DiffEngine::new(
            stores.versions.clone(),
            stores.diff_cache.clone(),
            config.clone(),
        ));
        let audit = Arc::new(AuditTrailService::new(
            stores.audit.clone(),
            clock.clone(),
            config.clone(),
        ));
        let history = Arc::new(VersionHistoryService::new(
            stores.versions.clone(),
            diff.clone(),
            audit.clone(),
            stores.identities.clone(),
            hook.clone(),
            clock.clone(),
            config.clone(),
        ));
        let shares = Arc::new(SecureShareManager::new(
            stores.shares.clone(),
            stores.versions.clone(),
            audit.clone(),
            hook,
            clock.clone(),
            config.clone(),
        ));
        let stats = Arc::new(CollaborationStatsAggregator::new(
            stores.versions,
            stores.shares,
            stores.identities,
            clock,
            config.clone(),
        ));

        Self {
            config,
            diff,
            history,
            shares,
            audit,
            stats,
        }
    }

    /// Engine on the system clock with notifications discarded.
    pub fn with_defaults(stores: EngineStores, config: EngineConfig) -> Self {
        Self::new(stores, Arc::new(SystemClock), Arc::new(NoopEventHook), config)
    }
}
