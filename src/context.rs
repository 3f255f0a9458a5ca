//! Fire-once handoff between view transitions.
//!
//! Payloads live in the session cache under [`CacheKey::Nav`] and are never
//! persisted. The key set is closed: each [`NavKey`] has exactly one payload
//! shape, one sender and one receiver.
//!
//! | Key                | Sender                 | Receiver        |
//! |--------------------|------------------------|-----------------|
//! | `CreatePreselect`  | dashboard "new run"    | create form     |
//! | `RunCreated`       | create form on success | dashboard init  |
//! | `DashboardRestore` | dashboard on leave     | dashboard init  |
//!
//! Receivers consume with [`NavigationContext::take`] (or the typed `take_*`
//! helpers) during initialization. A payload read with `get` stays in place
//! until `clear` is called.

use crate::cache::{CacheKey, CacheValue, SharedCache};
use crate::dashboard::{DetailMemory, Pane};
use crate::model::RepositoryRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavKey {
    CreatePreselect,
    RunCreated,
    DashboardRestore,
}

/// Cursor state the dashboard hands to its next incarnation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DashboardSnapshot {
    pub repo_idx: usize,
    pub run_idx: usize,
    pub detail_idx: usize,
    pub focus: Pane,
    pub repository: Option<RepositoryRef>,
    pub run_id: Option<u64>,
    pub viewport: (u16, u16),
    pub detail_memory: DetailMemory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavPayload {
    /// Repository the create form should start on.
    CreatePreselect { repository: String },
    /// The receiver must invalidate Active cache entries and refresh.
    RunCreated { run_id: u64, repository: String },
    DashboardRestore(DashboardSnapshot),
}

impl NavPayload {
    pub fn key(&self) -> NavKey {
        match self {
            NavPayload::CreatePreselect { .. } => NavKey::CreatePreselect,
            NavPayload::RunCreated { .. } => NavKey::RunCreated,
            NavPayload::DashboardRestore(_) => NavKey::DashboardRestore,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationContext {
    cache: SharedCache,
}

impl NavigationContext {
    pub fn new(cache: SharedCache) -> Self {
        Self { cache }
    }

    /// Store `payload`, replacing any unconsumed payload under the same key.
    pub fn set(&self, payload: NavPayload) {
        let key = payload.key();
        tracing::debug!("nav context: set {key:?}");
        self.cache
            .set(CacheKey::Nav(key), CacheValue::Nav(payload), None);
    }

    pub fn get(&self, key: NavKey) -> Option<NavPayload> {
        match self.cache.get(&CacheKey::Nav(key))? {
            CacheValue::Nav(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn clear(&self, key: NavKey) {
        self.cache.remove(&CacheKey::Nav(key));
    }

    /// Read and clear in one step.
    pub fn take(&self, key: NavKey) -> Option<NavPayload> {
        let payload = self.get(key);
        self.clear(key);
        if payload.is_some() {
            tracing::debug!("nav context: consumed {key:?}");
        }
        payload
    }

    pub fn take_create_preselect(&self) -> Option<String> {
        match self.take(NavKey::CreatePreselect)? {
            NavPayload::CreatePreselect { repository } => Some(repository),
            _ => None,
        }
    }

    pub fn take_run_created(&self) -> Option<(u64, String)> {
        match self.take(NavKey::RunCreated)? {
            NavPayload::RunCreated { run_id, repository } => Some((run_id, repository)),
            _ => None,
        }
    }

    pub fn take_dashboard_restore(&self) -> Option<DashboardSnapshot> {
        match self.take(NavKey::DashboardRestore)? {
            NavPayload::DashboardRestore(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SessionCache;

    fn context() -> NavigationContext {
        NavigationContext::new(SessionCache::shared())
    }

    #[test]
    fn take_is_fire_once() {
        let ctx = context();
        ctx.set(NavPayload::CreatePreselect {
            repository: "alpha".into(),
        });
        assert_eq!(ctx.take_create_preselect().as_deref(), Some("alpha"));
        assert_eq!(ctx.take_create_preselect(), None);
        assert_eq!(ctx.get(NavKey::CreatePreselect), None);
    }

    #[test]
    fn get_does_not_consume_until_cleared() {
        let ctx = context();
        ctx.set(NavPayload::RunCreated {
            run_id: 9,
            repository: "beta".into(),
        });
        assert!(ctx.get(NavKey::RunCreated).is_some());
        assert!(ctx.get(NavKey::RunCreated).is_some());
        ctx.clear(NavKey::RunCreated);
        assert!(ctx.get(NavKey::RunCreated).is_none());
    }

    #[test]
    fn keys_are_independent() {
        let ctx = context();
        ctx.set(NavPayload::RunCreated {
            run_id: 1,
            repository: "alpha".into(),
        });
        ctx.set(NavPayload::DashboardRestore(DashboardSnapshot {
            repo_idx: 2,
            ..Default::default()
        }));
        assert_eq!(ctx.take_dashboard_restore().map(|s| s.repo_idx), Some(2));
        assert_eq!(ctx.take_run_created(), Some((1, "alpha".to_string())));
    }

    #[test]
    fn payloads_survive_active_invalidation() {
        let ctx = context();
        ctx.set(NavPayload::CreatePreselect {
            repository: "alpha".into(),
        });
        ctx.cache().invalidate_active();
        assert!(ctx.get(NavKey::CreatePreselect).is_some());
    }
}
