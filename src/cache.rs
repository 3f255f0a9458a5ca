//! Session cache: a typed key/value store with optional TTL and disk
//! persistence of terminal data.
//!
//! One [`SharedCache`] handle is created at startup and passed into every
//! view and the coordinator. All mutations go through a single mutex, so a
//! reader never observes half of a snapshot swap. Disk writes take a second
//! lock so at most one write is in flight; the file is written to a sibling
//! `.tmp` and renamed into place.

use crate::context::{NavKey, NavPayload};
use crate::error::CacheError;
use crate::model::{build_overviews, Repository, RepositoryOverview, RunSnapshot, UserInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub type SharedCache = Arc<SessionCache>;

/// Bumped whenever [`PersistedCache`] changes shape. Older files are ignored.
const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Repositories,
    Overview,
    Run(u64),
    UserInfo,
    Nav(NavKey),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Repositories(Vec<Repository>),
    Overview(Vec<RepositoryOverview>),
    Run(RunSnapshot),
    UserInfo(UserInfo),
    Nav(NavPayload),
    /// Loading placeholder. Never a hit, never persisted.
    Pending,
}

#[derive(Debug)]
struct Entry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    fn is_active_run(&self) -> bool {
        matches!(&self.value, CacheValue::Run(run) if run.status.is_active())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    saved_at: DateTime<Utc>,
    runs: Vec<RunSnapshot>,
    overview: Vec<RepositoryOverview>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistReport {
    pub runs: usize,
    pub repositories: usize,
}

#[derive(Debug, Default)]
pub struct SessionCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    persist_lock: Mutex<()>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedCache {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`. An expired entry is removed and reported as a miss.
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<CacheValue> {
        let mut entries = self.lock();
        if entries.get(key)?.is_expired(now) {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|e| e.value.clone())
    }

    pub fn set(&self, key: CacheKey, value: CacheValue, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.lock().insert(key, Entry { value, expires_at });
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheValue> {
        self.lock().remove(key).map(|e| e.value)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every Active run. Terminal runs and non-run entries stay.
    /// Returns how many entries were removed; a second call returns 0.
    pub fn invalidate_active(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_active_run());
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("invalidated {removed} active run entries");
        }
        removed
    }

    // ── Typed accessors ──

    pub fn repositories(&self) -> Option<Vec<Repository>> {
        match self.get(&CacheKey::Repositories)? {
            CacheValue::Repositories(repos) => Some(repos),
            _ => None,
        }
    }

    pub fn overview(&self) -> Option<Vec<RepositoryOverview>> {
        match self.get(&CacheKey::Overview)? {
            CacheValue::Overview(overview) => Some(overview),
            _ => None,
        }
    }

    pub fn run(&self, id: u64) -> Option<RunSnapshot> {
        match self.get(&CacheKey::Run(id))? {
            CacheValue::Run(run) => Some(run),
            _ => None,
        }
    }

    /// Every cached run, ordered by id.
    pub fn runs(&self) -> Vec<RunSnapshot> {
        let entries = self.lock();
        let mut runs: Vec<RunSnapshot> = entries
            .values()
            .filter_map(|e| match &e.value {
                CacheValue::Run(run) => Some(run.clone()),
                _ => None,
            })
            .collect();
        runs.sort_by_key(|r| r.id);
        runs
    }

    pub fn user_info(&self) -> Option<UserInfo> {
        match self.get(&CacheKey::UserInfo)? {
            CacheValue::UserInfo(info) => Some(info),
            _ => None,
        }
    }

    pub fn put_run(&self, run: RunSnapshot) {
        self.set(CacheKey::Run(run.id), CacheValue::Run(run), None);
    }

    /// Swap in a freshly fetched snapshot under one lock: Active runs are
    /// dropped, fetched runs replace their ids, older Terminal history is
    /// kept, and the overview is recomputed from the resulting run set.
    pub fn store_snapshot(
        &self,
        repositories: Vec<Repository>,
        runs: Vec<RunSnapshot>,
        repositories_ttl: Option<Duration>,
    ) -> Vec<RepositoryOverview> {
        let mut entries = self.lock();
        entries.retain(|_, entry| !entry.is_active_run());
        for run in runs {
            entries.insert(
                CacheKey::Run(run.id),
                Entry {
                    value: CacheValue::Run(run),
                    expires_at: None,
                },
            );
        }
        let all_runs: Vec<RunSnapshot> = entries
            .values()
            .filter_map(|e| match &e.value {
                CacheValue::Run(run) => Some(run.clone()),
                _ => None,
            })
            .collect();
        let overview = build_overviews(&repositories, &all_runs);
        entries.insert(
            CacheKey::Overview,
            Entry {
                value: CacheValue::Overview(overview.clone()),
                expires_at: None,
            },
        );
        entries.insert(
            CacheKey::Repositories,
            Entry {
                value: CacheValue::Repositories(repositories),
                expires_at: repositories_ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        overview
    }

    // ── Persistence ──

    /// Write Terminal runs and the repository overview to `path`. Blocking.
    /// The written overview is recomputed over the persisted runs, so its
    /// counts never include Active runs.
    pub fn persist(&self, path: &Path) -> Result<PersistReport, CacheError> {
        let payload = {
            let entries = self.lock();
            let mut runs: Vec<RunSnapshot> = Vec::new();
            let mut overview: Vec<RepositoryOverview> = Vec::new();
            for entry in entries.values() {
                match &entry.value {
                    CacheValue::Run(run) if !run.status.is_active() => runs.push(run.clone()),
                    CacheValue::Overview(o) => overview.clone_from(o),
                    _ => {}
                }
            }
            runs.sort_by_key(|r| r.id);
            let repositories: Vec<Repository> = overview
                .iter()
                .filter_map(|o| {
                    Some(Repository {
                        id: o.id?,
                        name: o.name.clone(),
                    })
                })
                .collect();
            let overview = build_overviews(&repositories, &runs);
            PersistedCache {
                version: CACHE_FORMAT_VERSION,
                saved_at: Utc::now(),
                runs,
                overview,
            }
        };
        let report = PersistReport {
            runs: payload.runs.len(),
            repositories: payload.overview.len(),
        };
        let bytes = serde_json::to_vec_pretty(&payload)?;

        let _write_guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let tmp = temp_path(path);
        std::fs::write(&tmp, bytes).map_err(|source| CacheError::Write {
            path: tmp.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| CacheError::Rename {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(
            "persisted {} terminal runs and {} repositories to {}",
            report.runs,
            report.repositories,
            path.display()
        );
        Ok(report)
    }

    /// Read a persisted cache. A missing, unreadable, corrupt or
    /// wrong-version file yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let cache = Self::new();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no cache file at {}", path.display());
                return cache;
            }
            Err(e) => {
                tracing::warn!("could not read cache {}: {e}; starting empty", path.display());
                return cache;
            }
        };
        let persisted: PersistedCache = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("corrupt cache {}: {e}; starting empty", path.display());
                return cache;
            }
        };
        if persisted.version != CACHE_FORMAT_VERSION {
            tracing::warn!(
                "cache {} has format v{}, expected v{CACHE_FORMAT_VERSION}; starting empty",
                path.display(),
                persisted.version
            );
            return cache;
        }

        {
            let mut entries = cache.lock();
            for run in persisted.runs.into_iter().filter(|r| !r.status.is_active()) {
                entries.insert(
                    CacheKey::Run(run.id),
                    Entry {
                        value: CacheValue::Run(run),
                        expires_at: None,
                    },
                );
            }
            if !persisted.overview.is_empty() {
                entries.insert(
                    CacheKey::Overview,
                    Entry {
                        value: CacheValue::Overview(persisted.overview),
                        expires_at: None,
                    },
                );
            }
        }
        tracing::info!(
            "loaded {} cached entries from {} (saved {})",
            cache.len(),
            path.display(),
            persisted.saved_at
        );
        cache
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
