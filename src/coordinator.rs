//! Cache-or-network loading of repositories and runs.
//!
//! The coordinator is the only place that talks to the provider. It owns
//! retry counting (through the injected [`RetryPolicy`]), validates and
//! merges records, and writes results into the shared cache. Callers get a
//! [`LoadOutcome`], never a raw provider error.

use crate::cache::{CacheKey, CacheValue, SharedCache};
use crate::error::ProviderError;
use crate::model::{
    build_overviews, merge_runs, resolve_repository, runs_of, CreateRunRequest, Repository,
    RepositoryOverview, RepositoryRef, RunRecord, RunSnapshot, UserInfo,
};
use crate::provider::RunsProvider;
use crate::retry::{LoadOutcome, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// `limit` passed to each `list_runs` call.
    pub page_size: usize,
    /// Stop paging once this many records have been fetched.
    pub max_runs: usize,
    pub repositories_ttl: Option<Duration>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_runs: 500,
            repositories_ttl: Some(Duration::from_secs(300)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub repositories: Vec<RepositoryOverview>,
    pub source: Source,
    /// Records dropped by validation during this load.
    pub rejected: usize,
}

impl Overview {
    pub fn has_active(&self) -> bool {
        self.repositories.iter().any(|r| r.counts.active() > 0)
    }
}

struct FetchedSnapshot {
    repositories: Vec<Repository>,
    records: Vec<RunRecord>,
}

pub struct Coordinator {
    provider: Arc<dyn RunsProvider>,
    cache: SharedCache,
    retry: RetryPolicy,
    settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn new(
        provider: Arc<dyn RunsProvider>,
        cache: SharedCache,
        retry: RetryPolicy,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            retry,
            settings,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Cached snapshot, if one is complete. Rebuilds the overview from
    /// cached runs when only the repository list survived.
    fn cached_overview(&self) -> Option<Overview> {
        let repositories = self.cache.repositories().filter(|r| !r.is_empty())?;
        let overview = if let Some(overview) = self.cache.overview() {
            overview
        } else {
            let overview = build_overviews(&repositories, &self.cache.runs());
            self.cache
                .set(CacheKey::Overview, CacheValue::Overview(overview.clone()), None);
            overview
        };
        Some(Overview {
            repositories: overview,
            source: Source::Cache,
            rejected: 0,
        })
    }

    pub async fn load_overview(&self) -> LoadOutcome<Overview> {
        if let Some(hit) = self.cached_overview() {
            tracing::debug!("overview served from cache ({} repositories)", hit.repositories.len());
            return LoadOutcome::Loaded(hit);
        }

        let placed_pending = !self.cache.contains(&CacheKey::Overview);
        if placed_pending {
            self.cache.set(CacheKey::Overview, CacheValue::Pending, None);
        }

        match self.retry.run("load overview", || self.fetch_snapshot()).await {
            LoadOutcome::Loaded(snapshot) => LoadOutcome::Loaded(self.store(snapshot)),
            LoadOutcome::Transient(msg) => {
                self.drop_pending(placed_pending);
                LoadOutcome::Transient(msg)
            }
            LoadOutcome::Exhausted(msg) => {
                self.drop_pending(placed_pending);
                LoadOutcome::Exhausted(msg)
            }
        }
    }

    fn drop_pending(&self, placed: bool) {
        if placed && self.cache.get(&CacheKey::Overview) == Some(CacheValue::Pending) {
            self.cache.remove(&CacheKey::Overview);
        }
    }

    /// User-triggered reload. Terminal history survives; Active runs and the
    /// repository list are dropped so the load goes to the network.
    pub async fn refresh(&self) -> LoadOutcome<Overview> {
        let removed = self.cache.invalidate_active();
        self.cache.remove(&CacheKey::Repositories);
        tracing::info!("manual refresh: dropped {removed} active runs");
        self.load_overview().await
    }

    /// One network attempt. The cache is only touched on success, so a
    /// failure leaves whatever was cached (and shown) in place.
    pub async fn refresh_background(&self) -> LoadOutcome<Overview> {
        match RetryPolicy::single()
            .run("background refresh", || self.fetch_snapshot())
            .await
        {
            LoadOutcome::Loaded(snapshot) => LoadOutcome::Loaded(self.store(snapshot)),
            LoadOutcome::Transient(msg) => LoadOutcome::Transient(msg),
            LoadOutcome::Exhausted(msg) => LoadOutcome::Exhausted(msg),
        }
    }

    async fn fetch_snapshot(&self) -> Result<FetchedSnapshot, ProviderError> {
        let repositories = self.provider.list_repositories().await?;
        let mut records = Vec::new();
        if repositories.is_empty() {
            return Ok(FetchedSnapshot {
                repositories,
                records,
            });
        }

        let page_size = self.settings.page_size.max(1);
        let mut offset = 0;
        loop {
            let limit = page_size.min(self.settings.max_runs.saturating_sub(records.len()));
            if limit == 0 {
                break;
            }
            let page = self.provider.list_runs(limit, offset).await?;
            let fetched = page.len();
            records.extend(page);
            offset += fetched;
            if fetched < limit {
                break;
            }
        }
        Ok(FetchedSnapshot {
            repositories,
            records,
        })
    }

    fn store(&self, snapshot: FetchedSnapshot) -> Overview {
        let merged = merge_runs(&snapshot.repositories, snapshot.records);
        for rejected in &merged.rejected {
            tracing::warn!("dropping run record: {rejected}");
        }
        let accepted = merged.runs.len();
        let repositories = self.cache.store_snapshot(
            snapshot.repositories,
            merged.runs,
            self.settings.repositories_ttl,
        );
        tracing::info!(
            "loaded {} repositories, {accepted} runs ({} rejected)",
            repositories.len(),
            merged.rejected.len()
        );
        Overview {
            repositories,
            source: Source::Network,
            rejected: merged.rejected.len(),
        }
    }

    /// Runs of one repository, newest first. Served from the cache whenever
    /// an overview exists; otherwise the overview is loaded first.
    pub async fn runs_for(&self, repository: &RepositoryRef) -> LoadOutcome<Vec<RunSnapshot>> {
        if self.cache.overview().is_none() {
            match self.load_overview().await {
                LoadOutcome::Loaded(_) => {}
                LoadOutcome::Transient(msg) => return LoadOutcome::Transient(msg),
                LoadOutcome::Exhausted(msg) => return LoadOutcome::Exhausted(msg),
            }
        }
        LoadOutcome::Loaded(runs_of(&self.cache.runs(), repository))
    }

    fn accept_record(&self, record: RunRecord) -> Result<RunSnapshot, String> {
        let mut run = RunSnapshot::try_from(record).map_err(|e| e.to_string())?;
        if let Some(repos) = self.cache.repositories() {
            if let Some(repo) = resolve_repository(&repos, &run.repository) {
                run.repository = RepositoryRef {
                    name: Some(repo.name.clone()),
                    id: Some(repo.id),
                };
            }
        }
        self.cache.put_run(run.clone());
        Ok(run)
    }

    pub async fn run(&self, id: u64) -> LoadOutcome<RunSnapshot> {
        if let Some(run) = self.cache.run(id) {
            return LoadOutcome::Loaded(run);
        }
        match self
            .retry
            .run(&format!("get run {id}"), || self.provider.get_run(id))
            .await
        {
            LoadOutcome::Loaded(record) => match self.accept_record(record) {
                Ok(run) => LoadOutcome::Loaded(run),
                Err(msg) => LoadOutcome::Exhausted(format!("run {id} is malformed: {msg}")),
            },
            LoadOutcome::Transient(msg) => LoadOutcome::Transient(msg),
            LoadOutcome::Exhausted(msg) => LoadOutcome::Exhausted(msg),
        }
    }

    pub async fn user_info(&self) -> LoadOutcome<UserInfo> {
        if let Some(info) = self.cache.user_info() {
            return LoadOutcome::Loaded(info);
        }
        let outcome = self
            .retry
            .run("get user info", || self.provider.get_user_info())
            .await;
        if let LoadOutcome::Loaded(info) = &outcome {
            self.cache
                .set(CacheKey::UserInfo, CacheValue::UserInfo(info.clone()), None);
        }
        outcome
    }

    /// Create a run. Not retried: a repeated POST could create a duplicate.
    pub async fn create_run(&self, request: &CreateRunRequest) -> LoadOutcome<RunSnapshot> {
        let record = match RetryPolicy::single()
            .run("create run", || self.provider.create_run(request))
            .await
        {
            LoadOutcome::Loaded(record) => record,
            LoadOutcome::Transient(msg) => return LoadOutcome::Transient(msg),
            LoadOutcome::Exhausted(msg) => return LoadOutcome::Exhausted(msg),
        };
        let id = record.id;
        match self.accept_record(record) {
            Ok(run) => LoadOutcome::Loaded(run),
            // Some services answer a create with a bare id; fetch the rest.
            Err(msg) => match id {
                Some(id) => {
                    tracing::debug!("created run {id} came back partial ({msg}); fetching it");
                    self.run(id).await
                }
                None => LoadOutcome::Exhausted(format!("create returned no run id: {msg}")),
            },
        }
    }
}
