#![allow(dead_code)]

use async_trait::async_trait;
use rundash::app::{self, App, Effect};
use rundash::cache::{SessionCache, SharedCache};
use rundash::coordinator::{Coordinator, CoordinatorSettings};
use rundash::error::ProviderError;
use rundash::model::{CreateRunRequest, Repository, RunRecord, UserInfo};
use rundash::provider::{ProviderResult, RunsProvider};
use rundash::retry::RetryPolicy;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub fn repo(id: u64, name: &str) -> Repository {
    Repository {
        id,
        name: name.to_string(),
    }
}

/// A well-formed record. Later ids get later timestamps.
pub fn record(id: u64, repository: &str, status: &str) -> RunRecord {
    let at = format!("2024-06-01T10:{:02}:00Z", id % 60);
    RunRecord {
        id: Some(id),
        title: Some(format!("Run {id}")),
        status: Some(status.to_string()),
        repository: Some(repository.to_string()),
        repository_id: None,
        created_at: Some(at.clone()),
        updated_at: Some(at),
        created_by: Some("ci-bot".to_string()),
        message: None,
    }
}

/// Scripted in-memory runs service.
///
/// `failures` are consumed one per `list_repositories` or `create_run`
/// call, before any data is returned.
#[derive(Default)]
pub struct MockProvider {
    pub repositories: Mutex<Vec<Repository>>,
    pub runs: Mutex<Vec<RunRecord>>,
    pub failures: Mutex<VecDeque<ProviderError>>,
    pub user: Mutex<Option<UserInfo>>,
    pub repository_calls: AtomicUsize,
    pub page_calls: Mutex<Vec<(usize, usize)>>,
    pub create_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(repositories: Vec<Repository>, runs: Vec<RunRecord>) -> Arc<Self> {
        let provider = Self::default();
        *provider.repositories.lock().unwrap() = repositories;
        *provider.runs.lock().unwrap() = runs;
        Arc::new(provider)
    }

    pub fn fail_with(&self, errors: impl IntoIterator<Item = ProviderError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub fn set_runs(&self, runs: Vec<RunRecord>) {
        *self.runs.lock().unwrap() = runs;
    }

    pub fn repository_calls(&self) -> usize {
        self.repository_calls.load(Ordering::SeqCst)
    }

    pub fn pages(&self) -> Vec<(usize, usize)> {
        self.page_calls.lock().unwrap().clone()
    }

    fn next_failure(&self) -> Option<ProviderError> {
        self.failures.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl RunsProvider for MockProvider {
    async fn list_repositories(&self) -> ProviderResult<Vec<Repository>> {
        self.repository_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_failure() {
            return Err(error);
        }
        Ok(self.repositories.lock().unwrap().clone())
    }

    async fn list_runs(&self, limit: usize, offset: usize) -> ProviderResult<Vec<RunRecord>> {
        self.page_calls.lock().unwrap().push((limit, offset));
        let runs = self.runs.lock().unwrap();
        Ok(runs.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn get_run(&self, id: u64) -> ProviderResult<RunRecord> {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == Some(id))
            .cloned()
            .ok_or_else(|| ProviderError::Exhausted(format!("run {id} not found")))
    }

    async fn create_run(&self, request: &CreateRunRequest) -> ProviderResult<RunRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_failure() {
            return Err(error);
        }
        let mut runs = self.runs.lock().unwrap();
        let id = runs.iter().filter_map(|r| r.id).max().unwrap_or(0) + 1;
        let mut created = record(id, &request.repository, "queued");
        created.title.clone_from(&request.title);
        runs.push(created.clone());
        Ok(created)
    }

    async fn get_user_info(&self) -> ProviderResult<UserInfo> {
        self.user
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::Exhausted("HTTP 401: unauthorized".to_string()))
    }
}

pub fn no_backoff(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::ZERO, Duration::ZERO)
}

pub fn coordinator_with(
    provider: Arc<MockProvider>,
    cache: SharedCache,
    attempts: u32,
    settings: CoordinatorSettings,
) -> Coordinator {
    Coordinator::new(provider, cache, no_backoff(attempts), settings)
}

pub fn coordinator(provider: Arc<MockProvider>, attempts: u32) -> Coordinator {
    coordinator_with(
        provider,
        SessionCache::shared(),
        attempts,
        CoordinatorSettings::default(),
    )
}

/// Run every load effect to completion and feed its result back, the way
/// the main loop does. Timers, persistence and quit are dropped.
pub async fn drive(app: &mut App, coordinator: &Coordinator, effects: Vec<Effect>) {
    let mut queue: VecDeque<Effect> = effects.into();
    while let Some(effect) = queue.pop_front() {
        if matches!(
            effect,
            Effect::ChordTimeout { .. } | Effect::ClearMessage { .. } | Effect::Persist | Effect::Quit
        ) {
            continue;
        }
        if let Some(event) = app::perform(coordinator, effect).await {
            queue.extend(app.handle_event(event, Instant::now()));
        }
    }
}
