//! Upstream runs-service seam.
//!
//! Implementations own transport and authentication. They classify every
//! failure as [`ProviderError::Transient`] or [`ProviderError::Exhausted`];
//! the coordinator never sees a raw transport error.

use crate::error::ProviderError;
use crate::model::{CreateRunRequest, Repository, RunRecord, UserInfo};
use async_trait::async_trait;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait]
pub trait RunsProvider: Send + Sync {
    async fn list_repositories(&self) -> ProviderResult<Vec<Repository>>;
    /// One page of runs across all repositories. Records are returned
    /// unvalidated; a short page means there are no more.
    async fn list_runs(&self, limit: usize, offset: usize) -> ProviderResult<Vec<RunRecord>>;
    async fn get_run(&self, id: u64) -> ProviderResult<RunRecord>;
    async fn create_run(&self, request: &CreateRunRequest) -> ProviderResult<RunRecord>;
    async fn get_user_info(&self) -> ProviderResult<UserInfo>;
}
