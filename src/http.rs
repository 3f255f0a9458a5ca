//! reqwest-backed [`RunsProvider`].

use crate::error::ProviderError;
use crate::model::{CreateRunRequest, Repository, RunRecord, UserInfo};
use crate::provider::{ProviderResult, RunsProvider};
use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// List endpoints answer either with a bare array or with an envelope.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "data", alias = "runs", alias = "repositories")]
        items: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { items } => items,
        }
    }
}

pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpProvider {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rundash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| eyre!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ProviderResult<T> {
        let resp = builder.send().await.map_err(classify_transport)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, body.trim()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::Exhausted(format!("invalid response body: {e}")))
    }
}

/// 5xx, 408 and 429 are worth another attempt; any other rejection is final.
pub fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let msg = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", crate::model::truncate(body, 200))
    };
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        ProviderError::Transient(msg)
    } else {
        ProviderError::Exhausted(msg)
    }
}

fn classify_transport(e: reqwest::Error) -> ProviderError {
    if e.is_builder() || e.is_redirect() {
        ProviderError::Exhausted(e.to_string())
    } else {
        ProviderError::Transient(e.to_string())
    }
}

#[async_trait]
impl RunsProvider for HttpProvider {
    async fn list_repositories(&self) -> ProviderResult<Vec<Repository>> {
        let listing: Listing<Repository> =
            self.send_json(self.request(Method::GET, "/repositories")).await?;
        Ok(listing.into_items())
    }

    async fn list_runs(&self, limit: usize, offset: usize) -> ProviderResult<Vec<RunRecord>> {
        let builder = self
            .request(Method::GET, "/runs")
            .query(&[("limit", limit), ("offset", offset)]);
        let listing: Listing<serde_json::Value> = self.send_json(builder).await?;
        // A record that does not even decode stays in the page as an empty
        // record: the page length must match what the server sent, and the
        // coordinator rejects it during validation.
        let records = listing
            .into_items()
            .into_iter()
            .map(|value| {
                RunRecord::from_json(value).unwrap_or_else(|e| {
                    tracing::debug!("undecodable run record near offset {offset}: {e}");
                    RunRecord::default()
                })
            })
            .collect();
        Ok(records)
    }

    async fn get_run(&self, id: u64) -> ProviderResult<RunRecord> {
        let value: serde_json::Value = self
            .send_json(self.request(Method::GET, &format!("/runs/{id}")))
            .await?;
        RunRecord::from_json(value).map_err(|e| ProviderError::Exhausted(e.to_string()))
    }

    async fn create_run(&self, request: &CreateRunRequest) -> ProviderResult<RunRecord> {
        let value: serde_json::Value = self
            .send_json(self.request(Method::POST, "/runs").json(request))
            .await?;
        RunRecord::from_json(value).map_err(|e| ProviderError::Exhausted(e.to_string()))
    }

    async fn get_user_info(&self) -> ProviderResult<UserInfo> {
        self.send_json(self.request(Method::GET, "/user")).await
    }
}
