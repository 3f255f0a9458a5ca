//! Runtime configuration resolved once from the command line and the
//! environment.

use crate::cli::Cli;
use crate::coordinator::CoordinatorSettings;
use crate::retry::RetryPolicy;
use color_eyre::eyre::{eyre, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "rundash";
/// Per-request timeout for the HTTP client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Immutable configuration set at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub token: Option<String>,
    /// Environment variable the token was read from.
    pub token_env: String,
    pub repository: Option<String>,
    pub retry: RetryPolicy,
    pub coordinator: CoordinatorSettings,
    /// Background refresh interval (seconds) when no run is Active.
    pub idle_interval: u64,
    pub request_timeout: Duration,
    pub state_dir: PathBuf,
    /// `None` when the disk cache is disabled.
    pub cache_path: Option<PathBuf>,
    pub verbose: bool,
    pub version_string: String,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Self::resolve(cli, |name| std::env::var_os(name))
    }

    /// `env` is the environment lookup, injectable for tests.
    pub fn resolve(cli: &Cli, env: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let base_url = cli.url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(eyre!(
                "Invalid service URL '{}'. Expected http:// or https://",
                cli.url
            ));
        }

        let token = env(&cli.token_env)
            .map(|v| v.to_string_lossy().trim().to_string())
            .filter(|v| !v.is_empty());

        let state_dir = state_dir_from(env("XDG_STATE_HOME"), env("HOME"));
        let cache_path = if cli.no_cache {
            None
        } else {
            Some(
                cli.cache_file
                    .clone()
                    .unwrap_or_else(|| state_dir.join("cache.json")),
            )
        };

        let page_size = usize::try_from(cli.limit).unwrap_or(usize::MAX);
        let max_runs = usize::try_from(cli.max_runs).unwrap_or(usize::MAX);

        Ok(Self {
            base_url,
            token,
            token_env: cli.token_env.clone(),
            repository: cli.repo.clone().filter(|r| !r.trim().is_empty()),
            retry: RetryPolicy {
                max_attempts: cli.attempts.max(1),
                ..RetryPolicy::default()
            },
            coordinator: CoordinatorSettings {
                page_size,
                max_runs,
                ..CoordinatorSettings::default()
            },
            idle_interval: cli.interval.max(1),
            request_timeout: REQUEST_TIMEOUT,
            state_dir,
            cache_path,
            verbose: cli.verbose,
            version_string: format!(
                "rundash v{}+{}",
                env!("CARGO_PKG_VERSION"),
                env!("BUILD_NUMBER")
            ),
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("debug.log")
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    /// Startup notice for a missing token. Logged once the subscriber is up.
    pub fn auth_notice(&self) -> Option<String> {
        self.token
            .is_none()
            .then(|| format!("{} not set; requests go out unauthenticated", self.token_env))
    }
}

/// `$XDG_STATE_HOME/rundash`, else `~/.local/state/rundash`, else
/// `/tmp/rundash`.
pub fn state_dir_from(xdg_state_home: Option<OsString>, home: Option<OsString>) -> PathBuf {
    if let Some(state) = xdg_state_home.filter(|s| !s.is_empty()) {
        PathBuf::from(state).join(APP_DIR)
    } else if let Some(home) = home.filter(|h| !h.is_empty()) {
        PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR)
    } else {
        PathBuf::from("/tmp").join(APP_DIR)
    }
}
