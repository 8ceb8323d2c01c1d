// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use crate::{CurrentRelease, FeedKind};

pub const DEFAULT_HOST: &str = "https://sourceforge.net";
pub const USER_AGENT: &str = concat!("sf-update-checker/", env!("CARGO_PKG_VERSION"));
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// verbosity level for operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quiet => write!(f, "quiet"),
            Self::Normal => write!(f, "normal"),
            Self::Verbose => write!(f, "verbose"),
        }
    }
}

/// configuration for update checks.
///
/// consumers can construct this directly without any config file parsing;
/// the cli layers its toml file and flags on top.
#[derive(Debug, Clone)]
pub struct Config {
    /// sourceforge project identifier, also the top-level directory of its files.
    pub project: String,

    /// base url of the release host, without trailing slash.
    pub host: String,

    /// release the discovered releases are compared against.
    pub current: CurrentRelease,

    /// user agent sent with every request.
    pub user_agent: String,
}

impl Config {
    /// creates a config for `project` with the baseline of this build.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            host: DEFAULT_HOST.to_string(),
            current: CurrentRelease::from_build(),
            user_agent: USER_AGENT.to_string(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_current(mut self, current: CurrentRelease) -> Self {
        self.current = current;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn best_release_url(&self) -> String {
        format!("{}/projects/{}/best_release.json", self.host, self.project)
    }

    pub fn rss_url(&self) -> String {
        format!("{}/projects/{}/rss?path=/{}", self.host, self.project, self.project)
    }

    pub fn feed_url(&self, kind: FeedKind) -> String {
        match kind {
            FeedKind::BestRelease => self.best_release_url(),
            FeedKind::Rss => self.rss_url(),
        }
    }
}
