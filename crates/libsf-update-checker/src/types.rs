// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, Version, filter};

/// the platform a release artifact is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Source,
    Mac,
    Windows,
    Linux,
}

impl Platform {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Mac => "mac",
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }

    /// the platform this binary was built for.
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Mac
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    /// maps a `platform_releases` key of the best release document.
    pub fn from_release_key(key: &str) -> Option<Self> {
        match key {
            "mac" => Some(Self::Mac),
            "windows" => Some(Self::Windows),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    /// infers the platform from the extension of a release file name.
    ///
    /// only installer formats are recognized, everything else counts as source.
    pub fn from_file_name(name: &str) -> Self {
        let file_name = name.rsplit('/').next().unwrap_or(name);
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext);

        match extension {
            Some("exe") => Self::Windows,
            Some("dmg") => Self::Mac,
            Some("AppImage") => Self::Linux,
            _ => Self::Source,
        }
    }

    pub const fn all() -> &'static [Platform] {
        &[Self::Source, Self::Mac, Self::Windows, Self::Linux]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "mac" | "macos" | "darwin" => Ok(Self::Mac),
            "windows" | "win" | "winnt" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            other => Err(Error::config(format!("unknown platform '{other}'"))),
        }
    }
}

/// one published release artifact, normalized from either feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub title: String,
    pub content: String,
    pub size: u64,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ReleaseRecord {
    pub fn new(platform: Platform, title: impl Into<String>) -> Self {
        Self {
            version: None,
            platform,
            date: None,
            title: title.into(),
            content: String::new(),
            size: 0,
            link: String::new(),
            hash: None,
        }
    }

    pub fn with_version(mut self, version: Option<Version>) -> Self {
        self.version = version;
        self
    }

    pub fn with_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.date = date;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_hash(mut self, hash: Option<String>) -> Self {
        self.hash = hash.filter(|h| !h.is_empty());
        self
    }
}

/// releases in the order they were discovered.
pub type ReleaseList = Vec<ReleaseRecord>;

/// the release of the running software, compared against discovered releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentRelease {
    pub version: Version,
    pub platform: Platform,
    pub date: DateTime<Utc>,
}

impl CurrentRelease {
    pub fn new(version: Version, platform: Platform, date: DateTime<Utc>) -> Self {
        Self {
            version,
            platform,
            date,
        }
    }

    /// builds a baseline from textual build metadata.
    ///
    /// `date` must be RFC 3339 (`2024-01-01T00:00:00Z`).
    pub fn parse(version: &str, platform: Platform, date: &str) -> Result<Self> {
        let version = version.parse()?;
        let date = DateTime::parse_from_rfc3339(date)
            .map_err(|e| Error::invalid_date(format!("{date}: {e}")))?
            .with_timezone(&Utc);
        Ok(Self::new(version, platform, date))
    }

    /// baseline for this build: package version, target platform, and the build
    /// date from `SF_UPDATE_CHECKER_BUILD_DATE` (unix epoch if unset).
    pub fn from_build() -> Self {
        let version = Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_default();
        let date = option_env!("SF_UPDATE_CHECKER_BUILD_DATE")
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self::new(version, Platform::current(), date)
    }

    pub fn is_update(&self, record: &ReleaseRecord) -> bool {
        filter::is_applicable(self, record)
    }

    pub fn filtered(&self, records: &[ReleaseRecord]) -> ReleaseList {
        filter::filtered(self, records)
    }

    pub fn filtered_count(&self, records: &[ReleaseRecord]) -> usize {
        filter::filtered_count(self, records)
    }
}

/// the two feeds published for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    /// `best_release.json`, one preferred release per platform.
    BestRelease,
    /// the rss file listing with the release history.
    Rss,
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BestRelease => write!(f, "best release"),
            Self::Rss => write!(f, "rss"),
        }
    }
}

/// how a feed document ended.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum FeedStatus {
    #[default]
    Complete,
    /// the document stopped early; releases up to that point are kept.
    Truncated,
    /// a structural error stopped parsing; releases before it are kept.
    Malformed(String),
}

/// result of one parse pass over a feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFeed {
    pub releases: ReleaseList,
    pub status: FeedStatus,
}

impl ParsedFeed {
    pub fn complete(releases: ReleaseList) -> Self {
        Self {
            releases,
            status: FeedStatus::Complete,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.status == FeedStatus::Truncated
    }
}

/// outcome of checking a single feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedReport {
    pub releases: ReleaseList,
    pub updates: ReleaseList,
    pub update_count: usize,
    pub status: FeedStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedReport {
    pub fn from_feed(current: &CurrentRelease, feed: ParsedFeed) -> Self {
        let updates = current.filtered(&feed.releases);
        Self {
            update_count: updates.len(),
            updates,
            releases: feed.releases,
            status: feed.status,
            error: None,
        }
    }

    pub fn failed(error: &Error) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// combined results of both feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub current: CurrentRelease,
    pub best: FeedReport,
    pub rss: FeedReport,
}

impl CheckResult {
    pub fn new(current: CurrentRelease) -> Self {
        Self {
            current,
            best: FeedReport::default(),
            rss: FeedReport::default(),
        }
    }

    pub fn report(&self, kind: FeedKind) -> &FeedReport {
        match kind {
            FeedKind::BestRelease => &self.best,
            FeedKind::Rss => &self.rss,
        }
    }

    pub fn set_report(&mut self, kind: FeedKind, report: FeedReport) {
        match kind {
            FeedKind::BestRelease => self.best = report,
            FeedKind::Rss => self.rss = report,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.best.is_failed() || self.rss.is_failed()
    }

    pub fn update_count(&self) -> usize {
        self.best.update_count + self.rss.update_count
    }
}

/// JSON output structures for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            data: None,
        }
    }
}
