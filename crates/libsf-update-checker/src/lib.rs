// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Release checks against the SourceForge file release system: the
// `best_release.json` document and the per-project rss file listing are
// fetched, normalized into release records and filtered against the running
// build.

pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod filter;
pub mod types;
pub mod version;

use std::{path::PathBuf, sync::Arc};

pub use config::{Config, Verbosity};
pub use error::{Error, Result};
pub use feed::{
    BestReleaseParser, FeedDecoder, FeedParser, parse_best_release_file, parse_document,
    parse_feed_file, parse_file,
};
pub use fetch::{FeedEvent, FetchController, HttpTransport, Transport, TransportResponse};
pub use filter::{filtered, filtered_count, is_applicable};
pub use types::{
    CheckResult, CurrentRelease, FeedKind, FeedReport, FeedStatus, JsonOutput, ParsedFeed,
    Platform, ReleaseList, ReleaseRecord,
};
pub use version::{Anchor, Version, VersionExtractor, extract_version};

/// where a feed document is read from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedSource {
    /// the configured url, fetched over http.
    #[default]
    Remote,
    /// a previously saved document.
    File(PathBuf),
}

impl FeedSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote)
    }
}

/// fetches both feeds for the configured project and filters them against
/// the configured baseline.
pub fn check_updates(config: &Config) -> Result<CheckResult> {
    check_updates_from(config, &FeedSource::Remote, &FeedSource::Remote)
}

/// like [`check_updates`], reading each feed from the given source.
///
/// a failing feed is reported in its [`FeedReport`]; only setting up the http
/// client is fatal.
pub fn check_updates_from(
    config: &Config,
    best: &FeedSource,
    rss: &FeedSource,
) -> Result<CheckResult> {
    let transport: Option<Arc<dyn Transport>> = if best.is_remote() || rss.is_remote() {
        Some(Arc::new(HttpTransport::new(config)?))
    } else {
        None
    };

    Ok(run_check(config, transport.as_ref(), best, rss))
}

/// runs a check with a caller-provided transport for remote sources.
pub fn check_updates_with(
    config: &Config,
    transport: Arc<dyn Transport>,
    best: &FeedSource,
    rss: &FeedSource,
) -> CheckResult {
    run_check(config, Some(&transport), best, rss)
}

fn run_check(
    config: &Config,
    transport: Option<&Arc<dyn Transport>>,
    best: &FeedSource,
    rss: &FeedSource,
) -> CheckResult {
    let mut result = CheckResult::new(config.current.clone());
    let (tx, rx) = crossbeam_channel::unbounded();

    // remote fetches run on their own threads while local files are parsed
    let mut controllers = Vec::new();
    for (kind, source) in [(FeedKind::BestRelease, best), (FeedKind::Rss, rss)] {
        if !source.is_remote() {
            continue;
        }

        let Some(transport) = transport else {
            result.set_report(
                kind,
                FeedReport::failed(&Error::other("no transport for remote feed")),
            );
            continue;
        };

        let controller =
            FetchController::new(kind, config.clone(), Arc::clone(transport), tx.clone());
        if controller.fetch_default() {
            controllers.push(controller);
        } else {
            let error = Error::invalid_url(config.feed_url(kind));
            result.set_report(kind, FeedReport::failed(&error));
        }
    }
    drop(tx);

    let (best_local, rss_local) = rayon::join(
        || parse_local(FeedKind::BestRelease, best, config),
        || parse_local(FeedKind::Rss, rss, config),
    );

    for (kind, outcome) in [(FeedKind::BestRelease, best_local), (FeedKind::Rss, rss_local)] {
        if let Some(outcome) = outcome {
            result.set_report(kind, report(&config.current, outcome));
        }
    }

    for _ in 0..controllers.len() {
        let Ok(event) = rx.recv() else {
            break;
        };

        log::debug!(target: "check", "{} feed done", event.kind());
        match event {
            FeedEvent::Finished { kind, feed } => {
                result.set_report(kind, FeedReport::from_feed(&config.current, feed));
            }
            FeedEvent::Failed { kind, error } => {
                result.set_report(kind, FeedReport::failed(&error));
            }
        }
    }

    log::debug!(
        target: "check",
        "{}: {} best release update(s), {} rss update(s)",
        config.project,
        result.best.update_count,
        result.rss.update_count
    );

    result
}

fn parse_local(
    kind: FeedKind,
    source: &FeedSource,
    config: &Config,
) -> Option<Result<ParsedFeed>> {
    match source {
        FeedSource::Remote => None,
        FeedSource::File(path) => Some(parse_file(kind, config, path)),
    }
}

fn report(current: &CurrentRelease, outcome: Result<ParsedFeed>) -> FeedReport {
    match outcome {
        Ok(feed) => FeedReport::from_feed(current, feed),
        Err(e) => {
            log::warn!(target: "check", "{e}");
            FeedReport::failed(&e)
        }
    }
}
