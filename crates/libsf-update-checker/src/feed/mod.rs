// SPDX-License-Identifier: MIT OR Apache-2.0

mod best_release;
mod date;
mod rss;

use std::{fs, path::Path};

pub use best_release::BestReleaseParser;
pub use rss::FeedParser;

use crate::{Config, FeedKind, ParsedFeed, Result};

/// consumes a feed response as it streams in.
pub trait FeedDecoder: Send {
    /// hands the next chunk of the response body to the decoder.
    fn feed(&mut self, chunk: &[u8]);

    /// ends the response and returns the parsed releases.
    fn finish(self: Box<Self>) -> Result<ParsedFeed>;
}

/// creates the decoder matching `kind` for the configured project.
pub fn decoder(kind: FeedKind, config: &Config) -> Box<dyn FeedDecoder> {
    match kind {
        FeedKind::BestRelease => Box::new(best_release::BestReleaseDecoder::new(
            BestReleaseParser::new(config.project.as_str(), config.host.as_str()),
        )),
        FeedKind::Rss => Box::new(FeedParser::new(config.project.as_str())),
    }
}

/// parses a complete feed document held in memory.
pub fn parse_document(kind: FeedKind, config: &Config, document: &[u8]) -> Result<ParsedFeed> {
    let mut decoder = decoder(kind, config);
    decoder.feed(document);
    decoder.finish()
}

/// reads a feed document from disk and parses it like a downloaded one.
pub fn parse_file(kind: FeedKind, config: &Config, path: &Path) -> Result<ParsedFeed> {
    let document = fs::read(path)?;
    log::debug!(
        target: "feed",
        "parsing {kind} document {} ({} bytes)",
        path.display(),
        document.len()
    );
    parse_document(kind, config, &document)
}

/// parses a saved `best_release.json`.
pub fn parse_best_release_file(path: &Path, config: &Config) -> Result<ParsedFeed> {
    parse_file(FeedKind::BestRelease, config, path)
}

/// parses a saved rss file listing.
pub fn parse_feed_file(path: &Path, config: &Config) -> Result<ParsedFeed> {
    parse_file(FeedKind::Rss, config, path)
}
