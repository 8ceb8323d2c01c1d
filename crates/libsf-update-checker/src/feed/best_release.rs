// SPDX-License-Identifier: MIT OR Apache-2.0

use serde_json::{Map, Value};

use crate::{
    Error, Result,
    types::{ParsedFeed, Platform, ReleaseList, ReleaseRecord},
    version::{Anchor, VersionExtractor},
};

use super::{FeedDecoder, date};

const ROOT_KEY: &str = "release";
const PLATFORM_RELEASES_KEY: &str = "platform_releases";
const PLATFORM_KEYS: [&str; 3] = ["mac", "windows", "linux"];

/// decodes `best_release.json` into one record per listed artifact.
#[derive(Debug, Clone)]
pub struct BestReleaseParser {
    project: String,
    host: String,
    versions: VersionExtractor,
}

impl BestReleaseParser {
    pub fn new(project: impl Into<String>, host: impl Into<String>) -> Self {
        let project = project.into();
        let versions = VersionExtractor::new(&project, Anchor::ProjectFile);
        Self {
            project,
            host: host.into().trim_end_matches('/').to_string(),
            versions,
        }
    }

    /// parses a complete document.
    ///
    /// the root release is always returned first, tagged `source`, followed by the
    /// mac, windows and linux entries that are present. missing or mistyped fields
    /// leave the corresponding record field empty.
    pub fn parse(&self, document: &[u8]) -> Result<ReleaseList> {
        let value: Value = serde_json::from_slice(document)?;
        let Value::Object(root) = value else {
            return Err(Error::malformed("best release document is not a json object"));
        };

        let empty = Map::new();
        let mut releases = Vec::with_capacity(1 + PLATFORM_KEYS.len());

        let release = root.get(ROOT_KEY).and_then(Value::as_object).unwrap_or(&empty);
        releases.push(self.parse_release(release, Platform::Source));

        let platforms = root
            .get(PLATFORM_RELEASES_KEY)
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        for key in PLATFORM_KEYS {
            let (Some(entry), Some(platform)) = (
                platforms.get(key).and_then(Value::as_object),
                Platform::from_release_key(key),
            ) else {
                continue;
            };
            releases.push(self.parse_release(entry, platform));
        }

        log::debug!(
            target: "best_release",
            "parsed {} release(s) for {}",
            releases.len(),
            self.project
        );

        Ok(releases)
    }

    fn parse_release(&self, entry: &Map<String, Value>, platform: Platform) -> ReleaseRecord {
        let title = string_field(entry, "filename");
        let link = if platform == Platform::Source {
            string_field(entry, "url")
        } else {
            self.download_link(&title)
        };

        ReleaseRecord::new(platform, title.as_str())
            .with_version(self.versions.extract(&title))
            .with_date(date::parse_best_release_date(&string_field(entry, "date")))
            .with_content(string_field(entry, "mime_type"))
            .with_size(size_field(entry, "bytes"))
            .with_link(link)
            .with_hash(Some(string_field(entry, "md5sum")))
    }

    fn download_link(&self, title: &str) -> String {
        let separator = if title.starts_with('/') { "" } else { "/" };
        format!(
            "{}/projects/{}/files{separator}{title}/download",
            self.host, self.project
        )
    }
}

fn string_field(entry: &Map<String, Value>, key: &str) -> String {
    entry
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn size_field(entry: &Map<String, Value>, key: &str) -> u64 {
    match entry.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// buffers the whole response, the document is only parsed once complete.
pub(crate) struct BestReleaseDecoder {
    parser: BestReleaseParser,
    buffer: Vec<u8>,
}

impl BestReleaseDecoder {
    pub(crate) fn new(parser: BestReleaseParser) -> Self {
        Self {
            parser,
            buffer: Vec::new(),
        }
    }
}

impl FeedDecoder for BestReleaseDecoder {
    fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    fn finish(self: Box<Self>) -> Result<ParsedFeed> {
        self.parser.parse(&self.buffer).map(ParsedFeed::complete)
    }
}
