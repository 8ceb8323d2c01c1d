// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{fmt, str::FromStr};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// dotted integer version, ordered segment by segment.
///
/// a version that is a strict prefix of another orders lower, so `1.2 < 1.2.0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(Vec<u64>);

impl Version {
    pub fn new(segments: impl Into<Vec<u64>>) -> Self {
        Self(segments.into())
    }

    /// parses the leading dotted integer run of `text`.
    ///
    /// trailing text after the last numeric segment is ignored (`1.2.3-rc1` -> `1.2.3`).
    /// returns `None` when `text` does not start with a digit.
    pub fn parse(text: &str) -> Option<Self> {
        let mut segments = Vec::new();

        for part in text.trim().split('.') {
            let digits_len = part.bytes().take_while(u8::is_ascii_digit).count();
            if digits_len == 0 {
                break;
            }

            let Ok(value) = part[..digits_len].parse::<u64>() else {
                break;
            };
            segments.push(value);

            if digits_len != part.len() {
                break;
            }
        }

        (!segments.is_empty()).then_some(Self(segments))
    }

    pub fn segments(&self) -> &[u64] {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::invalid_version(s))
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// where the version token sits inside a release file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `/<project>/<version>/<project>...`, used by the best release document.
    ProjectFile,
    /// `/<project>/<version>/...`, used by the rss file listing.
    AnyFile,
}

/// recovers version tokens from release file paths of one project.
#[derive(Debug, Clone)]
pub struct VersionExtractor {
    pattern: Option<Regex>,
}

impl VersionExtractor {
    pub fn new(project: &str, anchor: Anchor) -> Self {
        let project = regex::escape(project);
        let source = match anchor {
            Anchor::ProjectFile => format!(r"^/{project}/(.*)/{project}.*$"),
            Anchor::AnyFile => format!(r"^/{project}/(.*)/.*$"),
        };

        let pattern = Regex::new(&source)
            .inspect_err(|e| log::warn!(target: "version", "unusable project pattern: {e}"))
            .ok();

        Self { pattern }
    }

    /// returns the version captured from `candidate`, if any.
    pub fn extract(&self, candidate: &str) -> Option<Version> {
        let captures = self.pattern.as_ref()?.captures(candidate)?;
        Version::parse(captures.get(1)?.as_str())
    }
}

/// one-shot form of [`VersionExtractor::extract`].
pub fn extract_version(project: &str, candidate: &str, anchor: Anchor) -> Option<Version> {
    VersionExtractor::new(project, anchor).extract(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted() {
        assert_eq!(Version::parse("1.2.3"), Some(Version::new([1, 2, 3])));
        assert_eq!(Version::parse("10"), Some(Version::new([10])));
        assert_eq!(Version::parse("0.9.1").unwrap().segments(), &[0, 9, 1]);
    }

    #[test]
    fn test_parse_stops_at_suffix() {
        assert_eq!(Version::parse("1.2.3-rc1"), Some(Version::new([1, 2, 3])));
        assert_eq!(Version::parse("2.0.beta"), Some(Version::new([2, 0])));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(Version::parse("v1.2"), None);
        assert_eq!(Version::parse(""), None);
        assert_eq!(Version::parse("latest"), None);
    }

    #[test]
    fn test_ordering() {
        let v = |s: &str| Version::parse(s).unwrap();
        assert!(v("1.10.0") > v("1.9.9"));
        assert!(v("1.2") < v("1.2.0"));
        assert!(v("2") > v("1.99"));
        assert_eq!(v("1.2.3"), v("1.2.3"));
    }

    #[test]
    fn test_display_and_serde() {
        let version = Version::new([2, 4, 1]);
        assert_eq!(version.to_string(), "2.4.1");
        assert_eq!(serde_json::to_string(&version).unwrap(), "\"2.4.1\"");
        let back: Version = serde_json::from_str("\"2.4.1\"").unwrap();
        assert_eq!(back, version);
    }

    #[test]
    fn test_extract_project_file() {
        let version = extract_version(
            "vmpk",
            "/vmpk/0.9.1/vmpk-0.9.1-win-x64-setup.exe",
            Anchor::ProjectFile,
        );
        assert_eq!(version, Some(Version::new([0, 9, 1])));
    }

    #[test]
    fn test_extract_project_file_requires_project_prefix_in_name() {
        let version = extract_version("vmpk", "/vmpk/0.9.1/setup.exe", Anchor::ProjectFile);
        assert_eq!(version, None);
    }

    #[test]
    fn test_extract_any_file() {
        let version = extract_version("vmpk", "/vmpk/0.9.1/setup.exe", Anchor::AnyFile);
        assert_eq!(version, Some(Version::new([0, 9, 1])));
    }

    #[test]
    fn test_extract_no_match() {
        let extractor = VersionExtractor::new("vmpk", Anchor::AnyFile);
        assert_eq!(extractor.extract("/other/1.0/other.tar.gz"), None);
        assert_eq!(extractor.extract("vmpk-1.0.tar.gz"), None);
        assert_eq!(extractor.extract("/vmpk/README.md"), None);
    }

    #[test]
    fn test_extract_escapes_project_name() {
        let extractor = VersionExtractor::new("foo.bar", Anchor::AnyFile);
        assert_eq!(
            extractor.extract("/foo.bar/3.1/foo.bar-3.1.tar.gz"),
            Some(Version::new([3, 1]))
        );
        assert_eq!(extractor.extract("/fooxbar/3.1/fooxbar-3.1.tar.gz"), None);
    }
}
