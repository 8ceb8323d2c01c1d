// SPDX-License-Identifier: MIT OR Apache-2.0

use quick_xml::{
    Reader,
    errors::{IllFormedError, SyntaxError},
    escape::resolve_predefined_entity,
    events::{BytesRef, BytesStart, Event},
};

use crate::{
    Result,
    types::{FeedStatus, ParsedFeed, Platform, ReleaseList, ReleaseRecord},
    version::{Anchor, VersionExtractor},
};

use super::{FeedDecoder, date};

const ITEM_TAG: &[u8] = b"item";
const CONTENT_TAG: &[u8] = b"content";
const CDATA_OPEN_LEN: usize = b"<![CDATA[".len();

/// item child elements whose text is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    PubDate,
    Link,
    Hash,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"pubDate" => Some(Self::PubDate),
            b"link" => Some(Self::Link),
            b"hash" => Some(Self::Hash),
            _ => None,
        }
    }
}

/// raw text collected for the item currently being parsed.
#[derive(Debug, Default)]
struct ItemScratch {
    title: String,
    pub_date: String,
    content_type: String,
    size: String,
    link: String,
    hash: String,
}

impl ItemScratch {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::PubDate => &mut self.pub_date,
            Field::Link => &mut self.link,
            Field::Hash => &mut self.hash,
        }
    }
}

/// incremental parser for the sourceforge rss file listing.
///
/// bytes can be fed as they arrive; every call resumes where the previous one
/// stopped. constructs cut off at the end of the available data (a text run, an
/// unclosed tag or cdata section) are kept back until more bytes are fed.
/// element nesting is tracked here rather than by the xml reader so the state
/// survives between calls.
#[derive(Debug)]
pub struct FeedParser {
    project: String,
    versions: VersionExtractor,
    pending: Vec<u8>,
    open_elements: Vec<Vec<u8>>,
    current_field: Option<Field>,
    in_item: bool,
    seen_root: bool,
    scratch: ItemScratch,
    releases: ReleaseList,
    error: Option<String>,
}

impl FeedParser {
    pub fn new(project: impl Into<String>) -> Self {
        let project = project.into();
        let versions = VersionExtractor::new(&project, Anchor::AnyFile);
        Self {
            project,
            versions,
            pending: Vec::new(),
            open_elements: Vec::new(),
            current_field: None,
            in_item: false,
            seen_root: false,
            scratch: ItemScratch::default(),
            releases: Vec::new(),
            error: None,
        }
    }

    /// parses a complete document in one pass.
    pub fn parse_document(project: impl Into<String>, document: &[u8]) -> ParsedFeed {
        let mut parser = Self::new(project);
        parser.feed(document);
        parser.finish()
    }

    /// feeds the next chunk of the stream.
    ///
    /// does nothing once a structural error was found.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.error.is_some() {
            return;
        }
        self.pending.extend_from_slice(chunk);
        self.drain(false);
    }

    /// releases parsed so far, in document order.
    pub fn releases(&self) -> &[ReleaseRecord] {
        &self.releases
    }

    /// the structural error that stopped parsing, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// ends the stream and reports how the document ended.
    pub fn finish(mut self) -> ParsedFeed {
        let mut truncated = false;
        if self.error.is_none() {
            truncated = self.drain(true);
        }

        let status = if let Some(error) = self.error.take() {
            FeedStatus::Malformed(error)
        } else if truncated
            || !self.pending.is_empty()
            || !self.open_elements.is_empty()
            || !self.seen_root
        {
            log::debug!(
                target: "rss",
                "feed for {} ended early after {} release(s)",
                self.project,
                self.releases.len()
            );
            FeedStatus::Truncated
        } else {
            FeedStatus::Complete
        };

        ParsedFeed {
            releases: self.releases,
            status,
        }
    }

    /// processes every complete construct in `pending`.
    /// returns true when the data ends inside a construct.
    fn drain(&mut self, at_end: bool) -> bool {
        let input = std::mem::take(&mut self.pending);
        let mut reader = Reader::from_reader(input.as_slice());
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut consumed = 0;
        let mut incomplete = false;

        loop {
            let event = reader.read_event();
            let position = usize::try_from(reader.buffer_position()).unwrap_or(input.len());

            match event {
                Ok(Event::Eof) => break,
                Ok(Event::Text(_)) if position >= input.len() && !at_end => break,
                Ok(event) => {
                    consumed = position;
                    if let Err(message) = self.handle_event(event) {
                        self.fail(message);
                        consumed = input.len();
                        break;
                    }
                }
                Err(e) if is_premature_end(&e, input.len() - consumed) => {
                    incomplete = true;
                    break;
                }
                Err(e) => {
                    self.fail(format!("{e} at byte {}", reader.error_position()));
                    consumed = input.len();
                    break;
                }
            }
        }

        self.pending = input[consumed..].to_vec();
        incomplete
    }

    fn handle_event(&mut self, event: Event<'_>) -> std::result::Result<(), String> {
        match event {
            Event::Start(e) => {
                self.start_element(&e);
                self.open_elements.push(e.name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                self.start_element(&e);
                self.current_field = None;
                if e.local_name().as_ref() == ITEM_TAG {
                    self.finish_item();
                }
            }
            Event::End(e) => {
                let name = e.name();
                match self.open_elements.pop() {
                    Some(open) if open == name.as_ref() => {}
                    Some(open) => {
                        return Err(format!(
                            "mismatched end tag: expected </{}>, found </{}>",
                            String::from_utf8_lossy(&open),
                            String::from_utf8_lossy(name.as_ref())
                        ));
                    }
                    None => {
                        return Err(format!(
                            "unexpected end tag </{}>",
                            String::from_utf8_lossy(name.as_ref())
                        ));
                    }
                }

                self.current_field = None;
                if e.local_name().as_ref() == ITEM_TAG && self.in_item {
                    self.finish_item();
                }
            }
            Event::Text(e) => self.append_text(&String::from_utf8_lossy(&e)),
            Event::CData(e) => self.append_text(&String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => {
                if let Some(text) = resolve_reference(&e) {
                    self.append_text(&text);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn start_element(&mut self, e: &BytesStart<'_>) {
        self.seen_root = true;
        let local_name = e.local_name();
        let name = local_name.as_ref();

        if name == ITEM_TAG {
            self.in_item = true;
            self.scratch = ItemScratch::default();
        } else if name == CONTENT_TAG && self.in_item {
            self.scratch.content_type = attribute(e, b"type");
            self.scratch.size = attribute(e, b"filesize");
        }

        self.current_field = Field::from_local_name(name);
    }

    fn append_text(&mut self, text: &str) {
        let (true, Some(field)) = (self.in_item, self.current_field) else {
            return;
        };

        let target = self.scratch.field_mut(field);
        // whitespace only matters between two pieces of the same value
        if text.trim().is_empty() && target.is_empty() {
            return;
        }
        target.push_str(text);
    }

    fn finish_item(&mut self) {
        self.in_item = false;
        let scratch = std::mem::take(&mut self.scratch);
        let title = scratch.title.trim();

        let record = ReleaseRecord::new(Platform::from_file_name(title), title)
            .with_version(self.versions.extract(title))
            .with_date(date::parse_pub_date(&scratch.pub_date))
            .with_content(scratch.content_type)
            .with_size(scratch.size.trim().parse().unwrap_or(0))
            .with_link(scratch.link.trim())
            .with_hash(Some(scratch.hash.trim().to_string()));

        log::trace!(target: "rss", "release {} ({})", record.title, record.platform);
        self.releases.push(record);
    }

    fn fail(&mut self, message: String) {
        log::warn!(
            target: "rss",
            "xml error in feed for {}: {message} ({} release(s) kept)",
            self.project,
            self.releases.len()
        );
        self.error = Some(message);
    }
}

impl FeedDecoder for FeedParser {
    fn feed(&mut self, chunk: &[u8]) {
        FeedParser::feed(self, chunk);
    }

    fn finish(self: Box<Self>) -> Result<ParsedFeed> {
        Ok(FeedParser::finish(*self))
    }
}

/// syntax errors other than invalid `<!` markup mean the input stopped inside
/// a construct; `<!` markup may also be cut before its kind is known. a
/// reference without its `;` is a text run cut at the end of the data.
fn is_premature_end(error: &quick_xml::Error, remaining: usize) -> bool {
    match error {
        quick_xml::Error::Syntax(SyntaxError::InvalidBangMarkup) => remaining < CDATA_OPEN_LEN,
        quick_xml::Error::Syntax(_) => true,
        quick_xml::Error::IllFormed(IllFormedError::UnclosedReference) => true,
        _ => false,
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> String {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
        .unwrap_or_default()
}

fn resolve_reference(e: &BytesRef<'_>) -> Option<String> {
    if let Ok(Some(ch)) = e.resolve_char_ref() {
        return Some(ch.to_string());
    }
    let name = e.decode().ok()?;
    resolve_predefined_entity(&name).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:files="https://sourceforge.net/api/files.rdf#" xmlns:media="http://video.search.yahoo.com/mrss/" version="2.0">
  <channel>
    <title>VMPK files</title>
    <link>https://sourceforge.net</link>
    <description>Files from VMPK</description>
    <item>
      <title><![CDATA[/vmpk/0.9.1/vmpk-0.9.1-win-x64-setup.exe]]></title>
      <link>https://sourceforge.net/projects/vmpk/files/vmpk/0.9.1/vmpk-0.9.1-win-x64-setup.exe/download</link>
      <guid>https://sourceforge.net/projects/vmpk/files/vmpk/0.9.1/vmpk-0.9.1-win-x64-setup.exe/download</guid>
      <pubDate>Mon, 15 Jan 2024 10:30:00 UT</pubDate>
      <description><![CDATA[/vmpk/0.9.1/vmpk-0.9.1-win-x64-setup.exe]]></description>
      <files:sf-file-id xmlns:files="https://sourceforge.net/api/files.rdf#">1</files:sf-file-id>
      <media:content type="application/x-dosexec; charset=binary" url="https://sourceforge.net/projects/vmpk/files/vmpk/0.9.1/vmpk-0.9.1-win-x64-setup.exe/download" filesize="25000000"><media:hash algo="md5">11111111111111111111111111111111</media:hash></media:content>
    </item>
    <item>
      <title><![CDATA[/vmpk/0.9.1/vmpk-0.9.1-mac-x64.dmg]]></title>
      <link>https://sourceforge.net/projects/vmpk/files/vmpk/0.9.1/vmpk-0.9.1-mac-x64.dmg/download</link>
      <pubDate>Mon, 15 Jan 2024 10:25:00 UT</pubDate>
      <media:content type="application/x-apple-diskimage; charset=binary" filesize="30010123"><media:hash algo="md5">7c1b7d6e8e6d9f0b7a2f2f1c9d3e4a5b</media:hash></media:content>
    </item>
    <item>
      <title><![CDATA[/vmpk/0.9.0/vmpk-0.9.0-x86_64.AppImage]]></title>
      <link>https://sourceforge.net/projects/vmpk/files/vmpk/0.9.0/vmpk-0.9.0-x86_64.AppImage/download</link>
      <pubDate>Sun, 10 Sep 2023 08:00:00 UT</pubDate>
      <media:content type="application/x-executable; charset=binary" filesize="40000000"/>
    </item>
    <item>
      <title><![CDATA[/vmpk/0.9.0/vmpk-0.9.0.tar.bz2]]></title>
      <link>https://sourceforge.net/projects/vmpk/files/vmpk/0.9.0/vmpk-0.9.0.tar.bz2/download</link>
      <pubDate>Sun, 10 Sep 2023 07:00:00 UT</pubDate>
      <media:content type="application/x-bzip2; charset=binary" filesize="1500000"><media:hash algo="md5">33333333333333333333333333333333</media:hash></media:content>
    </item>
  </channel>
</rss>
"#;

    fn platforms(feed: &ParsedFeed) -> Vec<Platform> {
        feed.releases.iter().map(|r| r.platform).collect()
    }

    #[test]
    fn test_parse_complete_feed() {
        let feed = FeedParser::parse_document("vmpk", FEED.as_bytes());
        assert_eq!(feed.status, FeedStatus::Complete);
        assert_eq!(
            platforms(&feed),
            vec![
                Platform::Windows,
                Platform::Mac,
                Platform::Linux,
                Platform::Source
            ]
        );
    }

    #[test]
    fn test_item_fields() {
        let feed = FeedParser::parse_document("vmpk", FEED.as_bytes());
        let first = &feed.releases[0];
        assert_eq!(first.title, "/vmpk/0.9.1/vmpk-0.9.1-win-x64-setup.exe");
        assert_eq!(first.version.as_ref().unwrap().to_string(), "0.9.1");
        assert_eq!(
            first.link,
            "https://sourceforge.net/projects/vmpk/files/vmpk/0.9.1/vmpk-0.9.1-win-x64-setup.exe/download"
        );
        assert_eq!(first.content, "application/x-dosexec; charset=binary");
        assert_eq!(first.size, 25000000);
        assert_eq!(
            first.hash.as_deref(),
            Some("11111111111111111111111111111111")
        );
        assert_eq!(
            first.date.unwrap().to_rfc3339(),
            "2024-01-15T10:30:00+00:00"
        );
    }

    #[test]
    fn test_empty_content_element_sets_metadata() {
        let feed = FeedParser::parse_document("vmpk", FEED.as_bytes());
        let appimage = &feed.releases[2];
        assert_eq!(appimage.content, "application/x-executable; charset=binary");
        assert_eq!(appimage.size, 40000000);
        assert_eq!(appimage.hash, None);
    }

    #[test]
    fn test_channel_fields_do_not_leak_into_items() {
        let feed = FeedParser::parse_document("vmpk", FEED.as_bytes());
        assert!(feed.releases.iter().all(|r| r.title.starts_with("/vmpk/")));
    }

    #[test]
    fn test_truncated_after_first_item() {
        let cut = FEED.find("</item>").unwrap() + "</item>".len();
        let feed = FeedParser::parse_document("vmpk", &FEED.as_bytes()[..cut]);
        assert_eq!(feed.status, FeedStatus::Truncated);
        assert_eq!(feed.releases.len(), 1);
        assert_eq!(feed.releases[0].platform, Platform::Windows);
        assert!(feed.releases[0].date.is_some());
    }

    #[test]
    fn test_truncated_inside_tag() {
        let cut = FEED.find("<media:content type=\"application/x-apple").unwrap() + 10;
        let feed = FeedParser::parse_document("vmpk", &FEED.as_bytes()[..cut]);
        assert_eq!(feed.status, FeedStatus::Truncated);
        assert_eq!(feed.releases.len(), 1);
    }

    #[test]
    fn test_incremental_chunks_match_single_pass() {
        let whole = FeedParser::parse_document("vmpk", FEED.as_bytes());

        for chunk_size in [1, 7, 64, 333] {
            let mut parser = FeedParser::new("vmpk");
            for chunk in FEED.as_bytes().chunks(chunk_size) {
                parser.feed(chunk);
            }
            let feed = parser.finish();
            assert_eq!(feed, whole, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_releases_visible_while_streaming() {
        let cut = FEED.find("<item>").unwrap();
        let second = FEED[cut + 1..].find("<item>").unwrap() + cut + 1;

        let mut parser = FeedParser::new("vmpk");
        parser.feed(&FEED.as_bytes()[..second]);
        assert_eq!(parser.releases().len(), 1);
        parser.feed(&FEED.as_bytes()[second..]);
        assert_eq!(parser.releases().len(), 4);
    }

    #[test]
    fn test_malformed_keeps_earlier_releases() {
        let cut = FEED.find("</item>").unwrap() + "</item>".len();
        let mut document = FEED[..cut].to_string();
        document.push_str("<item><title>/vmpk/1.0/x.exe</link></item></channel></rss>");

        let feed = FeedParser::parse_document("vmpk", document.as_bytes());
        assert!(matches!(feed.status, FeedStatus::Malformed(_)));
        assert_eq!(feed.releases.len(), 1);
    }

    #[test]
    fn test_feed_ignored_after_error() {
        let mut parser = FeedParser::new("vmpk");
        parser.feed(b"<rss><channel></rss>");
        assert!(parser.error().is_some());
        parser.feed(b"<item><title>/vmpk/1.0/x.exe</title></item>");
        assert!(parser.releases().is_empty());
    }

    #[test]
    fn test_entities_in_text() {
        let document = r#"<rss><channel><item>
            <title>/vmpk/1.0/vmpk &amp; friends.exe</title>
            <link>https://example.org/?a=1&amp;b=2</link>
            <pubDate>Mon, 15 Jan 2024 10:30:00 UT</pubDate>
        </item></channel></rss>"#;
        let feed = FeedParser::parse_document("vmpk", document.as_bytes());
        assert_eq!(feed.status, FeedStatus::Complete);
        assert_eq!(feed.releases[0].title, "/vmpk/1.0/vmpk & friends.exe");
        assert_eq!(feed.releases[0].link, "https://example.org/?a=1&b=2");
        assert_eq!(feed.releases[0].platform, Platform::Windows);
    }

    const ENTITY_FEED: &str = "<rss><channel>\
        <item><title>/vmpk/1.0/vmpk &amp; co.exe</title>\
        <link>https://example.org/?a=1&amp;b=2</link>\
        <pubDate>Mon, 15 Jan 2024 10:30:00 UT</pubDate></item>\
        <item><title>/vmpk/1.1/&#x41;&#66;.dmg</title></item>\
        </channel></rss>";

    #[test]
    fn test_references_split_across_chunks() {
        let whole = FeedParser::parse_document("vmpk", ENTITY_FEED.as_bytes());
        assert_eq!(whole.status, FeedStatus::Complete);
        assert_eq!(whole.releases.len(), 2);
        assert_eq!(whole.releases[0].title, "/vmpk/1.0/vmpk & co.exe");
        assert_eq!(whole.releases[0].link, "https://example.org/?a=1&b=2");
        assert_eq!(whole.releases[1].title, "/vmpk/1.1/AB.dmg");

        for chunk_size in 1..=16 {
            let mut parser = FeedParser::new("vmpk");
            for chunk in ENTITY_FEED.as_bytes().chunks(chunk_size) {
                parser.feed(chunk);
            }
            assert_eq!(parser.error(), None, "chunk size {chunk_size}");
            assert_eq!(parser.finish(), whole, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_stream_ending_inside_reference_is_truncated() {
        let cut = ENTITY_FEED.find("&amp;").unwrap() + "&am".len();

        let mut parser = FeedParser::new("vmpk");
        parser.feed(&ENTITY_FEED.as_bytes()[..cut]);
        assert_eq!(parser.error(), None);

        let feed = parser.finish();
        assert!(feed.is_truncated());
        assert!(feed.releases.is_empty());
    }

    #[test]
    fn test_unparsable_fields_are_empty() {
        let document = r#"<rss><channel><item>
            <title>README.md</title>
            <pubDate>sometime</pubDate>
            <content type="text/plain" filesize="many"/>
        </item></channel></rss>"#;
        let feed = FeedParser::parse_document("vmpk", document.as_bytes());
        let record = &feed.releases[0];
        assert_eq!(record.platform, Platform::Source);
        assert_eq!(record.version, None);
        assert_eq!(record.date, None);
        assert_eq!(record.size, 0);
        assert_eq!(record.content, "text/plain");
    }

    #[test]
    fn test_empty_document_is_truncated() {
        let feed = FeedParser::parse_document("vmpk", b"");
        assert_eq!(feed.status, FeedStatus::Truncated);
        assert!(feed.releases.is_empty());
    }

    #[test]
    fn test_empty_channel_is_complete() {
        let feed = FeedParser::parse_document("vmpk", b"<rss><channel></channel></rss>");
        assert_eq!(feed.status, FeedStatus::Complete);
        assert!(feed.releases.is_empty());
    }
}
