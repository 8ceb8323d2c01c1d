// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

const BEST_RELEASE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// parses a best release timestamp (`2024-01-15 10:20:30`), which is utc without a marker.
pub(crate) fn parse_best_release_date(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), BEST_RELEASE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// parses an rss `pubDate` (`Mon, 15 Jan 2024 10:20:30 UT`).
///
/// the zone token is resolved separately: named utc zones (`UT`, `UTC`, `GMT`, `Z`)
/// and numeric `+hhmm` offsets are accepted, a missing zone means utc.
pub(crate) fn parse_pub_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(text, PUB_DATE_FORMAT) {
        return Some(naive.and_utc());
    }

    let (stamp, zone) = text.rsplit_once(char::is_whitespace)?;
    let offset = zone_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(stamp.trim_end(), PUB_DATE_FORMAT).ok()?;
    let local = naive.and_local_timezone(offset).single()?;

    Some(local.with_timezone(&Utc))
}

fn zone_offset(zone: &str) -> Option<FixedOffset> {
    match zone {
        "UT" | "UTC" | "GMT" | "Z" => return FixedOffset::east_opt(0),
        _ => {}
    }

    let (sign, digits) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_best_release_date() {
        assert_eq!(
            parse_best_release_date("2024-01-15 10:20:30"),
            Some(utc("2024-01-15T10:20:30Z"))
        );
    }

    #[test]
    fn test_best_release_date_invalid() {
        assert_eq!(parse_best_release_date(""), None);
        assert_eq!(parse_best_release_date("2024-01-15T10:20:30Z"), None);
        assert_eq!(parse_best_release_date("2024-02-30 00:00:00"), None);
    }

    #[test]
    fn test_pub_date_ut_zone() {
        assert_eq!(
            parse_pub_date("Mon, 15 Jan 2024 10:20:30 UT"),
            Some(utc("2024-01-15T10:20:30Z"))
        );
    }

    #[test]
    fn test_pub_date_named_zones() {
        let expected = Some(utc("2024-01-15T10:20:30Z"));
        assert_eq!(parse_pub_date("Mon, 15 Jan 2024 10:20:30 UTC"), expected);
        assert_eq!(parse_pub_date("Mon, 15 Jan 2024 10:20:30 GMT"), expected);
        assert_eq!(parse_pub_date("Mon, 15 Jan 2024 10:20:30"), expected);
    }

    #[test]
    fn test_pub_date_numeric_offset() {
        assert_eq!(
            parse_pub_date("Mon, 15 Jan 2024 12:20:30 +0200"),
            Some(utc("2024-01-15T10:20:30Z"))
        );
        assert_eq!(
            parse_pub_date("Mon, 15 Jan 2024 05:20:30 -0500"),
            Some(utc("2024-01-15T10:20:30Z"))
        );
    }

    #[test]
    fn test_pub_date_unknown_zone() {
        assert_eq!(parse_pub_date("Mon, 15 Jan 2024 10:20:30 XYZ"), None);
        assert_eq!(parse_pub_date("Mon, 15 Jan 2024 10:20:30 +2"), None);
    }

    #[test]
    fn test_pub_date_garbage() {
        assert_eq!(parse_pub_date(""), None);
        assert_eq!(parse_pub_date("yesterday"), None);
    }
}
