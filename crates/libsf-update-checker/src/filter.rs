// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::types::{CurrentRelease, ReleaseList, ReleaseRecord};

/// returns true if `record` is an update for `current`.
///
/// the record must be built for the same platform, carry a version not lower
/// than the current one, and be published strictly later. records without a
/// version or date never qualify.
pub fn is_applicable(current: &CurrentRelease, record: &ReleaseRecord) -> bool {
    let (Some(version), Some(date)) = (&record.version, record.date) else {
        return false;
    };

    record.platform == current.platform && *version >= current.version && date > current.date
}

/// applicable updates in input order.
pub fn filtered(current: &CurrentRelease, records: &[ReleaseRecord]) -> ReleaseList {
    records
        .iter()
        .filter(|record| is_applicable(current, record))
        .cloned()
        .collect()
}

/// number of applicable updates, same predicate as [`filtered`].
pub fn filtered_count(current: &CurrentRelease, records: &[ReleaseRecord]) -> usize {
    records
        .iter()
        .filter(|record| is_applicable(current, record))
        .count()
}
