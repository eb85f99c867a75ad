//! Size and date buckets.
//!
//! Both functions are pure. Dates are bucketed in UTC so the same file lands
//! in the same folder on every machine.

use chrono::{DateTime, Utc};

const MIB: u64 = 1_048_576;

/// Upper bounds (exclusive) and the label of everything below them.
const SIZE_BUCKETS: &[(u64, &str)] = &[
    (MIB, "<1MB"),
    (10 * MIB, "1MB-10MB"),
    (100 * MIB, "10MB-100MB"),
];

const LARGEST_BUCKET: &str = ">100MB";

/// Returns the size bucket for a byte count.
///
/// A size equal to a threshold belongs to the next bucket up.
///
/// ```
/// use tidytree::bucket::size_bucket;
///
/// assert_eq!(size_bucket(1_048_575), "<1MB");
/// assert_eq!(size_bucket(1_048_576), "1MB-10MB");
/// assert_eq!(size_bucket(104_857_600), ">100MB");
/// ```
pub fn size_bucket(size_bytes: u64) -> &'static str {
    SIZE_BUCKETS
        .iter()
        .find(|(threshold, _)| size_bytes < *threshold)
        .map(|(_, label)| *label)
        .unwrap_or(LARGEST_BUCKET)
}

/// Returns the `YYYY-MM` bucket (UTC) for a modification time.
pub fn date_bucket(modified_at: DateTime<Utc>) -> String {
    modified_at.format("%Y-%m").to_string()
}
