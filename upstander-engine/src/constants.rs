//! Centralized constants for traversal and aggregation.
//!
//! These values define the fixed parts of the study contract (rating scale,
//! pass line, bucket naming). Anything a study is expected to tune lives in
//! the study configuration instead.

/// Lowest accepted survey rating.
pub const RATING_MIN: u8 = 1;
/// Highest accepted survey rating.
pub const RATING_MAX: u8 = 5;
/// Ratings at or above this value count as positive ("rated 4-5").
pub const RATING_PASS: u8 = 4;

/// Bucket receiving free text that matched no configured theme.
pub const UNCATEGORIZED_THEME: &str = "uncategorized";

/// Sample responses kept per keyword tally.
pub const TALLY_SAMPLES: usize = 5;

/// Seconds per minute, used when reporting journey durations.
pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Number of rating correlations kept in the aggregate view.
pub const TOP_CORRELATIONS: usize = 5;
