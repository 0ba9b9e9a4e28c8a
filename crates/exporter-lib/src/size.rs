//! Human-readable byte size parsing
//!
//! The runtime reports network counters as strings such as `1.2kB` or
//! `3.4MB`. Units are binary multiples and the suffixes are case-sensitive.

/// Recognised suffixes, longest first so `kB` wins over `B`.
const UNITS: &[(&str, f64)] = &[
    ("kB", 1024.0),
    ("MB", 1024.0 * 1024.0),
    ("GB", 1024.0 * 1024.0 * 1024.0),
    ("TB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("B", 1.0),
];

/// Parse a size string into bytes, returning `None` when the numeric part is invalid.
pub fn try_parse_size(text: &str) -> Option<f64> {
    let text = text.trim();

    let (number, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| {
            text.strip_suffix(suffix)
                .map(|number| (number, *multiplier))
        })
        .unwrap_or((text, 1.0));

    number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value * multiplier)
}

/// Parse a size string into bytes.
///
/// Input that cannot be parsed degrades to `0.0` so a single bad counter
/// never aborts a poll cycle.
pub fn parse_size(text: &str) -> f64 {
    try_parse_size(text).unwrap_or(0.0)
}
