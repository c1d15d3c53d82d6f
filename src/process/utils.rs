use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("NON_ALNUM regex should compile"));

/// Canonical snake_case form of a column header.
///
/// Lowercases, then collapses every maximal run of characters outside
/// `[a-z0-9]` to a single `_`. Surrounding whitespace is trimmed: a run at
/// either edge that reaches the boundary with whitespace disappears along
/// with it. Edge runs made only of symbols still leave their `_` behind, so
/// `"Score (%)"` becomes `"score_"`.
pub fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last = 0;

    for m in NON_ALNUM.find_iter(&lowered) {
        out.push_str(&lowered[last..m.start()]);
        let run = m.as_str();
        let trimmed_leading = m.start() == 0 && run.starts_with(char::is_whitespace);
        let trimmed_trailing = m.end() == lowered.len() && run.ends_with(char::is_whitespace);
        if !(trimmed_leading || trimmed_trailing) {
            out.push('_');
        }
        last = m.end();
    }
    out.push_str(&lowered[last..]);
    out
}

/// Parse the timestamp shapes seen in catalog records and metadata files.
///
/// Accepts RFC 3339, naive ISO-8601 date-times (taken as UTC) and bare
/// `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
