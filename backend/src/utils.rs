use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref ISO8601_DURATION: Regex =
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("duration pattern is valid");
}

/// Parse ISO8601 date string (e.g. `publishedAt`) into a UTC timestamp
pub fn parse_iso8601_datetime(date_str: &str) -> Option<DateTime<Utc>> {
    if date_str.is_empty() {
        return None;
    }
    date_str.parse::<DateTime<Utc>>().ok()
}

/// Parse ISO8601 duration string (PT1H2M3S) to total seconds.
///
/// Every component is optional; anything that does not look like a duration,
/// or whose total does not fit a `u64`, counts as zero.
pub fn parse_iso8601_duration_to_seconds(duration_str: &str) -> u64 {
    let Some(captures) = ISO8601_DURATION.captures(duration_str.trim()) else {
        return 0;
    };

    let component = |index: usize| -> u64 {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    [(1, 86_400u64), (2, 3600), (3, 60), (4, 1)]
        .iter()
        .try_fold(0u64, |total, &(index, unit)| {
            component(index)
                .checked_mul(unit)
                .and_then(|seconds| total.checked_add(seconds))
        })
        .unwrap_or(0)
}

/// Reads an API counter. The Data API encodes them as strings, but plain
/// numbers are accepted too; anything else is zero.
pub fn parse_counter(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Trims inputs, drops blank lines and repeated entries while keeping order.
pub fn normalize_inputs(inputs: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    inputs
        .iter()
        .map(|input| input.trim())
        .filter(|input| !input.is_empty())
        .filter(|input| seen.insert(input.to_string()))
        .map(str::to_string)
        .collect()
}
