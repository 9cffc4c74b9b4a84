use crate::models::VideoRecord;
use crate::utils::{
    parse_counter, parse_iso8601_datetime, parse_iso8601_duration_to_seconds, truncate_chars,
    watch_url,
};
use log::warn;
use serde_json::Value;

pub const DESCRIPTION_MAX_CHARS: usize = 200;
pub const MAX_TAGS: usize = 5;

/// Builds a `VideoRecord` from one item of a `videos` response.
///
/// Returns `None` only when the item has no id at all; every other missing
/// field falls back to an empty string or zero.
pub fn extract_video_record(item: &Value) -> Option<VideoRecord> {
    let video_id = match item["id"].as_str().filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => {
            warn!("Skipping video item without an id");
            return None;
        }
    };

    let snippet = &item["snippet"];
    let statistics = &item["statistics"];

    Some(VideoRecord {
        url: watch_url(&video_id),
        channel_id: snippet["channelId"].as_str().unwrap_or("").to_string(),
        channel_name: snippet["channelTitle"].as_str().unwrap_or("").to_string(),
        title: snippet["title"].as_str().unwrap_or("").to_string(),
        thumbnail_url: select_thumbnail(&snippet["thumbnails"]),
        duration_seconds: parse_iso8601_duration_to_seconds(
            item["contentDetails"]["duration"].as_str().unwrap_or(""),
        ),
        published_at: snippet["publishedAt"]
            .as_str()
            .and_then(parse_iso8601_datetime),
        view_count: parse_counter(&statistics["viewCount"]),
        like_count: parse_counter(&statistics["likeCount"]),
        comment_count: parse_counter(&statistics["commentCount"]),
        description: truncate_chars(
            snippet["description"].as_str().unwrap_or(""),
            DESCRIPTION_MAX_CHARS,
        ),
        tags: snippet["tags"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .take(MAX_TAGS)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        video_id,
    })
}

/// Medium resolution first, then default; empty when neither exists.
fn select_thumbnail(thumbnails: &Value) -> String {
    ["medium", "default"]
        .iter()
        .find_map(|variant| thumbnails[*variant]["url"].as_str())
        .unwrap_or("")
        .to_string()
}

/// Pulls the video ids out of a `playlistItems` page.
pub fn listing_video_ids(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| {
            item["snippet"]["resourceId"]["videoId"]
                .as_str()
                .or_else(|| item["contentDetails"]["videoId"].as_str())
        })
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}
