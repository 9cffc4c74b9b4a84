use crate::error::HarvestError;
use crate::models::{ChannelCounters, ResolvedChannel};
use crate::services::transport::Transport;
use crate::utils::{parse_counter, parse_iso8601_datetime};
use log::{info, warn};
use serde_json::Value;

const SEARCH_CANDIDATES: u32 = 5;

/// Resolves a handle (or legacy custom name) to a channel id via search.
///
/// An exact `customUrl` match wins; otherwise the first search hit is used.
/// That fallback is a best-effort guess and is logged as such.
pub async fn resolve_handle<T: Transport>(
    transport: &T,
    handle: &str,
) -> Result<String, HarvestError> {
    let response = transport
        .fetch(
            "search",
            &[
                ("part", "snippet".to_string()),
                ("type", "channel".to_string()),
                ("q", handle.to_string()),
                ("maxResults", SEARCH_CANDIDATES.to_string()),
            ],
        )
        .await?;

    let candidates = response["items"].as_array().cloned().unwrap_or_default();
    let with_at = format!("@{handle}");

    let exact = candidates.iter().find(|item| {
        item["snippet"]["customUrl"]
            .as_str()
            .is_some_and(|custom| custom == with_at || custom == handle)
    });

    let chosen = match exact {
        Some(item) => item,
        None => {
            let first = candidates
                .first()
                .ok_or_else(|| HarvestError::NotFound(format!("Channel '@{handle}' not found")))?;
            warn!("No exact custom URL match for '@{handle}', using the first search result");
            first
        }
    };

    candidate_channel_id(chosen)
        .ok_or_else(|| HarvestError::NotFound(format!("Channel '@{handle}' not found")))
}

fn candidate_channel_id(item: &Value) -> Option<String> {
    item["snippet"]["channelId"]
        .as_str()
        .or_else(|| item["id"]["channelId"].as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Looks up a channel's title, counters and uploads playlist.
pub async fn fetch_channel<T: Transport>(
    transport: &T,
    channel_id: &str,
) -> Result<ResolvedChannel, HarvestError> {
    let response = transport
        .fetch(
            "channels",
            &[
                ("part", "snippet,statistics,contentDetails".to_string()),
                ("id", channel_id.to_string()),
            ],
        )
        .await?;

    let channel = response["items"]
        .as_array()
        .and_then(|items| items.first())
        .ok_or_else(|| HarvestError::NotFound("Channel not found or private".to_string()))?;

    let uploads_playlist_id = channel["contentDetails"]["relatedPlaylists"]["uploads"]
        .as_str()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| HarvestError::NotFound("No uploads playlist found".to_string()))?
        .to_string();

    let snippet = &channel["snippet"];
    let statistics = &channel["statistics"];

    let resolved = ResolvedChannel {
        channel_id: channel["id"].as_str().unwrap_or(channel_id).to_string(),
        display_name: snippet["title"].as_str().unwrap_or("").to_string(),
        uploads_playlist_id,
        counters: ChannelCounters {
            subscriber_count: parse_counter(&statistics["subscriberCount"]),
            view_count: parse_counter(&statistics["viewCount"]),
            video_count: parse_counter(&statistics["videoCount"]),
        },
        description: snippet["description"].as_str().unwrap_or("").to_string(),
        published_at: snippet["publishedAt"]
            .as_str()
            .and_then(parse_iso8601_datetime),
    };

    info!(
        "Resolved channel: {} ({}) with {} listed videos",
        resolved.display_name, resolved.channel_id, resolved.counters.video_count
    );

    Ok(resolved)
}
