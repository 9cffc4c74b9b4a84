//! In-memory transport double and payload builders shared by service tests.

use crate::error::UpstreamError;
use crate::services::transport::{Params, Transport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Call {
    pub endpoint: String,
    pub params: HashMap<String, String>,
}

type Handler =
    Box<dyn Fn(&str, &HashMap<String, String>) -> Result<Value, UpstreamError> + Send + Sync>;

pub struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &HashMap<String, String>) -> Result<Value, UpstreamError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.endpoint == endpoint)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError> {
        let params: HashMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.calls.lock().unwrap().push(Call {
            endpoint: endpoint.to_string(),
            params: params.clone(),
        });
        (self.handler)(endpoint, &params)
    }
}

pub fn video_item(id: &str, views: u64, likes: u64, comments: u64) -> Value {
    json!({
        "id": id,
        "snippet": {
            "title": format!("Video {id}"),
            "channelId": "UCupstreamchannel000000",
            "channelTitle": "Upstream Name",
            "publishedAt": "2024-01-01T00:00:00Z",
            "thumbnails": {"medium": {"url": format!("https://img/{id}.jpg")}}
        },
        "statistics": {
            "viewCount": views.to_string(),
            "likeCount": likes.to_string(),
            "commentCount": comments.to_string()
        },
        "contentDetails": {"duration": "PT1M"}
    })
}

/// Answers a `videos` call with one item per requested id.
pub fn videos_response(params: &HashMap<String, String>) -> Value {
    let items: Vec<Value> = params
        .get("id")
        .map(|ids| {
            ids.split(',')
                .filter(|id| !id.is_empty())
                .map(|id| video_item(id, 100, 10, 5))
                .collect()
        })
        .unwrap_or_default();
    json!({ "items": items })
}

pub fn playlist_page(ids: &[String], next_page_token: Option<&str>) -> Value {
    let items: Vec<Value> = ids
        .iter()
        .map(|id| json!({"snippet": {"resourceId": {"kind": "youtube#video", "videoId": id}}}))
        .collect();
    match next_page_token {
        Some(token) => json!({"items": items, "nextPageToken": token}),
        None => json!({ "items": items }),
    }
}

pub fn channel_response(channel_id: &str, title: &str) -> Value {
    json!({
        "items": [{
            "id": channel_id,
            "snippet": {
                "title": title,
                "description": "About this channel",
                "publishedAt": "2015-06-01T12:00:00Z"
            },
            "statistics": {"subscriberCount": "1200", "viewCount": "500000", "videoCount": "110"},
            "contentDetails": {"relatedPlaylists": {"uploads": format!("UU{}", &channel_id[2..])}}
        }]
    })
}

pub fn ids(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i:03}")).collect()
}
