use chrono::{DateTime, Utc};
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::Responder;
use rocket::{response, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;

use crate::error::{ErrorKind, HarvestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    ChannelId,
    ChannelHandle,
    VideoId,
}

/// A classified user input. `input` is kept verbatim so errors can be keyed
/// by what the caller actually sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub input: String,
    pub kind: TargetKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounters {
    pub subscriber_count: u64,
    pub view_count: u64,
    pub video_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedChannel {
    pub channel_id: String,
    pub display_name: String,
    pub uploads_playlist_id: String,
    pub counters: ChannelCounters,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
    pub duration_seconds: u64,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAnalytics {
    pub channel_id: String,
    pub channel_name: String,
    pub subscriber_count: u64,
    pub total_channel_views: u64,
    pub total_videos: u64,
    pub extracted_videos: usize,
    pub total_views: u64,
    pub total_likes: u64,
    pub total_comments: u64,
    pub avg_views_per_video: u64,
    pub avg_likes_per_video: u64,
    pub avg_comments_per_video: u64,
    pub engagement_rate: f64,
    pub channel_created: Option<DateTime<Utc>>,
    pub description: String,
    pub pagination_truncated: bool,
}

/// Cross-channel totals shown on the analytics dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub channel_count: usize,
    pub total_subscribers: u64,
    pub total_channel_views: u64,
    pub avg_engagement_rate: f64,
    pub video_count: usize,
    pub total_video_views: u64,
    pub total_likes: u64,
    pub avg_views_per_video: u64,
}

/// Lifecycle of one channel target inside an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStage {
    Classified,
    Resolving,
    FetchingSummary,
    Paginating,
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for TargetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Classified => "classified",
            Self::Resolving => "resolving",
            Self::FetchingSummary => "fetching summary",
            Self::Paginating => "paginating",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    /// Last stage the target reached before failing.
    pub stage: TargetStage,
}

impl ErrorDetail {
    pub fn new(error: &HarvestError, stage: TargetStage) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            stage,
        }
    }
}

/// Everything one channel target produced on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHarvest {
    pub records: Vec<VideoRecord>,
    pub analytics: ChannelAnalytics,
}

/// Published per target while a streaming extraction runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome {
    Completed {
        input: String,
        harvest: ChannelHarvest,
    },
    Failed {
        input: String,
        error: ErrorDetail,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub records: Vec<VideoRecord>,
    pub analytics: Vec<ChannelAnalytics>,
    pub errors: BTreeMap<String, ErrorDetail>,
    /// Inputs never started because the run was cancelled first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl IngestionResult {
    pub(crate) fn push_harvest(&mut self, harvest: ChannelHarvest) {
        self.records.extend(harvest.records);
        self.analytics.push(harvest.analytics);
    }

    pub(crate) fn push_error(&mut self, input: &str, detail: ErrorDetail) {
        self.errors.insert(input.to_string(), detail);
    }

    pub fn error_for(&self, input: &str) -> Option<&ErrorDetail> {
        self.errors.get(input)
    }
}

#[derive(Debug, Deserialize)]
pub struct HarvestRequest {
    pub targets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelExtractionResponse {
    pub result: IngestionResult,
    pub summary: DashboardSummary,
}

#[derive(Debug, Serialize)]
pub struct VideoAnalysisResponse {
    pub records: Vec<VideoRecord>,
    pub rejected: Vec<String>,
    pub summary: DashboardSummary,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: Status,
    pub error: String,
    pub message: String,
}

impl From<HarvestError> for ErrorResponse {
    fn from(err: HarvestError) -> Self {
        let status = match err.kind() {
            ErrorKind::InvalidInput | ErrorKind::Classification => Status::BadRequest,
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::Cancelled => Status::ServiceUnavailable,
            ErrorKind::Upstream => Status::BadGateway,
        };
        let error = serde_json::to_value(err.kind())
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "error".to_string());

        ErrorResponse {
            status,
            error,
            message: err.to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for ErrorResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let json = serde_json::to_string(&self).map_err(|_| Status::InternalServerError)?;
        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}
