use crate::models::{ErrorResponse, HarvestRequest, VideoAnalysisResponse};
use crate::services::analytics::summarize;
use crate::AppState;
use rocket::serde::json::Json;
use rocket::{post, State};

#[post("/analyze", data = "<request>")]
pub async fn analyze_videos(
    request: Json<HarvestRequest>,
    state: &State<AppState>,
) -> Result<Json<VideoAnalysisResponse>, ErrorResponse> {
    let cancel = state.shutdown.child_token();
    let analysis = state
        .harvester
        .analyze_videos(&request.targets, &cancel)
        .await?;
    let summary = summarize(&[], &analysis.records);

    Ok(Json(VideoAnalysisResponse {
        records: analysis.records,
        rejected: analysis.rejected,
        summary,
    }))
}
