use crate::models::{ChannelExtractionResponse, ErrorResponse, HarvestRequest};
use crate::services::analytics::summarize;
use crate::AppState;
use log::info;
use rocket::serde::json::Json;
use rocket::{post, State};

#[post("/extract", data = "<request>")]
pub async fn extract_channels(
    request: Json<HarvestRequest>,
    state: &State<AppState>,
) -> Result<Json<ChannelExtractionResponse>, ErrorResponse> {
    let targets = request.into_inner().targets;
    info!("Received extraction request for {} targets", targets.len());

    let cancel = state.shutdown.child_token();
    let result = state.harvester.extract_channels(&targets, &cancel).await?;
    let summary = summarize(&result.analytics, &result.records);

    Ok(Json(ChannelExtractionResponse { result, summary }))
}
