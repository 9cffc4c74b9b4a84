//! Channel and video ingestion runs.
//!
//! A run processes its targets one after another. Every channel target walks
//! through [`TargetStage`]s and ends up either contributing its records and
//! analytics or a single error entry; a failing target never stops its
//! siblings.

use crate::error::HarvestError;
use crate::models::{
    ChannelHarvest, ErrorDetail, IngestionResult, Target, TargetKind, TargetOutcome, TargetStage,
    VideoRecord,
};
use crate::services::analytics::compute_channel_analytics;
use crate::services::batch::{BatchResolver, ChannelContext, MAX_DETAIL_BATCH};
use crate::services::channel_resolver::{fetch_channel, resolve_handle};
use crate::services::classifier::{classify_channel_target, classify_video_target};
use crate::services::pacing::{pause, FixedPacing, JitterPacing, NoPacing, Pacing};
use crate::services::pagination::{PageWalker, DEFAULT_PAGE_CEILING, DEFAULT_PAGE_SIZE};
use crate::services::transport::Transport;
use crate::utils::normalize_inputs;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct HarvestSettings {
    pub page_size: u32,
    pub max_batch: usize,
    pub page_ceiling: u32,
    pub page_pacing: Arc<dyn Pacing>,
    pub target_pacing: Arc<dyn Pacing>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_batch: MAX_DETAIL_BATCH,
            page_ceiling: DEFAULT_PAGE_CEILING,
            page_pacing: Arc::new(JitterPacing {
                min: Duration::from_millis(1000),
                max: Duration::from_millis(3000),
            }),
            target_pacing: Arc::new(FixedPacing(Duration::from_secs(2))),
        }
    }
}

impl HarvestSettings {
    /// Default limits without any delays.
    pub fn unpaced() -> Self {
        Self {
            page_pacing: Arc::new(NoPacing),
            target_pacing: Arc::new(NoPacing),
            ..Self::default()
        }
    }
}

/// Result of [`Harvester::analyze_videos`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoAnalysis {
    pub records: Vec<VideoRecord>,
    /// Inputs that were not recognised as video URLs or ids.
    pub rejected: Vec<String>,
}

pub struct Harvester<T: Transport> {
    transport: T,
    settings: HarvestSettings,
}

impl<T: Transport> Harvester<T> {
    pub fn new(transport: T, settings: HarvestSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Harvests every channel target and returns the combined result.
    pub async fn extract_channels(
        &self,
        inputs: &[String],
        cancel: &CancellationToken,
    ) -> Result<IngestionResult, HarvestError> {
        self.run_channels(inputs, cancel, None).await
    }

    /// Like [`extract_channels`](Self::extract_channels), additionally
    /// publishing each target's outcome as soon as it is known.
    pub async fn extract_channels_streaming(
        &self,
        inputs: &[String],
        cancel: &CancellationToken,
        outcomes: UnboundedSender<TargetOutcome>,
    ) -> Result<IngestionResult, HarvestError> {
        self.run_channels(inputs, cancel, Some(&outcomes)).await
    }

    async fn run_channels(
        &self,
        inputs: &[String],
        cancel: &CancellationToken,
        outcomes: Option<&UnboundedSender<TargetOutcome>>,
    ) -> Result<IngestionResult, HarvestError> {
        let inputs = normalize_inputs(inputs);
        if inputs.is_empty() {
            return Err(HarvestError::EmptyInput);
        }

        info!("Starting channel extraction for {} targets", inputs.len());
        let mut result = IngestionResult::default();

        for (index, input) in inputs.iter().enumerate() {
            let paced = if index > 0 {
                pause(self.settings.target_pacing.as_ref(), index as u32, cancel).await
            } else {
                Ok(())
            };
            if paced.is_err() || cancel.is_cancelled() {
                warn!(
                    "Extraction cancelled, skipping {} remaining targets",
                    inputs.len() - index
                );
                result.cancelled = true;
                result.skipped = inputs[index..].to_vec();
                break;
            }

            info!("Processing channel {} of {}: {}", index + 1, inputs.len(), input);
            let mut stage = TargetStage::Classified;

            match self.ingest_channel(input, &mut stage, cancel).await {
                Ok(harvest) => {
                    info!(
                        "Completed {}: {} videos extracted",
                        input,
                        harvest.records.len()
                    );
                    if let Some(tx) = outcomes {
                        let _ = tx.send(TargetOutcome::Completed {
                            input: input.clone(),
                            harvest: harvest.clone(),
                        });
                    }
                    result.push_harvest(harvest);
                }
                Err(err) => {
                    error!("Error processing {input} while {stage}: {err}");
                    let detail = ErrorDetail::new(&err, stage);
                    debug!("{input}: {stage} -> {}", TargetStage::Failed);
                    if let Some(tx) = outcomes {
                        let _ = tx.send(TargetOutcome::Failed {
                            input: input.clone(),
                            error: detail.clone(),
                        });
                    }
                    result.push_error(input, detail);
                    if matches!(err, HarvestError::Cancelled) {
                        result.cancelled = true;
                    }
                }
            }
        }

        info!(
            "Channel extraction finished: {} videos from {} channels, {} failed",
            result.records.len(),
            result.analytics.len(),
            result.errors.len()
        );
        Ok(result)
    }

    /// Runs one channel target to completion. `stage` tracks progress so the
    /// caller can report where a failure happened.
    async fn ingest_channel(
        &self,
        input: &str,
        stage: &mut TargetStage,
        cancel: &CancellationToken,
    ) -> Result<ChannelHarvest, HarvestError> {
        let target = classify_channel_target(input)?;

        advance(stage, TargetStage::Resolving, input);
        let channel_id = self.resolve_channel_id(&target).await?;

        advance(stage, TargetStage::FetchingSummary, input);
        let channel = fetch_channel(&self.transport, &channel_id).await?;

        advance(stage, TargetStage::Paginating, input);
        let owner = ChannelContext {
            channel_id: &channel.channel_id,
            channel_name: &channel.display_name,
        };
        let resolver = BatchResolver::new(&self.transport, self.settings.max_batch);
        let mut walker = PageWalker::new(
            &self.transport,
            &channel.uploads_playlist_id,
            self.settings.page_pacing.as_ref(),
            cancel,
        )
        .page_size(self.settings.page_size)
        .ceiling(self.settings.page_ceiling);

        let mut records = Vec::new();
        while let Some(ids) = walker.next_page().await? {
            records.extend(resolver.resolve(&ids, Some(owner), cancel).await?);
            debug!(
                "{}: {} videos so far after page {}",
                channel.display_name,
                records.len(),
                walker.cursor().page_index
            );
        }

        advance(stage, TargetStage::Aggregating, input);
        let analytics = compute_channel_analytics(&channel, &records, walker.ceiling_reached());

        advance(stage, TargetStage::Done, input);
        Ok(ChannelHarvest { records, analytics })
    }

    async fn resolve_channel_id(&self, target: &Target) -> Result<String, HarvestError> {
        match target.kind {
            TargetKind::ChannelId => Ok(target.value.clone()),
            TargetKind::ChannelHandle => {
                info!("Resolving @{}", target.value);
                resolve_handle(&self.transport, &target.value).await
            }
            TargetKind::VideoId => Err(HarvestError::Classification(target.input.clone())),
        }
    }

    /// Resolves individual videos by URL or id.
    ///
    /// Unrecognised inputs are reported in `rejected`; the call only fails
    /// outright when nothing usable was supplied or the upstream fails.
    pub async fn analyze_videos(
        &self,
        inputs: &[String],
        cancel: &CancellationToken,
    ) -> Result<VideoAnalysis, HarvestError> {
        let inputs = normalize_inputs(inputs);
        if inputs.is_empty() {
            return Err(HarvestError::EmptyInput);
        }

        let mut ids = Vec::new();
        let mut rejected = Vec::new();
        for input in inputs {
            match classify_video_target(&input) {
                Ok(target) => ids.push(target.value),
                Err(_) => {
                    warn!("Ignoring unrecognised video input: {input}");
                    rejected.push(input);
                }
            }
        }
        if ids.is_empty() {
            return Err(HarvestError::NoValidTargets);
        }

        info!("Analyzing {} videos", ids.len());
        let records = BatchResolver::new(&self.transport, self.settings.max_batch)
            .resolve(&ids, None, cancel)
            .await?;
        info!("Analyzed {} videos", records.len());

        Ok(VideoAnalysis { records, rejected })
    }
}

fn advance(stage: &mut TargetStage, next: TargetStage, input: &str) {
    debug!("{input}: {stage} -> {next}");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, UpstreamError};
    use crate::services::testing::{
        channel_response, ids, playlist_page, videos_response, ScriptedTransport,
    };
    use serde_json::json;
    use std::collections::HashMap;

    const ALPHA: &str = "UCalphaalphaalphaalpha00";
    const BETA: &str = "UCbetabetabetabetabeta00";

    /// Two channels: alpha lists 50 + 50 + 10 videos, beta lists 3.
    fn two_channel_upstream(
        endpoint: &str,
        params: &HashMap<String, String>,
    ) -> Result<serde_json::Value, UpstreamError> {
        match endpoint {
            "channels" => match params["id"].as_str() {
                ALPHA => Ok(channel_response(ALPHA, "Alpha")),
                BETA => Ok(channel_response(BETA, "Beta")),
                _ => Ok(json!({"items": []})),
            },
            "search" => Ok(json!({"items": [
                {"snippet": {"channelId": BETA, "customUrl": "@beta"}}
            ]})),
            "playlistItems" => {
                let playlist = params["playlistId"].as_str();
                let token = params.get("pageToken").map(String::as_str);
                Ok(match (playlist, token) {
                    (p, None) if p.starts_with("UUalpha") => {
                        playlist_page(&ids("a1-", 50), Some("p2"))
                    }
                    (p, Some("p2")) if p.starts_with("UUalpha") => {
                        playlist_page(&ids("a2-", 50), Some("p3"))
                    }
                    (p, Some("p3")) if p.starts_with("UUalpha") => {
                        playlist_page(&ids("a3-", 10), None)
                    }
                    _ => playlist_page(&ids("b-", 3), None),
                })
            }
            "videos" => Ok(videos_response(params)),
            other => panic!("unexpected endpoint {other}"),
        }
    }

    fn harvester() -> Harvester<ScriptedTransport> {
        Harvester::new(
            ScriptedTransport::new(two_channel_upstream),
            HarvestSettings::unpaced(),
        )
    }

    fn inputs(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn three_page_channel_yields_all_records() {
        let harvester = harvester();
        let result = harvester
            .extract_channels(&inputs(&[ALPHA]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.records.len(), 110);
        assert!(result.errors.is_empty());
        assert_eq!(result.analytics.len(), 1);
        assert_eq!(result.analytics[0].extracted_videos, 110);
        assert_eq!(result.analytics[0].total_views, 110 * 100);
        assert!(result.records.iter().all(|r| r.channel_name == "Alpha"));
        // Page traversal order is preserved.
        assert_eq!(result.records[0].video_id, "a1-000");
        assert_eq!(result.records[109].video_id, "a3-009");
        assert_eq!(harvester.transport().calls_to("playlistItems").len(), 3);
        assert_eq!(harvester.transport().calls_to("videos").len(), 3);
    }

    #[tokio::test]
    async fn failing_target_does_not_affect_the_next() {
        let result = harvester()
            .extract_channels(
                &inputs(&["definitely not a channel", "@beta"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.errors.len(), 1);
        let detail = result.error_for("definitely not a channel").unwrap();
        assert_eq!(detail.kind, ErrorKind::Classification);
        assert_eq!(detail.stage, TargetStage::Classified);

        assert_eq!(result.records.len(), 3);
        assert!(result.records.iter().all(|r| r.channel_id == BETA));
        assert_eq!(result.analytics.len(), 1);
        assert_eq!(result.analytics[0].channel_name, "Beta");
    }

    #[tokio::test]
    async fn unknown_channel_is_recorded_with_its_stage() {
        let result = harvester()
            .extract_channels(
                &inputs(&["UCmissingmissingmissing0", ALPHA]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let detail = result.error_for("UCmissingmissingmissing0").unwrap();
        assert_eq!(detail.kind, ErrorKind::NotFound);
        assert_eq!(detail.stage, TargetStage::FetchingSummary);
        assert_eq!(detail.message, "Channel not found or private");
        assert_eq!(result.records.len(), 110);
    }

    #[tokio::test]
    async fn failure_mid_walk_contributes_no_partial_records() {
        let transport = ScriptedTransport::new(|endpoint, params| match endpoint {
            "channels" => Ok(channel_response(ALPHA, "Alpha")),
            "playlistItems" => match params.get("pageToken") {
                None => Ok(playlist_page(&ids("a", 50), Some("p2"))),
                Some(_) => Err(UpstreamError::RateLimited { status: 429 }),
            },
            _ => Ok(videos_response(params)),
        });
        let result = Harvester::new(transport, HarvestSettings::unpaced())
            .extract_channels(&inputs(&[ALPHA]), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.records.is_empty());
        assert!(result.analytics.is_empty());
        let detail = result.error_for(ALPHA).unwrap();
        assert_eq!(detail.kind, ErrorKind::Upstream);
        assert_eq!(detail.stage, TargetStage::Paginating);
    }

    #[tokio::test]
    async fn ceiling_hit_is_flagged_but_successful() {
        let transport = ScriptedTransport::new(|endpoint, params| match endpoint {
            "channels" => Ok(channel_response(ALPHA, "Alpha")),
            "playlistItems" => Ok(playlist_page(&ids("v", 1), Some("forever"))),
            _ => Ok(videos_response(params)),
        });
        let harvester = Harvester::new(transport, HarvestSettings::unpaced());
        let result = harvester
            .extract_channels(&inputs(&[ALPHA]), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.errors.is_empty());
        assert_eq!(result.records.len(), 100);
        assert!(result.analytics[0].pagination_truncated);
        assert_eq!(harvester.transport().calls_to("playlistItems").len(), 100);
    }

    #[tokio::test]
    async fn duplicate_ids_across_channels_are_kept() {
        let transport = ScriptedTransport::new(|endpoint, params| match endpoint {
            "channels" => Ok(channel_response(&params["id"], "Same uploads")),
            "playlistItems" => Ok(playlist_page(&ids("shared", 2), None)),
            _ => Ok(videos_response(params)),
        });
        let result = Harvester::new(transport, HarvestSettings::unpaced())
            .extract_channels(&inputs(&[ALPHA, BETA]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.records.len(), 4);
        assert_eq!(result.analytics.len(), 2);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_request() {
        let harvester = harvester();
        let err = harvester
            .extract_channels(&inputs(&["", "   "]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::EmptyInput));
        assert!(harvester.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_skips_remaining_targets() {
        let harvester = harvester();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = harvester
            .extract_channels(&inputs(&[ALPHA, BETA]), &cancel)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.skipped, inputs(&[ALPHA, BETA]));
        assert!(result.records.is_empty());
        assert!(harvester.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn cancellation_mid_walk_drops_partial_records_and_skips_the_rest() {
        let cancel = CancellationToken::new();
        let fired = cancel.clone();
        let transport = ScriptedTransport::new(move |endpoint, params| {
            if endpoint == "playlistItems" {
                fired.cancel();
            }
            two_channel_upstream(endpoint, params)
        });
        let harvester = Harvester::new(transport, HarvestSettings::unpaced());

        let result = harvester
            .extract_channels(&inputs(&[ALPHA, BETA]), &cancel)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert!(result.records.is_empty());
        assert!(result.analytics.is_empty());
        let detail = result.error_for(ALPHA).unwrap();
        assert_eq!(detail.kind, ErrorKind::Cancelled);
        assert_eq!(detail.stage, TargetStage::Paginating);
        assert_eq!(result.skipped, inputs(&[BETA]));
        assert!(harvester.transport().calls_to("videos").is_empty());
        assert_eq!(harvester.transport().calls_to("playlistItems").len(), 1);
    }

    #[tokio::test]
    async fn cancellation_between_targets_keeps_finished_work() {
        let cancel = CancellationToken::new();
        let fired = cancel.clone();
        let settings = HarvestSettings {
            target_pacing: Arc::new(move |_attempt: u32| {
                fired.cancel();
                Duration::ZERO
            }),
            ..HarvestSettings::unpaced()
        };
        let harvester = Harvester::new(ScriptedTransport::new(two_channel_upstream), settings);

        let result = harvester
            .extract_channels(&inputs(&[ALPHA, "@beta"]), &cancel)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert!(result.errors.is_empty());
        assert_eq!(result.records.len(), 110);
        assert_eq!(result.analytics.len(), 1);
        assert_eq!(result.analytics[0].channel_id, ALPHA);
        assert_eq!(result.skipped, inputs(&["@beta"]));
        assert!(harvester.transport().calls_to("search").is_empty());
    }

    #[tokio::test]
    async fn streaming_publishes_each_outcome() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let result = harvester()
            .extract_channels_streaming(
                &inputs(&["bogus input", "@beta"]),
                &CancellationToken::new(),
                tx,
            )
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, TargetOutcome::Failed { ref input, .. } if input == "bogus input"));
        match second {
            TargetOutcome::Completed { input, harvest } => {
                assert_eq!(input, "@beta");
                assert_eq!(harvest.records.len(), 3);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(rx.recv().await.is_none());
        assert_eq!(result.records.len(), 3);
    }

    #[tokio::test]
    async fn analyze_videos_batches_and_reports_rejects() {
        let harvester = harvester();
        let mut targets: Vec<String> = (0..60).map(|i| format!("vid{i:08}")).collect();
        targets.push("https://youtu.be/dQw4w9WgXcQ".to_string());
        targets.push("not a video".to_string());

        let analysis = harvester
            .analyze_videos(&targets, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(analysis.records.len(), 61);
        assert_eq!(analysis.rejected, vec!["not a video".to_string()]);
        assert_eq!(harvester.transport().calls_to("videos").len(), 2);
        // Channel fields come from the video snippet in this mode.
        assert_eq!(analysis.records[0].channel_name, "Upstream Name");
    }

    #[tokio::test]
    async fn analyze_videos_without_valid_ids_fails() {
        let err = harvester()
            .analyze_videos(&inputs(&["nope", "also nope"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::NoValidTargets));
    }
}
