use crate::error::HarvestError;
use crate::models::VideoRecord;
use crate::services::extractor::extract_video_record;
use crate::services::transport::Transport;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

/// Hard ceiling of ids per `videos` request imposed by the Data API.
pub const MAX_DETAIL_BATCH: usize = 50;

/// Channel a batch belongs to; overrides the snippet's channel fields.
#[derive(Debug, Clone, Copy)]
pub struct ChannelContext<'a> {
    pub channel_id: &'a str,
    pub channel_name: &'a str,
}

pub struct BatchResolver<'a, T: Transport> {
    transport: &'a T,
    max_batch: usize,
}

impl<'a, T: Transport> BatchResolver<'a, T> {
    pub fn new(transport: &'a T, max_batch: usize) -> Self {
        Self {
            transport,
            max_batch: max_batch.clamp(1, MAX_DETAIL_BATCH),
        }
    }

    /// Resolves `ids` into records, one detail request per chunk.
    ///
    /// Chunks are processed in order; ids the upstream drops (deleted or
    /// private videos) simply produce no record.
    pub async fn resolve(
        &self,
        ids: &[String],
        owner: Option<ChannelContext<'_>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<VideoRecord>, HarvestError> {
        let mut records = Vec::with_capacity(ids.len());

        for (index, chunk) in ids.chunks(self.max_batch).enumerate() {
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }

            debug!("Resolving batch {} ({} ids)", index + 1, chunk.len());
            let response = self
                .transport
                .fetch(
                    "videos",
                    &[
                        ("part", "snippet,statistics,contentDetails".to_string()),
                        ("id", chunk.join(",")),
                    ],
                )
                .await?;

            let before = records.len();
            if let Some(items) = response["items"].as_array() {
                records.extend(items.iter().filter_map(extract_video_record).map(|mut record| {
                    if let Some(owner) = owner {
                        record.channel_id = owner.channel_id.to_string();
                        record.channel_name = owner.channel_name.to_string();
                    }
                    record
                }));
            }

            let resolved = records.len() - before;
            if resolved < chunk.len() {
                info!(
                    "Batch {} resolved {} of {} ids",
                    index + 1,
                    resolved,
                    chunk.len()
                );
            }
        }

        Ok(records)
    }
}
