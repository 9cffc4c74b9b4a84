use crate::error::HarvestError;
use crate::services::extractor::listing_video_ids;
use crate::services::pacing::{pause, Pacing};
use crate::services::transport::Transport;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_PAGE_CEILING: u32 = 100;

/// Position inside a listing: the upstream token plus how many pages were fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub token: Option<String>,
    pub page_index: u32,
}

/// Walks the upload playlist of one channel, page by page.
///
/// Each call to [`next_page`](Self::next_page) performs at most one request.
/// A walker is single use: once it returns `Ok(None)` it stays exhausted.
pub struct PageWalker<'a, T: Transport> {
    transport: &'a T,
    playlist_id: String,
    page_size: u32,
    ceiling: u32,
    pacing: &'a dyn Pacing,
    cancel: &'a CancellationToken,
    cursor: PageCursor,
    exhausted: bool,
    ceiling_reached: bool,
}

impl<'a, T: Transport> PageWalker<'a, T> {
    pub fn new(
        transport: &'a T,
        playlist_id: &str,
        pacing: &'a dyn Pacing,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            transport,
            playlist_id: playlist_id.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            ceiling: DEFAULT_PAGE_CEILING,
            pacing,
            cancel,
            cursor: PageCursor::default(),
            exhausted: false,
            ceiling_reached: false,
        }
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    pub fn ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = ceiling.max(1);
        self
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    /// True once the walk stopped because of the ceiling rather than the
    /// listing running out.
    pub fn ceiling_reached(&self) -> bool {
        self.ceiling_reached
    }

    /// Fetches the next page and returns the video ids it lists.
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>, HarvestError> {
        if self.exhausted {
            return Ok(None);
        }

        if self.cursor.page_index > 0 {
            pause(self.pacing, self.cursor.page_index, self.cancel).await?;
        } else if self.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        let mut params = vec![
            ("part", "snippet".to_string()),
            ("playlistId", self.playlist_id.clone()),
            ("maxResults", self.page_size.to_string()),
        ];
        if let Some(token) = &self.cursor.token {
            params.push(("pageToken", token.clone()));
        }

        let response = self.transport.fetch("playlistItems", &params).await;
        self.cursor.page_index += 1;
        let response = response?;

        let ids = response["items"]
            .as_array()
            .map(|items| listing_video_ids(items))
            .unwrap_or_default();

        self.cursor.token = response["nextPageToken"]
            .as_str()
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        if self.cursor.token.is_none() {
            self.exhausted = true;
        } else if self.cursor.page_index >= self.ceiling {
            warn!(
                "Page ceiling of {} reached for playlist {}, stopping early",
                self.ceiling, self.playlist_id
            );
            self.exhausted = true;
            self.ceiling_reached = true;
        }

        info!(
            "Playlist {}: page {} listed {} videos",
            self.playlist_id,
            self.cursor.page_index,
            ids.len()
        );

        Ok(Some(ids))
    }
}
