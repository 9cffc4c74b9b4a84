use crate::models::{ChannelAnalytics, DashboardSummary, ResolvedChannel, VideoRecord};
use crate::utils::truncate_chars;

const CHANNEL_DESCRIPTION_MAX_CHARS: usize = 100;

/// Integer average rounded half up; zero when there is nothing to average.
pub fn rounded_average(total: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    let count = count as u64;
    (total + count / 2) / count
}

/// `(likes + comments) / views * 100`, two decimals, zero without views.
pub fn engagement_rate(likes: u64, comments: u64, views: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    let rate = (likes + comments) as f64 / views as f64 * 100.0;
    round_two_decimals(rate)
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn compute_channel_analytics(
    channel: &ResolvedChannel,
    videos: &[VideoRecord],
    pagination_truncated: bool,
) -> ChannelAnalytics {
    let total_views: u64 = videos.iter().map(|v| v.view_count).sum();
    let total_likes: u64 = videos.iter().map(|v| v.like_count).sum();
    let total_comments: u64 = videos.iter().map(|v| v.comment_count).sum();

    ChannelAnalytics {
        channel_id: channel.channel_id.clone(),
        channel_name: channel.display_name.clone(),
        subscriber_count: channel.counters.subscriber_count,
        total_channel_views: channel.counters.view_count,
        total_videos: channel.counters.video_count,
        extracted_videos: videos.len(),
        total_views,
        total_likes,
        total_comments,
        avg_views_per_video: rounded_average(total_views, videos.len()),
        avg_likes_per_video: rounded_average(total_likes, videos.len()),
        avg_comments_per_video: rounded_average(total_comments, videos.len()),
        engagement_rate: engagement_rate(total_likes, total_comments, total_views),
        channel_created: channel.published_at,
        description: truncate_chars(&channel.description, CHANNEL_DESCRIPTION_MAX_CHARS),
        pagination_truncated,
    }
}

/// Totals across every channel and record of one run.
pub fn summarize(analytics: &[ChannelAnalytics], records: &[VideoRecord]) -> DashboardSummary {
    let avg_engagement_rate = if analytics.is_empty() {
        0.0
    } else {
        let sum: f64 = analytics.iter().map(|a| a.engagement_rate).sum();
        round_two_decimals(sum / analytics.len() as f64)
    };
    let total_video_views: u64 = records.iter().map(|r| r.view_count).sum();

    DashboardSummary {
        channel_count: analytics.len(),
        total_subscribers: analytics.iter().map(|a| a.subscriber_count).sum(),
        total_channel_views: analytics.iter().map(|a| a.total_channel_views).sum(),
        avg_engagement_rate,
        video_count: records.len(),
        total_video_views,
        total_likes: records.iter().map(|r| r.like_count).sum(),
        avg_views_per_video: rounded_average(total_video_views, records.len()),
    }
}
