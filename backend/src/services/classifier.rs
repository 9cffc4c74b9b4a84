use crate::error::HarvestError;
use crate::models::{Target, TargetKind};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Order matters: URL forms are substring matches, bare ids are anchored so a
    // handle can never be mistaken for an id.
    static ref CHANNEL_PATTERNS: Vec<(Regex, TargetKind)> = vec![
        (pattern(r"youtube\.com/channel/([a-zA-Z0-9_-]+)"), TargetKind::ChannelId),
        (pattern(r"youtube\.com/@([a-zA-Z0-9_.-]+)"), TargetKind::ChannelHandle),
        (pattern(r"youtube\.com/c/([a-zA-Z0-9_.-]+)"), TargetKind::ChannelHandle),
        (pattern(r"youtube\.com/user/([a-zA-Z0-9_.-]+)"), TargetKind::ChannelHandle),
        (pattern(r"^([a-zA-Z0-9_-]{24})$"), TargetKind::ChannelId),
        (pattern(r"^(UC[a-zA-Z0-9_-]{22})$"), TargetKind::ChannelId),
        (pattern(r"^@([a-zA-Z0-9_.-]+)$"), TargetKind::ChannelHandle),
    ];
    static ref VIDEO_PATTERNS: Vec<Regex> = vec![
        pattern(r"youtube\.com/watch\?v=([a-zA-Z0-9_-]+)"),
        pattern(r"youtu\.be/([a-zA-Z0-9_-]+)"),
        pattern(r"youtube\.com/embed/([a-zA-Z0-9_-]+)"),
        pattern(r"youtube\.com/v/([a-zA-Z0-9_-]+)"),
        pattern(r"^([a-zA-Z0-9_-]{11})$"),
    ];
}

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("classifier pattern is valid")
}

fn first_capture(regex: &Regex, input: &str) -> Option<String> {
    regex
        .captures(input)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Classifies a channel URL, handle or bare channel id.
pub fn classify_channel_target(input: &str) -> Result<Target, HarvestError> {
    let trimmed = input.trim();

    CHANNEL_PATTERNS
        .iter()
        .find_map(|(regex, kind)| {
            first_capture(regex, trimmed).map(|value| Target {
                input: input.to_string(),
                kind: *kind,
                value,
            })
        })
        .ok_or_else(|| HarvestError::Classification(input.to_string()))
}

/// Classifies a watch, youtu.be or embed URL, or a bare 11-character video id.
pub fn classify_video_target(input: &str) -> Result<Target, HarvestError> {
    let trimmed = input.trim();

    VIDEO_PATTERNS
        .iter()
        .find_map(|regex| first_capture(regex, trimmed))
        .map(|value| Target {
            input: input.to_string(),
            kind: TargetKind::VideoId,
            value,
        })
        .ok_or_else(|| HarvestError::Classification(input.to_string()))
}
