//! Clip URL normalization.
//!
//! Only YouTube and Twitch clips are accepted. They are rewritten to their
//! embeddable form before being stored on a tournament.

use crate::error::{AppError, AppResult};
use url::Url;

const YOUTUBE_EMBED: &str = "https://www.youtube-nocookie.com/embed/";
const TWITCH_EMBED: &str = "https://clips.twitch.tv/embed";

/// Rewrite a user supplied clip link into its embed URL.
///
/// `parent` is the domain Twitch requires for embedding.
pub fn normalize_clip_url(raw: &str, parent: &str) -> AppResult<String> {
    let unsupported = || AppError::UnsupportedMedia(raw.to_string());

    let url = Url::parse(raw.trim()).map_err(|_| unsupported())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(unsupported());
    }
    let host = url.host_str().ok_or_else(unsupported)?.to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let youtube_id = match host.as_str() {
        "youtu.be" => segments.first().copied(),
        "youtube.com" | "www.youtube.com" | "m.youtube.com" => match segments.as_slice() {
            ["watch"] => {
                return youtube_watch_id(&url)
                    .map(|id| format!("{}{}", YOUTUBE_EMBED, id))
                    .ok_or_else(unsupported)
            }
            ["shorts", id] | ["embed", id] => Some(*id),
            _ => None,
        },
        "youtube-nocookie.com" | "www.youtube-nocookie.com" => match segments.as_slice() {
            ["embed", id] => Some(*id),
            _ => None,
        },
        _ => None,
    };
    if let Some(id) = youtube_id.filter(|id| is_media_id(id)) {
        return Ok(format!("{}{}", YOUTUBE_EMBED, id));
    }

    let twitch_slug = match host.as_str() {
        "clips.twitch.tv" => match segments.as_slice() {
            [slug] if *slug != "embed" => Some(*slug),
            _ => None,
        },
        "twitch.tv" | "www.twitch.tv" | "m.twitch.tv" => match segments.as_slice() {
            [_channel, "clip", slug] => Some(*slug),
            _ => None,
        },
        _ => None,
    };
    if let Some(slug) = twitch_slug.filter(|slug| is_media_id(slug)) {
        let mut embed = Url::parse(TWITCH_EMBED).map_err(|_| unsupported())?;
        embed
            .query_pairs_mut()
            .append_pair("clip", slug)
            .append_pair("parent", parent);
        return Ok(embed.into());
    }

    Err(unsupported())
}

fn youtube_watch_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| is_media_id(id))
}

fn is_media_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
