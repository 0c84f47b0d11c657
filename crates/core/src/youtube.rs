use reqwest::Url;

use crate::error::{DigestError, Result};

const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "youtu.be" || host == "youtube.com" || host.ends_with(".youtube.com")
}

/// Extract the 11-character video id from a watch, short, embed, shorts or live URL.
pub fn extract_video_id(url: &str) -> Result<String> {
    let invalid = || DigestError::invalid_input(format!("{url} is not a YouTube video URL"));

    let input = url.trim();
    if input.is_empty() {
        return Err(DigestError::invalid_input("video URL is empty"));
    }

    let with_scheme = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };

    let parsed = Url::parse(&with_scheme).map_err(|_| invalid())?;
    let host = parsed.host_str().ok_or_else(invalid)?;
    if !is_youtube_host(host) {
        return Err(invalid());
    }

    if host.eq_ignore_ascii_case("youtu.be") {
        return parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|id| is_video_id(id))
            .map(str::to_string)
            .ok_or_else(invalid);
    }

    if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key == "v") {
        if is_video_id(&id) {
            return Ok(id.into_owned());
        }
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [kind, id, ..] if matches!(*kind, "embed" | "shorts" | "live" | "v") && is_video_id(id) => {
            Ok(id.to_string())
        }
        _ => Err(invalid()),
    }
}

/// oEmbed lookup URL for a video page.
pub fn oembed_url(video_url: &str) -> Result<Url> {
    Url::parse_with_params(OEMBED_ENDPOINT, &[("url", video_url), ("format", "json")])
        .map_err(|e| DigestError::invalid_input(format!("cannot build oEmbed URL: {e}")))
}

/// Canonical watch URL, used when handing the video to yt-dlp.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}
