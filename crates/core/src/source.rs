use std::{
    future::Future,
    path::{Path, PathBuf},
};

use reqwest::Client;
use serde::Deserialize;
use tokio::{fs, process::Command};

use crate::{
    error::{DigestError, Result},
    types::VideoMetadata,
    youtube::{extract_video_id, oembed_url, watch_url},
};

/// Where a run gets its video metadata and captions from.
pub trait VideoSource: Send + Sync {
    fn fetch_metadata(&self, url: &str) -> impl Future<Output = Result<VideoMetadata>> + Send;

    /// `Ok(None)` means no usable captions; the cause is not distinguished.
    fn fetch_captions(&self, url: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}

pub fn get_root_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tubedigest")
}

/// oEmbed for metadata, yt-dlp subtitle tracks for captions.
#[derive(Clone)]
pub struct YoutubeSource {
    client: Client,
    work_root: PathBuf,
    sub_langs: String,
    yt_dlp: PathBuf,
}

impl Default for YoutubeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl YoutubeSource {
    pub const DEFAULT_SUB_LANGS: &'static str = "en";

    pub fn new() -> Self {
        Self {
            client: Client::new(),
            work_root: get_root_work_dir(),
            sub_langs: Self::DEFAULT_SUB_LANGS.to_string(),
            yt_dlp: PathBuf::from("yt-dlp"),
        }
    }

    pub fn with_sub_langs(mut self, sub_langs: impl Into<String>) -> Self {
        self.sub_langs = sub_langs.into();
        self
    }

    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    /// yt-dlp executable, looked up on `PATH` unless absolute.
    pub fn with_yt_dlp(mut self, yt_dlp: impl Into<PathBuf>) -> Self {
        self.yt_dlp = yt_dlp.into();
        self
    }

    async fn download_subtitles(&self, video_id: &str, work_dir: &Path) -> Result<Option<PathBuf>> {
        let output_template = work_dir.join("captions.%(ext)s");
        let output = Command::new(&self.yt_dlp)
            .arg(watch_url(video_id))
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .arg("--sub-langs")
            .arg(&self.sub_langs)
            .arg("--sub-format")
            .arg("json3")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&output_template)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DigestError::CaptionTool {
                reason: format!("could not run yt-dlp: {e}"),
            })?;

        if !output.status.success() {
            tracing::warn!(
                video_id,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "yt-dlp could not fetch subtitles"
            );
            return Ok(None);
        }

        Ok(find_caption_file(work_dir))
    }
}

impl VideoSource for YoutubeSource {
    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        let endpoint = oembed_url(&watch_url(&extract_video_id(url)?))?;
        let resp = self
            .client
            .get(endpoint)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            return Err(DigestError::Metadata {
                url: url.to_string(),
                reason: format!("oEmbed returned {}", resp.status()),
            });
        }

        let map = resp
            .json::<serde_json::Map<String, serde_json::Value>>()
            .await?;
        Ok(VideoMetadata::from(map))
    }

    async fn fetch_captions(&self, url: &str) -> Result<Option<String>> {
        let video_id = extract_video_id(url)?;
        fs::create_dir_all(&self.work_root).await?;
        // Removed on drop, including when the run is cancelled.
        let work_dir = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(&self.work_root)?;

        let result = match self.download_subtitles(&video_id, work_dir.path()).await {
            Ok(Some(path)) => load_captions(&path).await,
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        let path = work_dir.path().to_path_buf();
        if let Err(e) = work_dir.close() {
            tracing::warn!(error = %e, path = %path.display(), "Failed to clean up work dir");
        }

        result
    }
}

/// Find the downloaded subtitle track; the language code is part of the name.
pub fn find_caption_file(work_dir: &Path) -> Option<PathBuf> {
    let Ok(entries) = std::fs::read_dir(work_dir) else {
        return None;
    };

    let mut tracks: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json3"))
        .collect();
    tracks.sort();
    tracks.into_iter().next()
}

#[derive(Debug, Deserialize)]
struct Json3Captions {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(default)]
    segs: Vec<Json3Segment>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

/// Flatten a json3 subtitle document into one line of text.
pub fn parse_json3(content: &str) -> Result<Option<String>> {
    let captions: Json3Captions = serde_json::from_str(content)?;

    let text = captions
        .events
        .iter()
        .flat_map(|event| event.segs.iter())
        .map(|seg| seg.utf8.as_str())
        .collect::<String>();

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok((!text.is_empty()).then_some(text))
}

/// Load and flatten a json3 subtitle file.
pub async fn load_captions(path: &Path) -> Result<Option<String>> {
    let content = fs::read_to_string(path).await?;
    parse_json3(&content)
}
