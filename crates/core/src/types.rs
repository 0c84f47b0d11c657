use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{DigestError, Result},
    youtube::extract_video_id,
};

/// Opaque key/value record describing a video.
///
/// Keys are kept sorted so the textual form interpolated into prompts does not
/// depend on the order the source produced them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoMetadata(BTreeMap<String, serde_json::Value>);

impl VideoMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

}

impl From<serde_json::Map<String, serde_json::Value>> for VideoMetadata {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl fmt::Display for VideoMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

/// A video as the prompts see it: canonical watch URL plus fetched metadata.
#[derive(Debug, Clone, Serialize)]
pub struct VideoReference {
    pub url: String,
    pub metadata: VideoMetadata,
}

/// A contiguous window of caption words, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    pub index: usize,
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLength {
    #[default]
    Long,
    Short,
}

impl ReportLength {
    pub fn name(&self) -> &'static str {
        match self {
            ReportLength::Long => "Long",
            ReportLength::Short => "Short",
        }
    }
}

/// What to do when a model stream ends without a normal completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationPolicy {
    /// Keep the partial text, flag it, and publish a truncation event.
    #[default]
    AcceptPartial,
    /// Abort the run.
    Fail,
}

/// Word-count threshold per chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkLimit(usize);

impl ChunkLimit {
    pub const MIN: usize = 1000;
    pub const MAX: usize = 10_000;
    pub const DEFAULT: usize = 2000;

    pub fn new(words: usize) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&words) {
            return Err(DigestError::invalid_input(format!(
                "chunk limit {words} is outside [{}, {}]",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(words))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for ChunkLimit {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthesisPath {
    RawCaptions,
    ChunkSummaries { count: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub url: String,
    pub model: String,
    pub length: ReportLength,
    pub path: SynthesisPath,
    pub markdown: String,
    pub truncated: bool,
    pub generated_at: DateTime<Local>,
}

/// Parameters of one end-to-end run. Changing any of them means a new request.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRequest {
    pub run_id: Uuid,
    pub url: String,
    pub video_id: String,
    pub model: String,
    pub length: ReportLength,
    pub chunk_limit: ChunkLimit,
    pub concurrency: usize,
    pub truncation: TruncationPolicy,
}

impl SummaryRequest {
    pub const MAX_CONCURRENCY: usize = 8;

    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let url = url.into().trim().to_string();
        let video_id = extract_video_id(&url)?;
        let model = model.into();
        if model.trim().is_empty() {
            return Err(DigestError::invalid_input("model identifier is empty"));
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            url,
            video_id,
            model,
            length: ReportLength::default(),
            chunk_limit: ChunkLimit::default(),
            concurrency: 1,
            truncation: TruncationPolicy::default(),
        })
    }

    pub fn with_length(mut self, length: ReportLength) -> Self {
        self.length = length;
        self
    }

    pub fn with_chunk_limit(mut self, chunk_limit: ChunkLimit) -> Self {
        self.chunk_limit = chunk_limit;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self> {
        if !(1..=Self::MAX_CONCURRENCY).contains(&concurrency) {
            return Err(DigestError::invalid_input(format!(
                "concurrency {concurrency} is outside [1, {}]",
                Self::MAX_CONCURRENCY
            )));
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    pub fn with_truncation_policy(mut self, truncation: TruncationPolicy) -> Self {
        self.truncation = truncation;
        self
    }

    /// Same parameters, new run identity.
    pub fn regenerate(&self) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            ..self.clone()
        }
    }

    /// Switching models invalidates the current request.
    pub fn with_model(&self, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(DigestError::invalid_input("model identifier is empty"));
        }
        Ok(Self {
            run_id: Uuid::new_v4(),
            model,
            ..self.clone()
        })
    }

    /// Same settings for a different video.
    pub fn with_url(&self, url: impl Into<String>) -> Result<Self> {
        let url = url.into().trim().to_string();
        let video_id = extract_video_id(&url)?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            url,
            video_id,
            ..self.clone()
        })
    }
}
