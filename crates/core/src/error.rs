use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Sorry, could not parse video {url}. Please try again or use a different video.")]
    CaptionUnavailable { url: String },

    #[error("Caption tool failed: {reason}")]
    CaptionTool { reason: String },

    #[error("Metadata fetch failed for {url}: {reason}")]
    Metadata { url: String, reason: String },

    #[error("Model request failed during {stage}: {source}")]
    ModelRequest {
        stage: String,
        #[source]
        source: LlmError,
    },

    #[error("Model stream truncated during {stage}: {reason}")]
    StreamTruncated { stage: String, reason: String },

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl DigestError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        DigestError::InvalidInput {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;
