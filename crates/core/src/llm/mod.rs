pub mod openai;
pub mod sse;

use std::future::Future;

use futures::stream::BoxStream;

/// Lazy, one-shot sequence of text fragments from a model.
///
/// A stream that ends with `Err(LlmError::Truncated { .. })` did not finish
/// normally; fragments yielded before it are still valid output.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("stream truncated: {reason}")]
    Truncated { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
}

pub trait LanguageModel: Send + Sync {
    /// Open a streamed completion. Errors returned here happen before any
    /// fragment was produced; errors inside the stream are truncations.
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<FragmentStream, LlmError>> + Send;
}
